//! A run-time scene graph built in Rust
//!
//! This crate provides:
//! - Flat, cache-friendly transform hierarchies (struct-of-arrays, parents
//!   before children, siblings contiguous)
//! - Dirty-flag driven world matrix propagation in a single forward pass
//! - Entity-backed transform handles that survive index shifts
//! - Scene ownership of disjoint trees with merge and split on reparent

pub mod ecs;
pub mod scene;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ecs::{HierRef, Registry};
    pub use crate::scene::{
        Hierarchy, HierarchyError, HierarchyId, NULL_INDEX, Scene, SceneConfig, Transform,
        TransformError,
    };
    pub use glam::{Mat4, Quat, Vec3, Vec4};
}
