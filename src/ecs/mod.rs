//! Entity registry module
//!
//! Built on top of the hecs ECS library

mod components;
mod world;

pub use components::HierRef;
pub use world::Registry;
