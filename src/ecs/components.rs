//! Components the scene graph attaches to node entities

use crate::scene::HierarchyId;

/// Where a transform node currently lives.
///
/// Rewritten by the scene whenever an insert or remove shifts the node, so
/// it is always the authoritative way to re-resolve a node after a
/// structural edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HierRef {
    hierarchy: HierarchyId,
    index: u32,
}

impl HierRef {
    /// Create a new slot reference
    #[must_use]
    pub const fn new(hierarchy: HierarchyId, index: u32) -> Self {
        Self { hierarchy, index }
    }

    /// Hierarchy owning the node
    #[must_use]
    pub const fn hierarchy(&self) -> HierarchyId {
        self.hierarchy
    }

    /// Slot of the node inside its hierarchy
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Whether this node is its hierarchy's root
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.index == 0
    }
}
