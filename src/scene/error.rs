//! Scene graph errors

use hecs::Entity;

/// Errors returned when a transform handle cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// The handle's entity has been deleted, or never owned a transform
    /// in this scene
    Stale(Entity),
    /// Reparenting would make a node its own ancestor
    Cycle {
        /// Node being reparented
        node: Entity,
        /// Requested parent, which lies in the node's subtree
        parent: Entity,
    },
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale(e) => write!(f, "Stale transform handle: {e:?}"),
            Self::Cycle { node, parent } => {
                write!(f, "Cannot parent {node:?} under its own descendant {parent:?}")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// First layout invariant found broken in a hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Slot 0 is not a root, or a non-root slot claims to be one
    Root(u32),
    /// A parent index does not precede its child
    ParentOrder { index: u32, parent: u32 },
    /// A node lies outside its parent's child block
    OutsideChildBlock { index: u32, parent: u32 },
    /// A child block start is not where the layout requires it
    ChildIndex { index: u32, expected: u32, found: u32 },
    /// A child block runs past the end of the hierarchy
    ChildOverflow { index: u32 },
}

impl std::fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root(i) => write!(f, "Slot {i} has the wrong root status"),
            Self::ParentOrder { index, parent } => {
                write!(f, "Slot {index} has parent {parent} which does not precede it")
            }
            Self::OutsideChildBlock { index, parent } => {
                write!(f, "Slot {index} is outside the child block of {parent}")
            }
            Self::ChildIndex {
                index,
                expected,
                found,
            } => write!(
                f,
                "Slot {index} child index is {found}, layout requires {expected}"
            ),
            Self::ChildOverflow { index } => {
                write!(f, "Child block of slot {index} runs past the end")
            }
        }
    }
}

impl std::error::Error for HierarchyError {}
