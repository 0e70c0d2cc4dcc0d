//! Flat transform hierarchy storage
//!
//! One [`Hierarchy`] holds one connected tree as a structure of arrays.
//! Nodes are laid out so that every node's children form one contiguous
//! block, and the blocks appear in the same order as their parents:
//!
//! ```text
//! index:       0     1  2  3     4
//! node:        root  A  B  C     B1
//! parent:      -     0  0  0     2
//! childIndex:  1     4  4  5     5
//! childCount:  3     0  1  0     0
//! ```
//!
//! Consequently `parent < child` for every node and `childIndex` never
//! decreases along the array, so a single forward pass visits parents
//! before children. A leaf's `childIndex` is where its first child would
//! go: `childIndex[0] == 1` and `childIndex[i] == childIndex[i - 1] +
//! childCount[i - 1]`.

use std::iter;
use std::ops::Range;

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use smallvec::SmallVec;

use super::error::HierarchyError;
use super::propagate::scale_rotate_translate_inverse;

/// Parent index of a root node, and the "no parent" argument for inserts.
pub const NULL_INDEX: u32 = u32::MAX;

/// Slots are reserved in multiples of this.
const CAPACITY_GRANULARITY: usize = 16;

/// One connected tree of transforms stored as parallel arrays.
///
/// Structural edits go through [`Hierarchy::insert_hierarchy`] and
/// [`Hierarchy::remove_hierarchy`]; both shift the slots of unrelated
/// nodes, so raw indices must be re-resolved after either call.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub(super) entity: Vec<Entity>,
    pub(super) parent_index: Vec<u32>,
    pub(super) child_index: Vec<u32>,
    pub(super) child_count: Vec<u32>,
    pub(super) name: Vec<Option<String>>,
    pub(super) tag: Vec<u32>,
    pub(super) modified: Vec<bool>,
    pub(super) local_matrix: Vec<Mat4>,
    pub(super) local_inverse: Vec<Mat4>,
    pub(super) world_matrix: Vec<Mat4>,
    pub(super) world_inverse: Vec<Mat4>,
    pub(super) local_rotation: Vec<Quat>,
    pub(super) local_scale: Vec<Vec3>,
    pub(super) world_rotation: Vec<Quat>,
    pub(super) world_scale: Vec<Vec3>,
    /// Reserved slot count
    capacity: usize,
}

impl Hierarchy {
    /// Create a hierarchy holding a single default root node.
    #[must_use]
    pub fn new() -> Self {
        let mut hierarchy = Self::empty();
        hierarchy.insert_hierarchy(None, NULL_INDEX, 0);
        hierarchy
    }

    /// Create a hierarchy with no nodes. Its first insert must be a root.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an empty hierarchy with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut hierarchy = Self::empty();
        hierarchy.reserve(capacity);
        hierarchy
    }

    /// Number of nodes
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.parent_index.len()
    }

    /// Whether the hierarchy has no nodes
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent_index.is_empty()
    }

    /// Number of slots reserved
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make room for at least `count` more nodes.
    ///
    /// Grows to at least double the current capacity, rounded up to a
    /// multiple of 16. Never shrinks.
    pub fn reserve(&mut self, count: usize) {
        let needed = self.len() + count;
        if needed <= self.capacity {
            return;
        }
        let new_capacity = needed
            .max(self.capacity * 2)
            .next_multiple_of(CAPACITY_GRANULARITY);
        let additional = new_capacity - self.len();

        self.entity.reserve_exact(additional);
        self.parent_index.reserve_exact(additional);
        self.child_index.reserve_exact(additional);
        self.child_count.reserve_exact(additional);
        self.name.reserve_exact(additional);
        self.tag.reserve_exact(additional);
        self.modified.reserve_exact(additional);
        self.local_matrix.reserve_exact(additional);
        self.local_inverse.reserve_exact(additional);
        self.world_matrix.reserve_exact(additional);
        self.world_inverse.reserve_exact(additional);
        self.local_rotation.reserve_exact(additional);
        self.local_scale.reserve_exact(additional);
        self.world_rotation.reserve_exact(additional);
        self.world_scale.reserve_exact(additional);
        self.capacity = new_capacity;
    }

    // -------------------------------------------------------------------------
    // Structural queries
    // -------------------------------------------------------------------------

    /// Entity owning the node at `index`
    #[must_use]
    pub fn entity(&self, index: u32) -> Entity {
        self.entity[self.slot(index)]
    }

    pub(crate) fn set_entity(&mut self, index: u32, entity: Entity) {
        let slot = self.slot(index);
        self.entity[slot] = entity;
    }

    /// Parent slot, `None` for the root
    #[must_use]
    pub fn parent(&self, index: u32) -> Option<u32> {
        let parent = self.parent_index[self.slot(index)];
        (parent != NULL_INDEX).then_some(parent)
    }

    /// First slot of the node's child block
    #[must_use]
    pub fn child_index(&self, index: u32) -> u32 {
        self.child_index[self.slot(index)]
    }

    /// Number of direct children
    #[must_use]
    pub fn child_count(&self, index: u32) -> u32 {
        self.child_count[self.slot(index)]
    }

    /// Slots of the node's direct children
    #[must_use]
    pub fn children(&self, index: u32) -> Range<u32> {
        let slot = self.slot(index);
        let start = self.child_index[slot];
        start..start + self.child_count[slot]
    }

    /// Whether `ancestor` is `index` or lies on its parent chain
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: u32, index: u32) -> bool {
        let ancestor = self.slot(ancestor);
        let mut current = self.slot(index);
        loop {
            if current == ancestor {
                return true;
            }
            match self.parent_index[current] {
                NULL_INDEX => return false,
                parent => current = parent as usize,
            }
        }
    }

    /// All slots in the subtree rooted at `index`, level by level
    #[must_use]
    pub fn subtree(&self, index: u32) -> SmallVec<[u32; 16]> {
        let mut nodes = SmallVec::new();
        nodes.push(index);
        let mut cursor = 0;
        while cursor < nodes.len() {
            let node = nodes[cursor];
            nodes.extend(self.children(node));
            cursor += 1;
        }
        nodes
    }

    /// Node name
    #[must_use]
    pub fn name(&self, index: u32) -> Option<&str> {
        self.name[self.slot(index)].as_deref()
    }

    pub(crate) fn set_name(&mut self, index: u32, name: Option<String>) {
        let slot = self.slot(index);
        self.name[slot] = name;
    }

    /// Node tag
    #[must_use]
    pub fn tag(&self, index: u32) -> u32 {
        self.tag[self.slot(index)]
    }

    pub(crate) fn set_tag(&mut self, index: u32, tag: u32) {
        let slot = self.slot(index);
        self.tag[slot] = tag;
    }

    /// Whether the node's caches are waiting for [`Hierarchy::update_matrices`]
    #[must_use]
    pub fn is_modified(&self, index: u32) -> bool {
        self.modified[self.slot(index)]
    }

    /// Whether any node is waiting for an update pass
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.modified.iter().any(|&m| m)
    }

    pub(crate) fn mark_modified(&mut self, index: u32) {
        let slot = self.slot(index);
        self.modified[slot] = true;
    }

    // -------------------------------------------------------------------------
    // Cached pose data
    // -------------------------------------------------------------------------

    /// Local matrix of the node
    #[must_use]
    pub fn local_matrix(&self, index: u32) -> Mat4 {
        self.local_matrix[self.slot(index)]
    }

    /// Inverse of the local matrix
    #[must_use]
    pub fn local_inverse(&self, index: u32) -> Mat4 {
        self.local_inverse[self.slot(index)]
    }

    /// World matrix of the node, fresh after an update pass
    #[must_use]
    pub fn world_matrix(&self, index: u32) -> Mat4 {
        self.world_matrix[self.slot(index)]
    }

    /// Inverse of the world matrix
    #[must_use]
    pub fn world_inverse(&self, index: u32) -> Mat4 {
        self.world_inverse[self.slot(index)]
    }

    /// Local rotation
    #[must_use]
    pub fn local_rotation(&self, index: u32) -> Quat {
        self.local_rotation[self.slot(index)]
    }

    /// Local scale
    #[must_use]
    pub fn local_scale(&self, index: u32) -> Vec3 {
        self.local_scale[self.slot(index)]
    }

    /// World rotation
    #[must_use]
    pub fn world_rotation(&self, index: u32) -> Quat {
        self.world_rotation[self.slot(index)]
    }

    /// Local scale carried through the parent's linear part
    #[must_use]
    pub fn world_scale(&self, index: u32) -> Vec3 {
        self.world_scale[self.slot(index)]
    }

    /// Entities of all nodes, by slot
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entity
    }

    /// Parent slot of every node, [`NULL_INDEX`] for the root
    #[must_use]
    pub fn parent_indices(&self) -> &[u32] {
        &self.parent_index
    }

    /// Child block start of every node
    #[must_use]
    pub fn child_indices(&self) -> &[u32] {
        &self.child_index
    }

    /// Child count of every node
    #[must_use]
    pub fn child_counts(&self) -> &[u32] {
        &self.child_count
    }

    /// World matrices of all nodes, by slot
    #[must_use]
    pub fn world_matrices(&self) -> &[Mat4] {
        &self.world_matrix
    }

    /// World inverses of all nodes, by slot
    #[must_use]
    pub fn world_inverses(&self) -> &[Mat4] {
        &self.world_inverse
    }

    /// World rotations of all nodes, by slot
    #[must_use]
    pub fn world_rotations(&self) -> &[Quat] {
        &self.world_rotation
    }

    /// World scales of all nodes, by slot
    #[must_use]
    pub fn world_scales(&self) -> &[Vec3] {
        &self.world_scale
    }

    /// World matrices as column-major floats, 16 per node, ready for upload
    #[must_use]
    pub fn world_matrix_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.world_matrix)
    }

    pub(crate) fn set_local_position(&mut self, index: u32, position: Vec3) {
        let slot = self.slot(index);
        self.local_matrix[slot].w_axis = position.extend(1.0);
        self.local_inverse[slot] = scale_rotate_translate_inverse(&self.local_matrix[slot]);
        self.modified[slot] = true;
    }

    pub(crate) fn set_local_rotation(&mut self, index: u32, rotation: Quat) {
        let slot = self.slot(index);
        let position = self.local_matrix[slot].w_axis.truncate();
        self.set_local_transform(index, self.local_scale[slot], rotation, position);
    }

    pub(crate) fn set_local_scale(&mut self, index: u32, scale: Vec3) {
        let slot = self.slot(index);
        let position = self.local_matrix[slot].w_axis.truncate();
        self.set_local_transform(index, scale, self.local_rotation[slot], position);
    }

    pub(crate) fn set_local_transform(
        &mut self,
        index: u32,
        scale: Vec3,
        rotation: Quat,
        position: Vec3,
    ) {
        let slot = self.slot(index);
        self.local_rotation[slot] = rotation;
        self.local_scale[slot] = scale;
        self.local_matrix[slot] = Mat4::from_scale_rotation_translation(scale, rotation, position);
        self.local_inverse[slot] = scale_rotate_translate_inverse(&self.local_matrix[slot]);
        self.modified[slot] = true;
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Insert a node or a whole subtree under `dst_parent`.
    ///
    /// With `src` set, the subtree rooted at `src_root` is copied in (node
    /// data and entities) with its internal structure preserved. With no
    /// `src`, a single default node is created and its entity must be set
    /// by the caller. A `dst_parent` of [`NULL_INDEX`] inserts the root of
    /// an empty hierarchy. The new node becomes the parent's last child.
    ///
    /// Returns the slot of the inserted subtree root. The source is not
    /// modified; callers moving a subtree remove it from `src` afterwards.
    ///
    /// # Panics
    ///
    /// Panics when inserting a root into a non-empty hierarchy, a non-root
    /// into an empty one, or when either index is out of range.
    pub fn insert_hierarchy(
        &mut self,
        src: Option<&Hierarchy>,
        dst_parent: u32,
        src_root: u32,
    ) -> u32 {
        let insert_index = if dst_parent == NULL_INDEX {
            if !self.is_empty() {
                panic!("attempt to insert root in non-empty hierarchy");
            }
            self.open(0, 1);
            if let Some(src) = src {
                self.copy_from(src, src.slot(src_root), 0, 1);
            }
            self.parent_index[0] = NULL_INDEX;
            self.child_index[0] = 1;
            self.child_count[0] = 0;
            0
        } else {
            if self.is_empty() {
                panic!("attempt to insert non-root in empty hierarchy");
            }
            let src = src.map(|src| (src, src.slot(src_root)));
            self.insert_block(src, self.slot(dst_parent), 1)
        };
        if let Some(src) = src {
            self.insert_children(src, insert_index as usize, src.slot(src_root));
        }
        insert_index
    }

    /// Append `count` nodes to the end of `dst_parent`'s child block.
    fn insert_block(
        &mut self,
        src: Option<(&Hierarchy, usize)>,
        dst_parent: usize,
        count: usize,
    ) -> u32 {
        // New nodes always go after the parent's existing children.
        let insert_index =
            (self.child_index[dst_parent] + self.child_count[dst_parent]) as usize;
        // The new nodes' own child block goes right after that of the slot
        // to their left (never zero: the root precedes every insert).
        let neighbor = insert_index - 1;
        let child_index = (self.child_index[neighbor] + self.child_count[neighbor]) as usize;

        let shift = count as u32;
        // Blocks of nodes after the parent all start past the insert point.
        for start in &mut self.child_index[dst_parent + 1..] {
            *start += shift;
        }
        // Nodes from `child_index` on belong to parents at or after the
        // insert point.
        for parent in &mut self.parent_index[child_index..] {
            *parent += shift;
        }

        self.open(insert_index, count);
        if let Some((src, src_index)) = src {
            self.copy_from(src, src_index, insert_index, count);
        }
        let new_child_index = (child_index + count) as u32;
        for slot in insert_index..insert_index + count {
            self.parent_index[slot] = dst_parent as u32;
            self.child_index[slot] = new_child_index;
            self.child_count[slot] = 0;
        }
        self.child_count[dst_parent] += shift;
        insert_index as u32
    }

    /// Copy the descendants of `src_root` under the already inserted `dst_parent`.
    fn insert_children(&mut self, src: &Hierarchy, dst_parent: usize, src_root: usize) {
        let child_count = src.child_count[src_root] as usize;
        if child_count == 0 {
            return;
        }
        let child_index = src.child_index[src_root] as usize;
        let insert_index = self.insert_block(Some((src, child_index)), dst_parent, child_count);
        for i in 0..child_count {
            self.insert_children(src, insert_index as usize + i, child_index + i);
        }
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove the node at `index` together with its whole subtree.
    ///
    /// Removing the root empties the hierarchy.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn remove_hierarchy(&mut self, index: u32) {
        let slot = self.slot(index);
        let parent = self.parent_index[slot];
        self.remove_children(slot);

        // The node is a leaf now; take it out of its parent's block.
        self.close(slot, 1);
        for p in &mut self.parent_index {
            if *p != NULL_INDEX && *p > index {
                *p -= 1;
            }
        }
        if parent != NULL_INDEX {
            let parent = parent as usize;
            for start in &mut self.child_index[parent + 1..] {
                *start -= 1;
            }
            self.child_count[parent] -= 1;
        }
    }

    /// Remove every descendant of `index`, deepest blocks first, so each
    /// close only ever removes a block of leaves.
    fn remove_children(&mut self, index: usize) {
        let child_index = self.child_index[index] as usize;
        let child_count = self.child_count[index] as usize;
        if child_count == 0 {
            return;
        }
        for i in (0..child_count).rev() {
            self.remove_children(child_index + i);
        }

        self.close(child_index, child_count);
        let shift = child_count as u32;
        let block_end = (child_index + child_count) as u32;
        for p in &mut self.parent_index {
            if *p != NULL_INDEX && *p >= block_end {
                *p -= shift;
            }
        }
        // Every block owned by a later node started past the removed one.
        for start in &mut self.child_index[index + 1..] {
            *start -= shift;
        }
        self.child_count[index] = 0;
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Check the layout invariants, reporting the first one broken.
    pub fn check_invariants(&self) -> Result<(), HierarchyError> {
        let len = self.len();
        if len == 0 {
            return Ok(());
        }
        if self.parent_index[0] != NULL_INDEX {
            return Err(HierarchyError::Root(0));
        }
        if self.child_index[0] != 1 {
            return Err(HierarchyError::ChildIndex {
                index: 0,
                expected: 1,
                found: self.child_index[0],
            });
        }
        for i in 0..len {
            let index = i as u32;
            let start = self.child_index[i] as usize;
            if start + self.child_count[i] as usize > len {
                return Err(HierarchyError::ChildOverflow { index });
            }
            if i == 0 {
                continue;
            }

            let expected = self.child_index[i - 1] + self.child_count[i - 1];
            if self.child_index[i] != expected {
                return Err(HierarchyError::ChildIndex {
                    index,
                    expected,
                    found: self.child_index[i],
                });
            }

            let parent = self.parent_index[i];
            if parent == NULL_INDEX {
                return Err(HierarchyError::Root(index));
            }
            if parent >= index {
                return Err(HierarchyError::ParentOrder { index, parent });
            }
            let p = parent as usize;
            let block = self.child_index[p]..self.child_index[p] + self.child_count[p];
            if !block.contains(&index) {
                return Err(HierarchyError::OutsideChildBlock { index, parent });
            }
        }
        // Blocks are disjoint and every non-root sits in its parent's, so
        // they cover exactly the non-root slots.
        let last = len - 1;
        let end = (self.child_index[last] + self.child_count[last]) as usize;
        if end != len {
            return Err(HierarchyError::ChildIndex {
                index: len as u32,
                expected: len as u32,
                found: end as u32,
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Raw slot management
    // -------------------------------------------------------------------------

    #[inline]
    fn slot(&self, index: u32) -> usize {
        let slot = index as usize;
        if slot >= self.len() {
            panic!(
                "index {index} out of range for hierarchy of {} nodes",
                self.len()
            );
        }
        slot
    }

    /// Make room for `count` default nodes at `index`.
    fn open(&mut self, index: usize, count: usize) {
        self.reserve(count);
        open_column(&mut self.entity, index, count, Entity::DANGLING);
        open_column(&mut self.parent_index, index, count, NULL_INDEX);
        open_column(&mut self.child_index, index, count, 0);
        open_column(&mut self.child_count, index, count, 0);
        open_column(&mut self.name, index, count, None);
        open_column(&mut self.tag, index, count, 0);
        open_column(&mut self.modified, index, count, true);
        open_column(&mut self.local_matrix, index, count, Mat4::IDENTITY);
        open_column(&mut self.local_inverse, index, count, Mat4::IDENTITY);
        open_column(&mut self.world_matrix, index, count, Mat4::IDENTITY);
        open_column(&mut self.world_inverse, index, count, Mat4::IDENTITY);
        open_column(&mut self.local_rotation, index, count, Quat::IDENTITY);
        open_column(&mut self.local_scale, index, count, Vec3::ONE);
        open_column(&mut self.world_rotation, index, count, Quat::IDENTITY);
        open_column(&mut self.world_scale, index, count, Vec3::ONE);
    }

    /// Drop `count` nodes starting at `index`, closing the gap.
    fn close(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        let range = index..index + count;
        self.entity.drain(range.clone());
        self.parent_index.drain(range.clone());
        self.child_index.drain(range.clone());
        self.child_count.drain(range.clone());
        self.name.drain(range.clone());
        self.tag.drain(range.clone());
        self.modified.drain(range.clone());
        self.local_matrix.drain(range.clone());
        self.local_inverse.drain(range.clone());
        self.world_matrix.drain(range.clone());
        self.world_inverse.drain(range.clone());
        self.local_rotation.drain(range.clone());
        self.local_scale.drain(range.clone());
        self.world_rotation.drain(range.clone());
        self.world_scale.drain(range);
    }

    /// Copy node data (not structure) from another hierarchy.
    fn copy_from(&mut self, src: &Hierarchy, src_index: usize, dst_index: usize, count: usize) {
        let s = src_index..src_index + count;
        let d = dst_index..dst_index + count;
        self.entity[d.clone()].copy_from_slice(&src.entity[s.clone()]);
        self.name[d.clone()].clone_from_slice(&src.name[s.clone()]);
        self.tag[d.clone()].copy_from_slice(&src.tag[s.clone()]);
        self.modified[d.clone()].copy_from_slice(&src.modified[s.clone()]);
        self.local_matrix[d.clone()].copy_from_slice(&src.local_matrix[s.clone()]);
        self.local_inverse[d.clone()].copy_from_slice(&src.local_inverse[s.clone()]);
        self.world_matrix[d.clone()].copy_from_slice(&src.world_matrix[s.clone()]);
        self.world_inverse[d.clone()].copy_from_slice(&src.world_inverse[s.clone()]);
        self.local_rotation[d.clone()].copy_from_slice(&src.local_rotation[s.clone()]);
        self.local_scale[d.clone()].copy_from_slice(&src.local_scale[s.clone()]);
        self.world_rotation[d.clone()].copy_from_slice(&src.world_rotation[s.clone()]);
        self.world_scale[d].copy_from_slice(&src.world_scale[s]);
    }
}

fn open_column<T: Clone>(column: &mut Vec<T>, index: usize, count: usize, fill: T) {
    column.splice(index..index, iter::repeat_n(fill, count));
}
