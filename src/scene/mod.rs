//! Scene ownership of transform hierarchies
//!
//! A [`Scene`] owns every live [`Hierarchy`] (one per disjoint tree) and the
//! entity [`Registry`] that maps each transform's entity to its current
//! slot. All structural edits go through here so the two never disagree.

mod debug;
mod error;
mod hierarchy;
mod propagate;
mod transform;

use hecs::Entity;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::ecs::{HierRef, Registry};

pub use debug::HierarchyDump;
pub use error::{HierarchyError, TransformError};
pub use hierarchy::{Hierarchy, NULL_INDEX};
pub use propagate::scale_rotate_translate_inverse;
pub use transform::Transform;

new_key_type! {
    /// Generational id of a hierarchy owned by a [`Scene`]
    pub struct HierarchyId;
}

/// Scene configuration
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Recompute matrices inside every setter
    pub eager_updates: bool,
    /// Slots reserved up front for each new hierarchy
    pub hierarchy_capacity: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            eager_updates: true,
            hierarchy_capacity: 16,
        }
    }
}

impl SceneConfig {
    /// Enable or disable eager matrix updates.
    ///
    /// When disabled, setters only mark nodes dirty and world-space reads
    /// are stale until the next [`Scene::update_matrices`].
    pub fn with_eager_updates(mut self, eager: bool) -> Self {
        self.eager_updates = eager;
        self
    }

    /// Set the initial slot reservation per hierarchy
    pub fn with_hierarchy_capacity(mut self, capacity: usize) -> Self {
        self.hierarchy_capacity = capacity;
        self
    }
}

/// The set of transform trees making up one world
pub struct Scene {
    config: SceneConfig,
    registry: Registry,
    hierarchies: SlotMap<HierarchyId, Hierarchy>,
}

impl Scene {
    /// Create an empty scene with the default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create an empty scene
    pub fn with_config(config: SceneConfig) -> Self {
        log::debug!("Creating scene: {config:?}");
        Self {
            config,
            registry: Registry::new(),
            hierarchies: SlotMap::with_key(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Entity registry, for attaching other per-entity data
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Entity registry, mutably
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Look up a hierarchy
    pub fn hierarchy(&self, id: HierarchyId) -> Option<&Hierarchy> {
        self.hierarchies.get(id)
    }

    /// Iterate over every hierarchy
    pub fn hierarchies(&self) -> impl Iterator<Item = (HierarchyId, &Hierarchy)> {
        self.hierarchies.iter()
    }

    /// Number of disjoint trees
    pub fn hierarchy_count(&self) -> usize {
        self.hierarchies.len()
    }

    /// Total number of transforms across all trees
    pub fn transform_count(&self) -> usize {
        self.hierarchies.values().map(Hierarchy::len).sum()
    }

    /// Root transform of every tree
    pub fn roots(&self) -> impl Iterator<Item = Transform> + '_ {
        self.hierarchies
            .values()
            .map(|h| Transform::from_entity(h.entity(0)))
    }

    /// The transform owned by `entity`, if it still has one
    pub fn transform_of(&self, entity: Entity) -> Option<Transform> {
        self.registry
            .hier_ref(entity)
            .map(|_| Transform::from_entity(entity))
    }

    /// Run the matrix update pass on every hierarchy.
    ///
    /// Returns the number of nodes recomputed.
    pub fn update_matrices(&mut self) -> usize {
        self.hierarchies
            .values_mut()
            .map(Hierarchy::update_matrices)
            .sum()
    }

    /// Destroy an entity's transform together with its whole subtree and
    /// free every entity in it.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), TransformError> {
        let result = self.delete_subtree(Transform::from_entity(entity));
        if let Err(e) = &result {
            log::warn!("Cannot despawn {entity:?}: {e}");
        }
        result
    }

    /// Drop every hierarchy and entity
    pub fn clear(&mut self) {
        log::debug!(
            "Clearing scene: {} hierarchies, {} transforms",
            self.hierarchy_count(),
            self.transform_count()
        );
        self.hierarchies.clear();
        self.registry.clear();
    }

    // -------------------------------------------------------------------------
    // Handle resolution
    // -------------------------------------------------------------------------

    pub(crate) fn resolve(&self, transform: Transform) -> Result<HierRef, TransformError> {
        self.registry
            .hier_ref(transform.entity())
            .ok_or(TransformError::Stale(transform.entity()))
    }

    pub(crate) fn node(&self, transform: Transform) -> Result<(&Hierarchy, u32), TransformError> {
        let link = self.resolve(transform)?;
        Ok((self.hierarchy_ref(link.hierarchy()), link.index()))
    }

    /// Apply a pose edit to one node, then update if configured to.
    pub(crate) fn edit_pose(
        &mut self,
        transform: Transform,
        edit: impl FnOnce(&mut Hierarchy, u32),
    ) -> Result<(), TransformError> {
        let link = self.resolve(transform)?;
        edit(self.hierarchy_mut(link.hierarchy()), link.index());
        self.pose_changed(link.hierarchy());
        Ok(())
    }

    /// Bring the node's hierarchy up to date regardless of update mode.
    pub(crate) fn refresh(&mut self, transform: Transform) -> Result<(), TransformError> {
        let link = self.resolve(transform)?;
        let hierarchy = self.hierarchy_mut(link.hierarchy());
        if hierarchy.is_dirty() {
            hierarchy.update_matrices();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Structural edits
    // -------------------------------------------------------------------------

    /// Start a new tree with a single default node.
    pub(crate) fn spawn_root(&mut self) -> Transform {
        let entity = self.registry.spawn_node();
        let mut hierarchy = Hierarchy::with_capacity(self.config.hierarchy_capacity);
        hierarchy.insert_hierarchy(None, NULL_INDEX, 0);
        hierarchy.set_entity(0, entity);

        let id = self.hierarchies.insert(hierarchy);
        self.registry.link(entity, id, 0);
        log::debug!("Created hierarchy {id:?} rooted at {entity:?}");
        self.pose_changed(id);
        Transform::from_entity(entity)
    }

    /// Add a default node as the last child of `parent`.
    pub(crate) fn spawn_child(&mut self, parent: Transform) -> Result<Transform, TransformError> {
        let link = self.resolve(parent)?;
        let id = link.hierarchy();
        let entity = self.registry.spawn_node();

        let hierarchy = self.hierarchy_mut(id);
        let index = hierarchy.insert_hierarchy(None, link.index(), 0);
        hierarchy.set_entity(index, entity);
        self.relink(id, index);
        self.verify(id);
        self.pose_changed(id);
        Ok(Transform::from_entity(entity))
    }

    /// Remove a node and its subtree, freeing all of their entities.
    pub(crate) fn delete_subtree(&mut self, transform: Transform) -> Result<(), TransformError> {
        let link = self.resolve(transform)?;
        let id = link.hierarchy();
        let hierarchy = self.hierarchy_ref(id);
        let doomed: SmallVec<[Entity; 16]> = hierarchy
            .subtree(link.index())
            .iter()
            .map(|&index| hierarchy.entity(index))
            .collect();

        if link.is_root() {
            self.hierarchies.remove(id);
            log::debug!("Deleted hierarchy {id:?} ({} transforms)", doomed.len());
        } else {
            self.hierarchy_mut(id).remove_hierarchy(link.index());
            self.relink(id, link.index());
            self.verify(id);
            log::debug!(
                "Removed {} transforms from hierarchy {id:?} at slot {}",
                doomed.len(),
                link.index()
            );
        }

        for entity in doomed {
            if self.registry.despawn(entity).is_err() {
                log::warn!("Transform entity {entity:?} was already despawned");
            }
        }
        Ok(())
    }

    /// Move a node's subtree under `parent`, or make it a standalone tree.
    pub(crate) fn reparent(
        &mut self,
        transform: Transform,
        parent: Option<Transform>,
    ) -> Result<(), TransformError> {
        let link = self.resolve(transform)?;
        let Some(parent) = parent else {
            self.detach(link);
            return Ok(());
        };
        let parent_link = self.resolve(parent)?;
        let src_id = link.hierarchy();
        let dst_id = parent_link.hierarchy();

        let moved_index = if src_id == dst_id {
            let hierarchy = self.hierarchy_mut(src_id);
            if hierarchy.is_ancestor(link.index(), parent_link.index()) {
                return Err(TransformError::Cycle {
                    node: transform.entity(),
                    parent: parent.entity(),
                });
            }
            // Pull the subtree out first: the parent's slot may shift.
            let mut scratch = Hierarchy::empty();
            scratch.insert_hierarchy(Some(&*hierarchy), NULL_INDEX, link.index());
            hierarchy.remove_hierarchy(link.index());
            self.relink(src_id, link.index());

            let parent_index = self.resolve(parent)?.index();
            let index = self
                .hierarchy_mut(dst_id)
                .insert_hierarchy(Some(&scratch), parent_index, 0);
            self.relink(dst_id, index);
            index
        } else {
            let Some([dst, src]) = self.hierarchies.get_disjoint_mut([dst_id, src_id]) else {
                panic!("transform refers to missing hierarchy {src_id:?} or {dst_id:?}");
            };
            let index = dst.insert_hierarchy(Some(&*src), parent_link.index(), link.index());
            src.remove_hierarchy(link.index());
            let emptied = src.is_empty();

            self.relink(dst_id, index);
            if emptied {
                self.hierarchies.remove(src_id);
                log::debug!("Merged hierarchy {src_id:?} into {dst_id:?}");
            } else {
                self.relink(src_id, link.index());
                self.verify(src_id);
                log::debug!(
                    "Moved subtree at slot {} of {src_id:?} into {dst_id:?}",
                    link.index()
                );
            }
            index
        };

        self.verify(dst_id);
        self.hierarchy_mut(dst_id).mark_modified(moved_index);
        self.pose_changed(dst_id);
        Ok(())
    }

    /// Split a non-root node's subtree out into a new hierarchy.
    fn detach(&mut self, link: HierRef) {
        if link.is_root() {
            return;
        }
        let src_id = link.hierarchy();
        let mut hierarchy = Hierarchy::with_capacity(self.config.hierarchy_capacity);
        let src = self.hierarchy_mut(src_id);
        hierarchy.insert_hierarchy(Some(&*src), NULL_INDEX, link.index());
        src.remove_hierarchy(link.index());
        hierarchy.mark_modified(0);

        let id = self.hierarchies.insert(hierarchy);
        self.relink(id, 0);
        self.relink(src_id, link.index());
        log::debug!(
            "Split slot {} of {src_id:?} into new hierarchy {id:?}",
            link.index()
        );
        self.verify(src_id);
        self.verify(id);
        self.pose_changed(id);
    }

    /// Copy a node's subtree into a new hierarchy with fresh entities.
    pub(crate) fn duplicate_subtree(
        &mut self,
        transform: Transform,
    ) -> Result<Transform, TransformError> {
        let link = self.resolve(transform)?;
        let mut copy = Hierarchy::with_capacity(self.config.hierarchy_capacity);
        copy.insert_hierarchy(
            Some(self.hierarchy_ref(link.hierarchy())),
            NULL_INDEX,
            link.index(),
        );
        for index in 0..copy.len() as u32 {
            copy.set_entity(index, self.registry.spawn_node());
        }
        copy.mark_modified(0);
        let root = copy.entity(0);

        let id = self.hierarchies.insert(copy);
        self.relink(id, 0);
        log::debug!(
            "Duplicated subtree of {:?} into hierarchy {id:?}",
            transform.entity()
        );
        self.verify(id);
        self.pose_changed(id);
        Ok(Transform::from_entity(root))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn hierarchy_ref(&self, id: HierarchyId) -> &Hierarchy {
        self.hierarchies
            .get(id)
            .unwrap_or_else(|| panic!("transform refers to missing hierarchy {id:?}"))
    }

    fn hierarchy_mut(&mut self, id: HierarchyId) -> &mut Hierarchy {
        self.hierarchies
            .get_mut(id)
            .unwrap_or_else(|| panic!("transform refers to missing hierarchy {id:?}"))
    }

    /// Point the entities at slots `from..` back at their current slot.
    fn relink(&mut self, id: HierarchyId, from: u32) {
        let hierarchy = &self.hierarchies[id];
        for index in from..hierarchy.len() as u32 {
            self.registry.link(hierarchy.entity(index), id, index);
        }
    }

    fn pose_changed(&mut self, id: HierarchyId) {
        if self.config.eager_updates {
            self.hierarchy_mut(id).update_matrices();
        }
    }

    /// Abort on a corrupted layout in debug builds.
    fn verify(&self, id: HierarchyId) {
        let hierarchy = self.hierarchy_ref(id);
        log::trace!("Hierarchy {id:?}:\n{}", hierarchy.dump());
        if cfg!(debug_assertions) {
            if let Err(e) = hierarchy.check_invariants() {
                panic!("hierarchy {id:?} corrupted: {e}\n{}", hierarchy.dump());
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
