//! Entity registry wrapper around hecs
//!
//! Every transform node is an entity here. The registry owns the
//! entity-to-slot lookup ([`HierRef`]), the hierarchies only store the
//! reverse link.

use hecs::Entity;

use super::components::HierRef;
use crate::scene::HierarchyId;

/// Registry of all entities that own a transform
pub struct Registry {
    /// The underlying hecs world
    inner: hecs::World,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    /// Allocate an entity for a new transform node
    pub(crate) fn spawn_node(&mut self) -> Entity {
        self.inner.spawn(())
    }

    /// Free a node's entity and every component attached to it
    pub(crate) fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    /// Look up which hierarchy slot an entity occupies
    pub fn hier_ref(&self, entity: Entity) -> Option<HierRef> {
        self.inner.get::<&HierRef>(entity).ok().map(|r| *r)
    }

    /// Point an entity at its (possibly new) hierarchy slot.
    ///
    /// # Panics
    ///
    /// Panics if the entity has been despawned: a hierarchy slot must never
    /// outlive its entity.
    pub(crate) fn link(&mut self, entity: Entity, hierarchy: HierarchyId, index: u32) {
        let link = HierRef::new(hierarchy, index);
        if let Ok(mut existing) = self.inner.get::<&mut HierRef>(entity) {
            *existing = link;
            return;
        }
        if self.inner.insert_one(entity, link).is_err() {
            panic!("hierarchy slot {index} refers to despawned entity {entity:?}");
        }
    }

    /// Attach an external component (mesh, light, ...) to a node's entity
    pub fn insert_one(
        &mut self,
        entity: Entity,
        component: impl hecs::Component,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, component)
    }

    /// Get a reference to a component
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Get a mutable reference to a component
    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Get the number of entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every entity
    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }

    /// Query for entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query::<Q>()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
