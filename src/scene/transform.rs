//! Per-node transform handle
//!
//! A [`Transform`] is just the entity that owns a node. Every call
//! re-resolves the node's current slot through the scene's registry, so a
//! handle stays valid across inserts and removals elsewhere in its tree and
//! turns into [`TransformError::Stale`] once the node is deleted.
//!
//! Pose setters mark the node dirty. With eager updates (the default) the
//! owning hierarchy is recomputed before the setter returns; otherwise
//! world-space getters return the values of the last update pass.

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use smallvec::SmallVec;

use super::{Hierarchy, HierarchyId, Scene, TransformError};

/// Handle to one node of a scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transform(Entity);

impl Transform {
    /// Wrap an entity. The handle is only usable if the entity owns a
    /// transform in the scene it is used with.
    pub const fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    /// The owning entity
    pub const fn entity(self) -> Entity {
        self.0
    }

    /// Create a node with an identity local pose, as the last child of
    /// `parent` or as the root of a new hierarchy.
    pub fn new(scene: &mut Scene, parent: Option<Transform>) -> Result<Self, TransformError> {
        match parent {
            Some(parent) => scene.spawn_child(parent),
            None => Ok(scene.spawn_root()),
        }
    }

    /// Create a named node
    pub fn new_named(
        scene: &mut Scene,
        parent: Option<Transform>,
        name: impl Into<String>,
    ) -> Result<Self, TransformError> {
        let transform = Self::new(scene, parent)?;
        transform.set_name(scene, Some(name.into()))?;
        Ok(transform)
    }

    /// Delete this node and its whole subtree, freeing their entities
    pub fn delete(self, scene: &mut Scene) -> Result<(), TransformError> {
        scene.delete_subtree(self)
    }

    /// Copy this node's subtree into a new standalone hierarchy.
    ///
    /// The copy keeps local poses, names and tags but gets fresh entities;
    /// the returned handle is its root.
    pub fn duplicate(self, scene: &mut Scene) -> Result<Transform, TransformError> {
        scene.duplicate_subtree(self)
    }

    /// Whether the node still exists
    pub fn is_valid(self, scene: &Scene) -> bool {
        scene.resolve(self).is_ok()
    }

    /// Hierarchy currently holding the node
    pub fn hierarchy(self, scene: &Scene) -> Result<HierarchyId, TransformError> {
        Ok(scene.resolve(self)?.hierarchy())
    }

    /// Current slot of the node. Only valid until the next structural edit.
    pub fn index(self, scene: &Scene) -> Result<u32, TransformError> {
        Ok(scene.resolve(self)?.index())
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Move this node, with its subtree, under `parent`.
    ///
    /// `None` makes the node the root of a new hierarchy. The local pose is
    /// kept, so the world pose follows the new parent. Fails with
    /// [`TransformError::Cycle`] if `parent` is this node or one of its
    /// descendants, leaving the scene unchanged.
    pub fn set_parent(
        self,
        scene: &mut Scene,
        parent: Option<Transform>,
    ) -> Result<(), TransformError> {
        scene.reparent(self, parent)
    }

    /// Parent node, `None` for a root
    pub fn parent(self, scene: &Scene) -> Result<Option<Transform>, TransformError> {
        self.read(scene, |h, i| {
            h.parent(i).map(|p| Transform::from_entity(h.entity(p)))
        })
    }

    /// Number of direct children
    pub fn child_count(self, scene: &Scene) -> Result<u32, TransformError> {
        self.read(scene, Hierarchy::child_count)
    }

    /// The `n`th direct child, if there are that many
    pub fn child(self, scene: &Scene, n: u32) -> Result<Option<Transform>, TransformError> {
        self.read(scene, |h, i| {
            (n < h.child_count(i)).then(|| Transform::from_entity(h.entity(h.child_index(i) + n)))
        })
    }

    /// Direct children in slot order
    pub fn children(self, scene: &Scene) -> Result<SmallVec<[Transform; 8]>, TransformError> {
        self.read(scene, |h, i| {
            h.children(i)
                .map(|c| Transform::from_entity(h.entity(c)))
                .collect()
        })
    }

    // -------------------------------------------------------------------------
    // Name and tag
    // -------------------------------------------------------------------------

    /// Node name, if one was set
    pub fn name(self, scene: &Scene) -> Result<Option<&str>, TransformError> {
        self.read(scene, Hierarchy::name)
    }

    /// Set or clear the node name
    pub fn set_name(self, scene: &mut Scene, name: Option<String>) -> Result<(), TransformError> {
        let link = scene.resolve(self)?;
        scene
            .hierarchy_mut(link.hierarchy())
            .set_name(link.index(), name);
        Ok(())
    }

    /// User bits, zero by default
    pub fn tag(self, scene: &Scene) -> Result<u32, TransformError> {
        self.read(scene, Hierarchy::tag)
    }

    /// Set the user bits
    pub fn set_tag(self, scene: &mut Scene, tag: u32) -> Result<(), TransformError> {
        let link = scene.resolve(self)?;
        scene.hierarchy_mut(link.hierarchy()).set_tag(link.index(), tag);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Local pose
    // -------------------------------------------------------------------------

    /// Local matrix, relative to the parent
    pub fn local_matrix(self, scene: &Scene) -> Result<Mat4, TransformError> {
        self.read(scene, Hierarchy::local_matrix)
    }

    /// Inverse of the local matrix, kept in step with every pose setter
    pub fn local_inverse(self, scene: &Scene) -> Result<Mat4, TransformError> {
        self.read(scene, Hierarchy::local_inverse)
    }

    /// Translation part of the local matrix
    pub fn local_position(self, scene: &Scene) -> Result<Vec3, TransformError> {
        Ok(self.local_matrix(scene)?.w_axis.truncate())
    }

    /// Local rotation as last set
    pub fn local_rotation(self, scene: &Scene) -> Result<Quat, TransformError> {
        self.read(scene, Hierarchy::local_rotation)
    }

    /// Local scale as last set
    pub fn local_scale(self, scene: &Scene) -> Result<Vec3, TransformError> {
        self.read(scene, Hierarchy::local_scale)
    }

    /// Set the local translation, keeping rotation and scale
    pub fn set_local_position(
        self,
        scene: &mut Scene,
        position: Vec3,
    ) -> Result<(), TransformError> {
        scene.edit_pose(self, |h, i| h.set_local_position(i, position))
    }

    /// Set the local rotation, keeping translation and scale
    pub fn set_local_rotation(
        self,
        scene: &mut Scene,
        rotation: Quat,
    ) -> Result<(), TransformError> {
        scene.edit_pose(self, |h, i| h.set_local_rotation(i, rotation))
    }

    /// Set the local scale, keeping translation and rotation
    pub fn set_local_scale(self, scene: &mut Scene, scale: Vec3) -> Result<(), TransformError> {
        scene.edit_pose(self, |h, i| h.set_local_scale(i, scale))
    }

    /// Set the whole local pose at once
    pub fn set_local_transform(
        self,
        scene: &mut Scene,
        scale: Vec3,
        rotation: Quat,
        position: Vec3,
    ) -> Result<(), TransformError> {
        scene.edit_pose(self, |h, i| {
            h.set_local_transform(i, scale, rotation, position)
        })
    }

    // -------------------------------------------------------------------------
    // World pose
    // -------------------------------------------------------------------------

    /// World matrix as of the last update pass
    pub fn world_matrix(self, scene: &Scene) -> Result<Mat4, TransformError> {
        self.read(scene, Hierarchy::world_matrix)
    }

    /// Inverse of the world matrix as of the last update pass
    pub fn world_inverse(self, scene: &Scene) -> Result<Mat4, TransformError> {
        self.read(scene, Hierarchy::world_inverse)
    }

    /// Translation part of the world matrix
    pub fn world_position(self, scene: &Scene) -> Result<Vec3, TransformError> {
        Ok(self.world_matrix(scene)?.w_axis.truncate())
    }

    /// Parent-then-child product of rotations down to this node
    pub fn world_rotation(self, scene: &Scene) -> Result<Quat, TransformError> {
        self.read(scene, Hierarchy::world_rotation)
    }

    /// Length of each world basis column.
    ///
    /// Under a rotated non-uniform parent scale this is only an
    /// approximation, the world matrix then carries shear.
    pub fn world_scale(self, scene: &Scene) -> Result<Vec3, TransformError> {
        let m = self.world_matrix(scene)?;
        Ok(Vec3::new(
            m.x_axis.truncate().length(),
            m.y_axis.truncate().length(),
            m.z_axis.truncate().length(),
        ))
    }

    /// Move the node so its world position becomes `position`
    pub fn set_world_position(
        self,
        scene: &mut Scene,
        position: Vec3,
    ) -> Result<(), TransformError> {
        scene.refresh(self)?;
        let local = match self.parent(scene)? {
            Some(parent) => parent.world_inverse(scene)?.transform_point3(position),
            None => position,
        };
        self.set_local_position(scene, local)
    }

    /// Rotate the node so its world rotation becomes `rotation`
    pub fn set_world_rotation(
        self,
        scene: &mut Scene,
        rotation: Quat,
    ) -> Result<(), TransformError> {
        scene.refresh(self)?;
        let local = match self.parent(scene)? {
            Some(parent) => parent.world_rotation(scene)?.conjugate() * rotation,
            None => rotation,
        };
        self.set_local_rotation(scene, local)
    }

    // -------------------------------------------------------------------------
    // Basis vectors
    //
    // Taken from the world matrix columns, so they carry world scale and are
    // not orthonormal under a non-uniform or sheared parent chain.
    // -------------------------------------------------------------------------

    /// World X axis
    pub fn forward(self, scene: &Scene) -> Result<Vec3, TransformError> {
        Ok(self.world_matrix(scene)?.x_axis.truncate())
    }

    /// Negated world Y axis
    pub fn right(self, scene: &Scene) -> Result<Vec3, TransformError> {
        Ok(-self.world_matrix(scene)?.y_axis.truncate())
    }

    /// World Z axis
    pub fn up(self, scene: &Scene) -> Result<Vec3, TransformError> {
        Ok(self.world_matrix(scene)?.z_axis.truncate())
    }

    fn read<'s, T>(
        self,
        scene: &'s Scene,
        f: impl FnOnce(&'s Hierarchy, u32) -> T,
    ) -> Result<T, TransformError> {
        let (hierarchy, index) = scene.node(self)?;
        Ok(f(hierarchy, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneConfig;

    const EPSILON: f32 = 1e-5;

    fn assert_vec(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, EPSILON),
            "expected {expected}, got {actual}"
        );
    }

    /// root{A{A1}, B{B1}}, each child rotated a third turn about a diagonal
    fn build_frames(scene: &mut Scene) -> [Transform; 5] {
        let root = Transform::new_named(scene, None, "root").unwrap();
        let a = Transform::new_named(scene, Some(root), "A").unwrap();
        let b = Transform::new_named(scene, Some(root), "B").unwrap();
        let a1 = Transform::new_named(scene, Some(a), "A1").unwrap();
        let b1 = Transform::new_named(scene, Some(b), "B1").unwrap();

        root.set_local_position(scene, Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        a.set_local_position(scene, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        a.set_local_rotation(scene, Quat::from_xyzw(0.5, 0.5, 0.5, 0.5))
            .unwrap();
        a1.set_local_position(scene, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        a1.set_local_rotation(scene, Quat::from_xyzw(-0.5, -0.5, -0.5, 0.5))
            .unwrap();
        b.set_local_position(scene, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        b.set_local_rotation(scene, Quat::from_xyzw(0.5, -0.5, 0.5, 0.5))
            .unwrap();
        b1.set_local_position(scene, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        b1.set_local_rotation(scene, Quat::from_xyzw(-0.5, 0.5, -0.5, 0.5))
            .unwrap();

        [root, a, a1, b, b1]
    }

    #[test]
    fn test_world_position_of_rotated_child() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();

        root.set_local_position(&mut scene, Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        a.set_local_position(&mut scene, Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        a.set_local_rotation(&mut scene, Quat::from_xyzw(0.5, 0.5, 0.5, 0.5))
            .unwrap();

        assert_vec(a.world_position(&scene).unwrap(), Vec3::new(1.0, 0.0, 1.0));
        assert_vec(root.forward(&scene).unwrap(), Vec3::X);
    }

    #[test]
    fn test_frames() {
        let mut scene = Scene::new();
        let [root, a, a1, b, b1] = build_frames(&mut scene);

        assert_vec(root.forward(&scene).unwrap(), Vec3::X);
        assert_vec(root.right(&scene).unwrap(), Vec3::NEG_Y);
        assert_vec(root.up(&scene).unwrap(), Vec3::Z);

        assert_vec(a.world_position(&scene).unwrap(), Vec3::new(1.0, 0.0, 1.0));
        assert_vec(a.forward(&scene).unwrap(), Vec3::Y);
        assert_vec(a.right(&scene).unwrap(), Vec3::NEG_Z);
        assert_vec(a.up(&scene).unwrap(), Vec3::X);

        assert_vec(a1.world_position(&scene).unwrap(), Vec3::new(1.0, 1.0, 1.0));
        assert_vec(a1.forward(&scene).unwrap(), Vec3::X);
        assert!(
            a1.world_rotation(&scene)
                .unwrap()
                .abs_diff_eq(Quat::IDENTITY, EPSILON)
        );

        assert_vec(b.world_position(&scene).unwrap(), Vec3::new(0.0, 1.0, 1.0));
        assert_vec(b.forward(&scene).unwrap(), Vec3::Z);
        assert_vec(b.right(&scene).unwrap(), Vec3::X);
        assert_vec(b.up(&scene).unwrap(), Vec3::NEG_Y);

        assert_vec(b1.world_position(&scene).unwrap(), Vec3::new(-1.0, 1.0, 1.0));
        assert_vec(b1.forward(&scene).unwrap(), Vec3::X);
    }

    #[test]
    fn test_set_parent_merges_then_splits() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();
        let b = Transform::new(&mut scene, Some(root)).unwrap();
        let c = Transform::new(&mut scene, Some(root)).unwrap();
        let t = Transform::new(&mut scene, None).unwrap();
        let x = Transform::new(&mut scene, Some(t)).unwrap();
        let y = Transform::new(&mut scene, Some(t)).unwrap();
        let z = Transform::new(&mut scene, Some(t)).unwrap();
        let y1 = Transform::new(&mut scene, Some(y)).unwrap();
        let t_hierarchy = t.hierarchy(&scene).unwrap();
        assert_eq!(scene.hierarchy_count(), 2);

        t.set_parent(&mut scene, Some(b)).unwrap();

        assert_eq!(scene.hierarchy_count(), 1);
        assert!(scene.hierarchy(t_hierarchy).is_none());
        let id = root.hierarchy(&scene).unwrap();
        assert_eq!(scene.hierarchy(id).unwrap().len(), 9);
        let expected = [
            (root, 0),
            (a, 1),
            (b, 2),
            (c, 3),
            (t, 4),
            (x, 5),
            (y, 6),
            (z, 7),
            (y1, 8),
        ];
        for (node, index) in expected {
            assert_eq!(node.hierarchy(&scene).unwrap(), id);
            assert_eq!(node.index(&scene).unwrap(), index);
        }
        assert_eq!(t.parent(&scene).unwrap(), Some(b));
        assert_eq!(y1.parent(&scene).unwrap(), Some(y));
        assert_eq!(b.children(&scene).unwrap().as_slice(), &[t]);

        y.set_parent(&mut scene, None).unwrap();

        assert_eq!(scene.hierarchy_count(), 2);
        assert_eq!(scene.hierarchy(id).unwrap().len(), 7);
        let split = y.hierarchy(&scene).unwrap();
        assert_ne!(split, id);
        assert_eq!(scene.hierarchy(split).unwrap().len(), 2);
        assert_eq!(y.index(&scene).unwrap(), 0);
        assert_eq!(y.parent(&scene).unwrap(), None);
        assert_eq!(y1.parent(&scene).unwrap(), Some(y));
        assert_eq!(t.children(&scene).unwrap().as_slice(), &[x, z]);
        assert_eq!(z.index(&scene).unwrap(), 6);
    }

    #[test]
    fn test_delete_subtree_shrinks_hierarchy() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();
        let b = Transform::new(&mut scene, Some(root)).unwrap();
        let a1 = Transform::new(&mut scene, Some(a)).unwrap();
        let a2 = Transform::new(&mut scene, Some(a)).unwrap();
        let a1a = Transform::new(&mut scene, Some(a1)).unwrap();
        let b1 = Transform::new(&mut scene, Some(b)).unwrap();
        let id = root.hierarchy(&scene).unwrap();
        assert_eq!(scene.hierarchy(id).unwrap().len(), 7);

        a.delete(&mut scene).unwrap();

        let h = scene.hierarchy(id).unwrap();
        assert_eq!(h.len(), 3);
        h.check_invariants().unwrap();
        for gone in [a, a1, a2, a1a] {
            assert!(!gone.is_valid(&scene));
            assert_eq!(gone.parent(&scene), Err(TransformError::Stale(gone.entity())));
        }
        assert_eq!(b.index(&scene).unwrap(), 1);
        assert_eq!(b1.index(&scene).unwrap(), 2);
        assert_eq!(b1.parent(&scene).unwrap(), Some(b));
        assert_eq!(root.children(&scene).unwrap().as_slice(), &[b]);
    }

    #[test]
    fn test_delete_root_removes_hierarchy() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let child = Transform::new(&mut scene, Some(root)).unwrap();
        let other = Transform::new(&mut scene, None).unwrap();

        root.delete(&mut scene).unwrap();

        assert_eq!(scene.hierarchy_count(), 1);
        assert!(!child.is_valid(&scene));
        assert!(other.is_valid(&scene));
        assert_eq!(root.delete(&mut scene), Err(TransformError::Stale(root.entity())));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();
        let a1 = Transform::new(&mut scene, Some(a)).unwrap();

        assert_eq!(
            a.set_parent(&mut scene, Some(a1)),
            Err(TransformError::Cycle {
                node: a.entity(),
                parent: a1.entity()
            })
        );
        assert!(matches!(
            a.set_parent(&mut scene, Some(a)),
            Err(TransformError::Cycle { .. })
        ));
        assert_eq!(a.parent(&scene).unwrap(), Some(root));
        assert_eq!(a1.parent(&scene).unwrap(), Some(a));
    }

    #[test]
    fn test_reparent_within_hierarchy() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();
        let b = Transform::new(&mut scene, Some(root)).unwrap();
        let a1 = Transform::new(&mut scene, Some(a)).unwrap();
        b.set_local_position(&mut scene, Vec3::new(0.0, 2.0, 0.0))
            .unwrap();
        a.set_local_position(&mut scene, Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        a.set_parent(&mut scene, Some(b)).unwrap();

        assert_eq!(scene.hierarchy_count(), 1);
        assert_eq!(a.parent(&scene).unwrap(), Some(b));
        assert_eq!(a1.parent(&scene).unwrap(), Some(a));
        assert_eq!(root.children(&scene).unwrap().as_slice(), &[b]);
        assert_vec(a.world_position(&scene).unwrap(), Vec3::new(1.0, 2.0, 0.0));
        assert_vec(a1.world_position(&scene).unwrap(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_child_lookup() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let a = Transform::new(&mut scene, Some(root)).unwrap();
        let b = Transform::new(&mut scene, Some(root)).unwrap();

        assert_eq!(root.child_count(&scene).unwrap(), 2);
        assert_eq!(root.child(&scene, 0).unwrap(), Some(a));
        assert_eq!(root.child(&scene, 1).unwrap(), Some(b));
        assert_eq!(root.child(&scene, 2).unwrap(), None);
        assert_eq!(a.child_count(&scene).unwrap(), 0);
    }

    #[test]
    fn test_name_and_tag() {
        let mut scene = Scene::new();
        let root = Transform::new_named(&mut scene, None, "root").unwrap();
        let child = Transform::new(&mut scene, Some(root)).unwrap();

        assert_eq!(root.name(&scene).unwrap(), Some("root"));
        assert_eq!(child.name(&scene).unwrap(), None);

        child.set_name(&mut scene, Some("arm".to_string())).unwrap();
        child.set_tag(&mut scene, 0b101).unwrap();
        root.set_name(&mut scene, None).unwrap();

        assert_eq!(child.name(&scene).unwrap(), Some("arm"));
        assert_eq!(child.tag(&scene).unwrap(), 0b101);
        assert_eq!(root.name(&scene).unwrap(), None);
        assert_eq!(root.tag(&scene).unwrap(), 0);
    }

    #[test]
    fn test_local_transform_round_trip() {
        let mut scene = Scene::new();
        let t = Transform::new(&mut scene, None).unwrap();
        let scale = Vec3::new(2.0, 0.5, 1.5);
        let rotation = Quat::from_euler(glam::EulerRot::ZYX, 0.4, -0.9, 1.3);
        let position = Vec3::new(-3.0, 4.0, 0.25);

        t.set_local_transform(&mut scene, scale, rotation, position)
            .unwrap();

        let (s, r, p) = t.local_matrix(&scene).unwrap().to_scale_rotation_translation();
        assert_vec(s, scale);
        assert!(r.abs_diff_eq(rotation, 1e-4) || r.abs_diff_eq(-rotation, 1e-4));
        assert_vec(p, position);
        assert_vec(t.local_position(&scene).unwrap(), position);
        assert_vec(t.local_scale(&scene).unwrap(), scale);
        assert_eq!(t.local_rotation(&scene).unwrap(), rotation);
        assert!(
            (t.local_matrix(&scene).unwrap() * t.local_inverse(&scene).unwrap())
                .abs_diff_eq(Mat4::IDENTITY, 1e-4)
        );
    }

    #[test]
    fn test_setters_keep_other_components() {
        let mut scene = Scene::new();
        let t = Transform::new(&mut scene, None).unwrap();
        let rotation = Quat::from_rotation_z(1.0);

        t.set_local_position(&mut scene, Vec3::new(1.0, 2.0, 3.0))
            .unwrap();
        t.set_local_scale(&mut scene, Vec3::splat(2.0)).unwrap();
        t.set_local_rotation(&mut scene, rotation).unwrap();

        assert_vec(t.local_position(&scene).unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_vec(t.world_scale(&scene).unwrap(), Vec3::splat(2.0));
        assert!(t.world_rotation(&scene).unwrap().abs_diff_eq(rotation, EPSILON));
    }

    #[test]
    fn test_set_world_position_and_rotation() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let child = Transform::new(&mut scene, Some(root)).unwrap();
        root.set_local_transform(
            &mut scene,
            Vec3::splat(2.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(5.0, 0.0, 0.0),
        )
        .unwrap();

        let target = Vec3::new(1.0, 2.0, 3.0);
        child.set_world_position(&mut scene, target).unwrap();
        assert!(child.world_position(&scene).unwrap().abs_diff_eq(target, 1e-4));

        let rotation = Quat::from_rotation_x(0.3);
        child.set_world_rotation(&mut scene, rotation).unwrap();
        assert!(child.world_rotation(&scene).unwrap().abs_diff_eq(rotation, 1e-4));
        assert!(child.world_position(&scene).unwrap().abs_diff_eq(target, 1e-4));
    }

    #[test]
    fn test_set_world_position_in_deferred_mode() {
        let mut scene = Scene::with_config(SceneConfig::default().with_eager_updates(false));
        let root = Transform::new(&mut scene, None).unwrap();
        let child = Transform::new(&mut scene, Some(root)).unwrap();
        root.set_local_position(&mut scene, Vec3::new(0.0, 0.0, 4.0))
            .unwrap();

        child.set_world_position(&mut scene, Vec3::new(0.0, 0.0, 5.0))
            .unwrap();
        assert_vec(child.local_position(&scene).unwrap(), Vec3::Z);

        scene.update_matrices();
        assert_vec(child.world_position(&scene).unwrap(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_local_inverse_current_in_deferred_mode() {
        let mut scene = Scene::with_config(SceneConfig::default().with_eager_updates(false));
        let root = Transform::new(&mut scene, None).unwrap();
        let child = Transform::new(&mut scene, Some(root)).unwrap();

        child
            .set_local_position(&mut scene, Vec3::new(3.0, 0.0, 0.0))
            .unwrap();
        let m = child.local_matrix(&scene).unwrap();
        let inv = child.local_inverse(&scene).unwrap();
        assert!((m * inv).abs_diff_eq(Mat4::IDENTITY, 1e-4));

        child
            .set_local_transform(
                &mut scene,
                Vec3::new(2.0, 0.5, 1.0),
                Quat::from_rotation_x(0.8),
                Vec3::new(-1.0, 4.0, 2.0),
            )
            .unwrap();
        let m = child.local_matrix(&scene).unwrap();
        let inv = child.local_inverse(&scene).unwrap();
        assert!((m * inv).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert!(scene.hierarchy(child.hierarchy(&scene).unwrap()).unwrap().is_dirty());
    }

    #[test]
    fn test_duplicate_copies_subtree() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        let arm = Transform::new_named(&mut scene, Some(root), "arm").unwrap();
        let hand = Transform::new_named(&mut scene, Some(arm), "hand").unwrap();
        arm.set_local_position(&mut scene, Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        hand.set_local_position(&mut scene, Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        let copy = arm.duplicate(&mut scene).unwrap();

        assert_eq!(scene.hierarchy_count(), 2);
        assert_ne!(copy, arm);
        assert_eq!(copy.parent(&scene).unwrap(), None);
        assert_eq!(copy.name(&scene).unwrap(), Some("arm"));
        let copied_hand = copy.child(&scene, 0).unwrap().unwrap();
        assert_ne!(copied_hand, hand);
        assert_eq!(copied_hand.name(&scene).unwrap(), Some("hand"));
        assert_vec(copied_hand.world_position(&scene).unwrap(), Vec3::new(1.0, 0.0, 1.0));

        copy.delete(&mut scene).unwrap();
        assert!(hand.is_valid(&scene));
        assert_eq!(hand.parent(&scene).unwrap(), Some(arm));
    }

    #[test]
    fn test_detach_root_is_noop() {
        let mut scene = Scene::new();
        let root = Transform::new(&mut scene, None).unwrap();
        Transform::new(&mut scene, Some(root)).unwrap();
        let id = root.hierarchy(&scene).unwrap();

        root.set_parent(&mut scene, None).unwrap();

        assert_eq!(scene.hierarchy_count(), 1);
        assert_eq!(root.hierarchy(&scene).unwrap(), id);
    }
}
