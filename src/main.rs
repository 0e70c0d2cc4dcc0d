//! Demo building a small scene graph and logging its layout

use scenegraph::prelude::*;

fn main() -> Result<(), TransformError> {
    env_logger::init();

    let mut scene = Scene::new();

    let root = Transform::new_named(&mut scene, None, "root")?;
    root.set_local_position(&mut scene, Vec3::new(0.0, 0.0, 1.0))?;

    let arm = Transform::new_named(&mut scene, Some(root), "arm")?;
    arm.set_local_position(&mut scene, Vec3::new(1.0, 0.0, 0.0))?;
    arm.set_local_rotation(&mut scene, Quat::from_xyzw(0.5, 0.5, 0.5, 0.5))?;

    let hand = Transform::new_named(&mut scene, Some(arm), "hand")?;
    hand.set_local_position(&mut scene, Vec3::new(1.0, 0.0, 0.0))?;

    let prop = Transform::new_named(&mut scene, None, "prop")?;
    let handle = Transform::new_named(&mut scene, Some(prop), "handle")?;
    handle.set_local_position(&mut scene, Vec3::new(0.0, 0.5, 0.0))?;

    log::info!(
        "Built {} transforms in {} hierarchies",
        scene.transform_count(),
        scene.hierarchy_count()
    );

    // Pick the prop up: its tree merges into the root's.
    prop.set_parent(&mut scene, Some(hand))?;
    for t in [root, arm, hand, prop, handle] {
        log::info!(
            "{:<8} world position {} forward {}",
            t.name(&scene)?.unwrap_or("-"),
            t.world_position(&scene)?,
            t.forward(&scene)?
        );
    }

    // Drop it again: it splits back out into its own tree.
    prop.set_parent(&mut scene, None)?;
    prop.set_world_position(&mut scene, Vec3::ZERO)?;
    log::info!("Dropped prop at {}", prop.world_position(&scene)?);

    for (id, hierarchy) in scene.hierarchies() {
        log::info!("Hierarchy {id:?}:\n{}", hierarchy.dump());
    }
    Ok(())
}
