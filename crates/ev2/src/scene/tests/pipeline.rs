//! Transform propagation into the registry and the full frame pipeline

use super::context;
use crate::assets::{Model, ModelHandle};
use crate::context::Context;
use crate::core::config::{ApplicationConfig, PhysicsConfig};
use crate::engine::Engine;
use crate::foundation::math::{Mat4Ext, Transform, Vec3};
use crate::physics::{BodyDesc, ColliderShape};
use crate::render::{LightDesc, MaterialDesc, RenderQueue};
use crate::scene::{Camera, Capabilities, HookResult, Node, NodeBehaviour, Scene};
use approx::assert_relative_eq;

fn cube(ctx: &mut Context) -> ModelHandle {
    let model = Model::cube("cube", 0.5, MaterialDesc::colored("white", [1.0, 1.0, 1.0, 1.0]));
    ctx.assets.register(model).unwrap();
    ctx.assets.acquire("cube", &mut ctx.registry).unwrap()
}

fn instance_translation(ctx: &Context, node: &Node) -> Option<Vec3> {
    let id = node.mesh_instances()[0];
    ctx.registry.get_mesh_instance(id)?.world.map(|world| world.translation_part())
}

#[test]
fn test_pre_render_pushes_composed_world_transforms() {
    let mut ctx = context();
    let scene = Scene::new("test");
    let handle = cube(&mut ctx);

    let arm = Node::new("arm");
    arm.set_position(Vec3::new(1.0, 0.0, 0.0));
    let hand = Node::builder("hand")
        .transform(Transform::from_position(Vec3::new(0.0, 2.0, 0.0)))
        .model(&handle)
        .light(LightDesc::point(Vec3::new(1.0, 1.0, 1.0), 2.0, 5.0))
        .build(&mut ctx)
        .unwrap();
    arm.add_child(&hand, &mut ctx).unwrap();
    scene.add_node(&arm, None, &mut ctx).unwrap();

    // Nothing is pushed before the first render pass
    assert_eq!(instance_translation(&ctx, &hand), None);
    assert_eq!(hand.capabilities(), Capabilities::RENDER | Capabilities::LIGHT);

    scene.update_pre_render(&mut ctx).unwrap();
    assert_relative_eq!(instance_translation(&ctx, &hand).unwrap(), Vec3::new(1.0, 2.0, 0.0));
    let light = ctx.registry.get_light(hand.light().unwrap()).unwrap();
    assert_relative_eq!(light.world_position().unwrap(), Vec3::new(1.0, 2.0, 0.0));
    assert_relative_eq!(hand.cached_world_matrix(), hand.world_matrix());

    arm.translate(Vec3::new(0.0, 0.0, -3.0));
    scene.update_pre_render(&mut ctx).unwrap();
    assert_relative_eq!(instance_translation(&ctx, &hand).unwrap(), Vec3::new(1.0, 2.0, -3.0));
}

/// Moves its node up by one unit right before every push
struct Bob;

impl NodeBehaviour for Bob {
    fn pre_render(&mut self, node: &Node, _ctx: &mut Context) -> HookResult {
        node.translate(Vec3::new(0.0, 1.0, 0.0));
        Ok(())
    }
}

#[test]
fn test_pre_render_hook_runs_before_the_push() {
    let mut ctx = context();
    let scene = Scene::new("test");
    let handle = cube(&mut ctx);
    let bobbing = Node::builder("bobbing").model(&handle).behaviour(Bob).build(&mut ctx).unwrap();
    let rider = Node::builder("rider").model(&handle).build(&mut ctx).unwrap();
    bobbing.add_child(&rider, &mut ctx).unwrap();
    scene.add_node(&bobbing, None, &mut ctx).unwrap();

    scene.update_pre_render(&mut ctx).unwrap();
    assert_relative_eq!(instance_translation(&ctx, &bobbing).unwrap(), Vec3::new(0.0, 1.0, 0.0));
    // Children see the parent's post-hook transform
    assert_relative_eq!(instance_translation(&ctx, &rider).unwrap(), Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_destroy_releases_registry_and_physics_ids() {
    let mut ctx = context();
    let scene = Scene::new("test");
    let handle = cube(&mut ctx);
    let crate_node = Node::builder("crate")
        .model(&handle)
        .light(LightDesc::directional(Vec3::new(1.0, 1.0, 1.0), 1.0))
        .body(BodyDesc::dynamic(ColliderShape::cuboid(Vec3::new(0.5, 0.5, 0.5))))
        .build(&mut ctx)
        .unwrap();
    scene.add_node(&crate_node, None, &mut ctx).unwrap();
    let instance = crate_node.mesh_instances()[0];
    assert_eq!(ctx.registry.mesh_instance_count(), 1);
    assert_eq!(ctx.registry.light_count(), 1);
    assert_eq!(ctx.physics.body_count(), 1);

    scene.destroy_node(&crate_node, &mut ctx).unwrap();
    assert_eq!(ctx.registry.mesh_instance_count(), 0);
    assert_eq!(ctx.registry.light_count(), 0);
    assert_eq!(ctx.physics.body_count(), 0);
    assert!(crate_node.mesh_instances().is_empty());
    // The old id stays stale even after the slot is reused
    let again = ctx.registry.create_mesh_instance(handle.meshes()[0], None).unwrap();
    assert_ne!(again, instance);
    assert!(ctx.registry.get_mesh_instance(instance).is_none());

    ctx.registry.destroy_mesh_instance(again).unwrap();
    ctx.assets.release("cube", &mut ctx.registry).unwrap();
    assert_eq!(ctx.registry.mesh_count(), 0);
}

#[test]
fn test_hidden_and_unpushed_instances_are_not_drawn() {
    let mut ctx = context();
    let scene = Scene::new("test");
    let handle = cube(&mut ctx);
    let shown = Node::builder("shown").model(&handle).build(&mut ctx).unwrap();
    let hidden = Node::builder("hidden").model(&handle).build(&mut ctx).unwrap();
    let camera = Node::builder("camera")
        .transform(Transform::from_position(Vec3::new(0.0, 0.0, 10.0)))
        .camera(Camera::default())
        .build(&mut ctx)
        .unwrap();
    for node in [&shown, &hidden, &camera] {
        scene.add_node(node, None, &mut ctx).unwrap();
    }
    scene.set_active_camera(Some(&camera)).unwrap();
    ctx.registry.set_instance_visible(hidden.mesh_instances()[0], false).unwrap();

    // Attached after the render pass: never pushed
    scene.update_pre_render(&mut ctx).unwrap();
    let late = Node::builder("late").model(&handle).build(&mut ctx).unwrap();
    scene.add_node(&late, None, &mut ctx).unwrap();

    let matrices = scene.camera_matrices(1.0).unwrap();
    assert_relative_eq!(matrices.position, Vec3::new(0.0, 0.0, 10.0));
    let queue = RenderQueue::build(&ctx.registry, &matrices);
    assert_eq!(queue.command_count(), 1);
    assert_eq!(queue.skipped(), 1);
}

#[test]
fn test_engine_frame_interpolates_falling_body() {
    let mut config = ApplicationConfig::default();
    config.physics = PhysicsConfig::new().with_fixed_timestep(0.1).with_gravity([0.0, -10.0, 0.0]);
    let mut engine = Engine::new(config).unwrap();

    let (scene, ctx) = engine.parts_mut();
    let handle = cube(ctx);
    let group = Node::new("offset-group");
    group.set_position(Vec3::new(50.0, 0.0, 0.0));
    let ball = Node::builder("ball")
        .transform(Transform::from_position(Vec3::new(0.0, 10.0, 0.0)))
        .model(&handle)
        .body(BodyDesc::dynamic(ColliderShape::sphere(0.5)))
        .build(ctx)
        .unwrap();
    group.add_child(&ball, ctx).unwrap();
    scene.add_node(&group, None, ctx).unwrap();

    // One step taken, half a step left over
    let report = engine.frame(0.15).unwrap();
    assert_eq!(report.physics_steps, 1);
    assert_eq!(report.synced_bodies, 1);
    assert_relative_eq!(report.alpha, 0.5, epsilon = 1e-3);

    let body = ball.body().unwrap();
    let blended = engine.context().physics.interpolated(body).unwrap();
    let y = ball.transform().position.y;
    assert_relative_eq!(y, blended.position.y);
    assert!(y < 10.0 && y > 9.8);

    // Body nodes ignore the parent's offset
    let ctx = engine.context();
    let pushed = instance_translation(ctx, &ball).unwrap();
    assert_relative_eq!(pushed.x, 0.0);
    assert_relative_eq!(pushed.y, ball.transform().position.y);
}

#[test]
fn test_raycast_picks_the_node_in_front() {
    let mut ctx = context();
    let scene = Scene::new("test");
    let near = Node::builder("near")
        .transform(Transform::from_position(Vec3::new(0.0, 0.0, -5.0)))
        .body(BodyDesc::fixed(ColliderShape::sphere(1.0)))
        .build(&mut ctx)
        .unwrap();
    let far = Node::builder("far")
        .transform(Transform::from_position(Vec3::new(0.0, 0.0, -20.0)))
        .body(BodyDesc::fixed(ColliderShape::sphere(1.0)))
        .build(&mut ctx)
        .unwrap();
    scene.add_node(&far, None, &mut ctx).unwrap();
    scene.add_node(&near, None, &mut ctx).unwrap();

    let hit = ctx.physics.raycast(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 100.0).unwrap();
    assert!(hit.node.ptr_eq(&near));
    assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-4);

    scene.destroy_node(&near, &mut ctx).unwrap();
    let hit = ctx.physics.raycast(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 100.0).unwrap();
    assert!(hit.node.ptr_eq(&far));
    assert!(ctx.physics.raycast(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 10.0).is_none());
}
