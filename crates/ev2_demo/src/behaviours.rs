//! Node behaviours driving the ball pit

use crate::config::{CameraConfig, GameplayConfig};
use ev2::foundation::math::Mat4Ext;
use ev2::prelude::*;
use ev2::render::MaterialId;
use nalgebra::UnitQuaternion;
use rand::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Counters shared between the behaviours and the application
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameStats {
    /// Balls created by the spawner
    pub spawned: u32,
    /// Balls whose node was destroyed, for any reason
    pub removed: u32,
    /// Balls destroyed by a pick ray
    pub picked: u32,
}

/// Shared handle to [`GameStats`]
pub type SharedStats = Rc<RefCell<GameStats>>;

/// Drops balls into the pit at a fixed interval
///
/// Balls become children of the spawner node so the live count is its
/// child count. Their bodies make them ignore the spawner's transform.
pub struct Spawner {
    model: ModelHandle,
    palette: Vec<MaterialId>,
    settings: GameplayConfig,
    rng: StdRng,
    timer: f32,
    stats: SharedStats,
}

impl Spawner {
    /// Create a spawner placing `model` with one of `palette` per ball
    pub fn new(model: ModelHandle, palette: Vec<MaterialId>, settings: GameplayConfig, stats: SharedStats) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            model,
            palette,
            settings,
            rng,
            timer: 0.0,
            stats,
        }
    }

    fn spawn(&mut self, spawner: &Node, ctx: &mut Context) -> HookResult {
        let extent = self.settings.pit_half_extent;
        let position = Vec3::new(
            self.rng.gen_range(-extent..extent),
            self.settings.spawn_height,
            self.rng.gen_range(-extent..extent),
        );
        let velocity = Vec3::new(
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(0.0..2.0),
            self.rng.gen_range(-1.0..1.0),
        );
        let (min, max) = self.settings.ball_lifetime;
        let lifetime = self.rng.gen_range(min..=max);
        let material = self.palette.choose(&mut self.rng).copied();

        let index = self.stats.borrow().spawned;
        let mut builder = Node::builder(format!("ball-{index}"))
            .transform(Transform::from_position(position))
            .body(
                BodyDesc::dynamic(ColliderShape::sphere(self.settings.ball_radius))
                    .with_velocity(velocity)
                    .with_layers(CollisionLayers::DEBRIS),
            )
            .behaviour(Lifetime::new(lifetime, self.settings.kill_height, self.stats.clone()));
        for mesh in self.model.meshes() {
            builder = builder.mesh_instance(*mesh, material);
        }
        let ball = builder.build(ctx)?;
        spawner.add_child(&ball, ctx)?;

        self.stats.borrow_mut().spawned += 1;
        log::debug!("Spawned {} at {:?} for {:.1}s", ball.name(), position, lifetime);
        Ok(())
    }
}

impl NodeBehaviour for Spawner {
    fn on_process(&mut self, node: &Node, ctx: &mut Context, delta: f32) -> HookResult {
        self.timer += delta;
        while self.timer >= self.settings.spawn_interval {
            self.timer -= self.settings.spawn_interval;
            if node.child_count() < self.settings.max_balls {
                self.spawn(node, ctx)?;
            }
        }
        Ok(())
    }
}

/// Removes its node once the time runs out or it falls out of the world
pub struct Lifetime {
    remaining: f32,
    kill_height: f32,
    stats: SharedStats,
}

impl Lifetime {
    /// Create a lifetime of `seconds`
    pub fn new(seconds: f32, kill_height: f32, stats: SharedStats) -> Self {
        Self {
            remaining: seconds,
            kill_height,
            stats,
        }
    }

    /// Seconds left before removal
    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

impl NodeBehaviour for Lifetime {
    fn on_process(&mut self, node: &Node, ctx: &mut Context, delta: f32) -> HookResult {
        self.remaining -= delta;
        if self.remaining <= 0.0 || node.transform().position.y < self.kill_height {
            ctx.queue_destroy(node);
        }
        Ok(())
    }

    fn on_destroy(&mut self, _node: &Node, _ctx: &mut Context) -> HookResult {
        self.stats.borrow_mut().removed += 1;
        Ok(())
    }
}

/// Orbits the pit centre, steered by the arrow keys and the mouse wheel
pub struct OrbitCamera {
    settings: CameraConfig,
    target: Vec3,
    angle: f32,
    radius: f32,
}

impl OrbitCamera {
    /// Closest allowed orbit
    pub const MIN_RADIUS: f32 = 2.0;
    /// Farthest allowed orbit
    pub const MAX_RADIUS: f32 = 100.0;

    /// Create a camera orbiting `target`
    pub fn new(settings: CameraConfig, target: Vec3) -> Self {
        let radius = settings.orbit_radius.clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);
        Self {
            settings,
            target,
            angle: 0.0,
            radius,
        }
    }

    /// Current distance from the target
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Current orbit angle in radians
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Eye on the orbit looking at `target`
    pub fn pose(&self) -> Transform {
        let eye = self.target
            + Vec3::new(
                self.radius * self.angle.cos(),
                self.settings.orbit_height,
                self.radius * self.angle.sin(),
            );
        // Local +Z points away from the target, so the camera looks down -Z at it
        let rotation = UnitQuaternion::face_towards(&(eye - self.target), &Vec3::y());
        Transform::from_position_rotation(eye, rotation)
    }
}

impl NodeBehaviour for OrbitCamera {
    fn on_ready(&mut self, node: &Node, _ctx: &mut Context) -> HookResult {
        node.set_transform(self.pose());
        Ok(())
    }

    fn on_process(&mut self, node: &Node, ctx: &mut Context, delta: f32) -> HookResult {
        let turn = ctx.input.axis(KeyCode::Left, KeyCode::Right);
        self.angle += (self.settings.orbit_speed + turn * self.settings.turn_speed) * delta;

        let zoom = ctx.input.axis(KeyCode::Down, KeyCode::Up) + ctx.input.wheel_delta().y;
        self.radius = (self.radius - zoom * self.settings.zoom_speed * delta)
            .clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);

        node.set_transform(self.pose());
        Ok(())
    }
}

/// Casts a ray along its node's forward axis and pops the ball it hits
///
/// Meant to sit under the camera so it inherits the view direction.
pub struct Picker {
    range: f32,
    stats: SharedStats,
}

impl Picker {
    /// Create a picker reaching `range` units
    pub fn new(range: f32, stats: SharedStats) -> Self {
        Self { range, stats }
    }

    /// Pop the first ball along `node`'s forward axis
    pub fn pick(&self, node: &Node, ctx: &mut Context) -> Option<Node> {
        let world = node.world_matrix();
        let origin = world.translation_part();
        let forward = world.transform_vector(&-Vec3::z());
        let hit = ctx.physics.raycast(origin, forward, self.range)?;

        if hit.node.with_behaviour::<Lifetime, _>(|_| ()).is_none() {
            log::debug!("Pick ray hit '{}' at {:.2}", hit.node.name(), hit.distance);
            return None;
        }
        log::info!("Picked {} at distance {:.2}", hit.node.name(), hit.distance);
        ctx.queue_destroy(&hit.node);
        self.stats.borrow_mut().picked += 1;
        Some(hit.node)
    }
}

impl NodeBehaviour for Picker {
    fn on_process(&mut self, node: &Node, ctx: &mut Context, _delta: f32) -> HookResult {
        if ctx.input.is_key_just_pressed(KeyCode::Space) || ctx.input.is_button_just_pressed(MouseButton::Left) {
            self.pick(node, ctx);
        }
        Ok(())
    }
}

/// Slowly pulses the brightness of one material
pub struct Pulse {
    material: MaterialId,
    base_color: [f32; 4],
    period: f32,
    elapsed: f32,
    level: i32,
}

impl Pulse {
    /// Brightness steps per half period
    const STEPS: f32 = 4.0;

    /// Pulse `material` around `base_color` once every `period` seconds
    pub fn new(material: MaterialId, base_color: [f32; 4], period: f32) -> Self {
        Self {
            material,
            base_color,
            period: period.max(f32::EPSILON),
            elapsed: 0.0,
            level: i32::MIN,
        }
    }
}

impl NodeBehaviour for Pulse {
    fn on_process(&mut self, _node: &Node, _ctx: &mut Context, delta: f32) -> HookResult {
        self.elapsed = (self.elapsed + delta) % self.period;
        Ok(())
    }

    fn pre_render(&mut self, _node: &Node, ctx: &mut Context) -> HookResult {
        let wave = (self.elapsed / self.period * std::f32::consts::TAU).sin();
        // Quantized so the material only changes a few times per period
        #[allow(clippy::cast_possible_truncation)]
        let level = (wave * Self::STEPS).round() as i32;
        if level == self.level {
            return Ok(());
        }
        self.level = level;

        #[allow(clippy::cast_precision_loss)]
        let brightness = 0.8 + 0.2 * level as f32 / Self::STEPS;
        let [r, g, b, a] = self.base_color;
        ctx.registry
            .set_material_property(self.material, MaterialProperty::BaseColor([r * brightness, g * brightness, b * brightness, a]))
            .map_err(EngineError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats() -> SharedStats {
        Rc::new(RefCell::new(GameStats::default()))
    }

    fn ball_model(ctx: &mut Context) -> ModelHandle {
        let model = Model::uv_sphere("ball", 0.5, 8, 6, MaterialDesc::colored("ball", [1.0, 0.0, 0.0, 1.0]));
        ctx.assets.register(model).unwrap();
        ctx.assets.acquire("ball", &mut ctx.registry).unwrap()
    }

    #[test]
    fn test_orbit_camera_looks_at_target() {
        let camera = OrbitCamera::new(CameraConfig::default(), Vec3::zeros());
        let pose = camera.pose();
        let forward = pose.rotation * -Vec3::z();
        let to_target = (-pose.position).normalize();
        assert_relative_eq!(forward, to_target, epsilon = 1e-5);
        assert_relative_eq!(pose.position.y, CameraConfig::default().orbit_height);
    }

    #[test]
    fn test_orbit_camera_follows_input() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let settings = CameraConfig {
            orbit_speed: 0.0,
            ..CameraConfig::default()
        };
        let camera = Node::builder("camera")
            .camera(Camera::default())
            .behaviour(OrbitCamera::new(settings.clone(), Vec3::zeros()))
            .build(&mut ctx)
            .unwrap();
        scene.add_node(&camera, None, &mut ctx).unwrap();

        scene.update(0.5, &mut ctx).unwrap();
        let idle = camera.with_behaviour::<OrbitCamera, _>(|orbit| orbit.angle()).unwrap();
        assert_relative_eq!(idle, 0.0);

        ctx.input.handle_key_input(KeyCode::Right, true);
        ctx.input.handle_key_input(KeyCode::Up, true);
        scene.update(0.5, &mut ctx).unwrap();
        let (angle, radius) = camera
            .with_behaviour::<OrbitCamera, _>(|orbit| (orbit.angle(), orbit.radius()))
            .unwrap();
        assert_relative_eq!(angle, settings.turn_speed * 0.5);
        assert_relative_eq!(radius, settings.orbit_radius - settings.zoom_speed * 0.5);
    }

    #[test]
    fn test_spawner_respects_ball_limit() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let stats = stats();
        let model = ball_model(&mut ctx);
        let settings = GameplayConfig {
            spawn_interval: 0.1,
            max_balls: 3,
            ..GameplayConfig::default()
        };
        let spawner = Node::builder("spawner")
            .behaviour(Spawner::new(model, Vec::new(), settings, stats.clone()))
            .build(&mut ctx)
            .unwrap();
        scene.add_node(&spawner, None, &mut ctx).unwrap();

        scene.update(0.25, &mut ctx).unwrap();
        assert_eq!(spawner.child_count(), 2);
        scene.update(0.5, &mut ctx).unwrap();
        assert_eq!(spawner.child_count(), 3);
        assert_eq!(stats.borrow().spawned, 3);
        assert_eq!(ctx.physics.body_count(), 3);
        assert_eq!(ctx.registry.mesh_instance_count(), 3);
    }

    #[test]
    fn test_spawner_is_deterministic_per_seed() {
        let positions = || {
            let mut ctx = Context::default();
            let mut scene = Scene::new("test");
            let model = ball_model(&mut ctx);
            let spawner = Node::builder("spawner")
                .behaviour(Spawner::new(model, Vec::new(), GameplayConfig::default(), stats()))
                .build(&mut ctx)
                .unwrap();
            scene.add_node(&spawner, None, &mut ctx).unwrap();
            scene.update(1.0, &mut ctx).unwrap();
            spawner.children().iter().map(|ball| ball.transform().position).collect::<Vec<_>>()
        };
        let first = positions();
        assert!(!first.is_empty());
        assert_eq!(first, positions());
    }

    #[test]
    fn test_lifetime_expiry_destroys_after_the_pass() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let stats = stats();
        let ball = Node::builder("ball")
            .behaviour(Lifetime::new(1.0, -10.0, stats.clone()))
            .build(&mut ctx)
            .unwrap();
        scene.add_node(&ball, None, &mut ctx).unwrap();

        scene.update(0.6, &mut ctx).unwrap();
        assert!(ball.in_scene());
        scene.update(0.6, &mut ctx).unwrap();
        assert!(ball.is_destroyed());
        assert_eq!(stats.borrow().removed, 1);
        assert_eq!(ctx.pending_destroy_count(), 0);
    }

    #[test]
    fn test_lifetime_removes_fallen_balls() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let ball = Node::builder("ball")
            .transform(Transform::from_position(Vec3::new(0.0, -50.0, 0.0)))
            .behaviour(Lifetime::new(100.0, -10.0, stats()))
            .build(&mut ctx)
            .unwrap();
        scene.add_node(&ball, None, &mut ctx).unwrap();
        scene.update(0.01, &mut ctx).unwrap();
        assert!(ball.is_destroyed());
    }

    #[test]
    fn test_picker_pops_the_ball_in_front() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let stats = stats();
        let wall = Node::builder("wall")
            .transform(Transform::from_position(Vec3::new(0.0, 0.0, -30.0)))
            .body(BodyDesc::fixed(ColliderShape::cuboid(Vec3::new(10.0, 10.0, 1.0))))
            .build(&mut ctx)
            .unwrap();
        let ball = Node::builder("ball")
            .transform(Transform::from_position(Vec3::new(0.0, 0.0, -10.0)))
            .body(BodyDesc::fixed(ColliderShape::sphere(1.0)))
            .behaviour(Lifetime::new(100.0, -100.0, stats.clone()))
            .build(&mut ctx)
            .unwrap();
        let eye = Node::builder("eye")
            .behaviour(Picker::new(100.0, stats.clone()))
            .build(&mut ctx)
            .unwrap();
        for node in [&wall, &ball, &eye] {
            scene.add_node(node, None, &mut ctx).unwrap();
        }

        // Nothing happens without a click
        scene.update(0.01, &mut ctx).unwrap();
        assert!(ball.in_scene());

        ctx.input.handle_key_input(KeyCode::Space, true);
        scene.update(0.01, &mut ctx).unwrap();
        assert!(ball.is_destroyed());
        assert_eq!(stats.borrow().picked, 1);
        assert_eq!(stats.borrow().removed, 1);

        // The wall behind is not a ball
        ctx.input.update();
        ctx.input.handle_key_input(KeyCode::Space, false);
        ctx.input.handle_key_input(KeyCode::Space, true);
        scene.update(0.01, &mut ctx).unwrap();
        assert!(wall.in_scene());
        assert_eq!(stats.borrow().picked, 1);
    }

    #[test]
    fn test_pulse_changes_material_in_steps() {
        let mut ctx = Context::default();
        let mut scene = Scene::new("test");
        let material = ctx.registry.create_material(MaterialDesc::colored("floor", [0.5, 0.5, 0.5, 1.0]));
        let floor = Node::builder("floor")
            .behaviour(Pulse::new(material, [0.5, 0.5, 0.5, 1.0], 4.0))
            .build(&mut ctx)
            .unwrap();
        scene.add_node(&floor, None, &mut ctx).unwrap();

        scene.update_pre_render(&mut ctx).unwrap();
        let first = ctx.registry.get_material(material).unwrap().generation;
        // Same quantized level: no new generation
        scene.update(0.01, &mut ctx).unwrap();
        scene.update_pre_render(&mut ctx).unwrap();
        assert_eq!(ctx.registry.get_material(material).unwrap().generation, first);

        scene.update(1.0, &mut ctx).unwrap();
        scene.update_pre_render(&mut ctx).unwrap();
        let material = ctx.registry.get_material(material).unwrap();
        assert_ne!(material.generation, first);
        // Wave peak: full brightness
        assert_relative_eq!(material.desc.base_color[0], 0.5);
    }
}
