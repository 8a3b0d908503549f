//! Ball pit application
//!
//! Balls drop onto a floor slab, expire after a while, and get popped by a
//! pick ray fired from the orbiting camera. Input comes from a fixed script
//! so a headless run exercises every path.

use crate::behaviours::{GameStats, OrbitCamera, Picker, Pulse, SharedStats, Spawner};
use crate::config::GameConfig;
use ev2::assets::AssetError;
use ev2::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Model used when the configured ball model is not registered
pub const FALLBACK_MODEL: &str = "fallback-cube";

const BALL_MODEL: &str = "ball";
const FLOOR_MODEL: &str = "floor";
const FLOOR_THICKNESS: f32 = 0.25;
const FLOOR_COLOR: [f32; 4] = [0.35, 0.4, 0.45, 1.0];

const PALETTE: [[f32; 4]; 6] = [
    [0.8, 0.2, 0.2, 1.0], // Red
    [0.2, 0.8, 0.2, 1.0], // Green
    [0.2, 0.2, 0.8, 1.0], // Blue
    [0.8, 0.8, 0.2, 1.0], // Yellow
    [0.8, 0.2, 0.8, 1.0], // Magenta
    [0.2, 0.8, 0.8, 1.0], // Cyan
];

/// Key and mouse events fed to the engine on `frame`
pub fn scripted_input(frame: u64) -> Vec<AppEvent> {
    let key = |key, pressed| AppEvent::KeyInput { key, pressed };
    let mut events = Vec::new();
    match frame % 240 {
        60 => events.push(key(KeyCode::Right, true)),
        120 => events.push(key(KeyCode::Right, false)),
        150 => events.push(key(KeyCode::Up, true)),
        170 => events.push(key(KeyCode::Up, false)),
        200 => events.push(AppEvent::MouseWheel { delta_x: 0.0, delta_y: -1.0 }),
        _ => {}
    }
    match frame % 90 {
        45 => events.push(key(KeyCode::Space, true)),
        46 => events.push(key(KeyCode::Space, false)),
        _ => {}
    }
    events
}

/// The demo application
pub struct BallPit {
    config: GameConfig,
    stats: SharedStats,
    acquired: Vec<String>,
    draws: u64,
}

impl BallPit {
    /// Create the application from its configuration
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            stats: Rc::new(RefCell::new(GameStats::default())),
            acquired: Vec::new(),
            draws: 0,
        }
    }

    /// Counters collected so far
    pub fn stats(&self) -> GameStats {
        *self.stats.borrow()
    }

    /// Frames that reached the backend
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Models this application holds a reference on
    pub fn acquired_models(&self) -> &[String] {
        &self.acquired
    }

    fn register_models(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let radius = self.config.gameplay.ball_radius;
        let ball_material = MaterialDesc::colored("ball", [0.9, 0.9, 0.9, 1.0]).with_roughness(0.4);
        ctx.assets.register(Model::uv_sphere(BALL_MODEL, radius, 16, 12, ball_material.clone()))?;
        ctx.assets.register(Model::cube(FALLBACK_MODEL, radius, ball_material))?;
        ctx.assets.register(Model::cube(FLOOR_MODEL, 1.0, MaterialDesc::colored("floor", FLOOR_COLOR)))?;
        Ok(())
    }

    fn acquire(&mut self, ctx: &mut Context, name: &str) -> Result<ModelHandle, EngineError> {
        let handle = match ctx.assets.acquire(name, &mut ctx.registry) {
            Ok(handle) => handle,
            Err(AssetError::NotFound(missing)) => {
                log::warn!("Model '{}' is not registered, using '{}'", missing, FALLBACK_MODEL);
                ctx.assets.acquire(FALLBACK_MODEL, &mut ctx.registry)?
            }
            Err(e) => return Err(e.into()),
        };
        self.acquired.push(handle.name().to_string());
        Ok(handle)
    }

    fn build_floor(&mut self, scene: &Scene, ctx: &mut Context) -> Result<Node, EngineError> {
        let model = self.acquire(ctx, FLOOR_MODEL)?;
        let material = ctx.registry.create_material(MaterialDesc::colored("floor-pulse", FLOOR_COLOR));
        let extent = self.config.gameplay.pit_half_extent;
        let half_extents = Vec3::new(extent, FLOOR_THICKNESS, extent);

        let mut builder = Node::builder("floor")
            .transform(Transform::from_position(Vec3::new(0.0, -FLOOR_THICKNESS, 0.0)).with_scale(half_extents))
            .body(BodyDesc::fixed(ColliderShape::cuboid(half_extents)).with_layers(CollisionLayers::ENVIRONMENT))
            .behaviour(Pulse::new(material, FLOOR_COLOR, 6.0));
        for mesh in model.meshes() {
            builder = builder.mesh_instance(*mesh, Some(material));
        }
        let floor = builder.build(ctx)?;
        scene.add_node(&floor, None, ctx)?;
        Ok(floor)
    }

    fn build_camera(&self, scene: &Scene, ctx: &mut Context) -> Result<Node, EngineError> {
        let settings = self.config.camera.clone();
        let camera = Node::builder("camera")
            .camera(Camera::perspective(settings.fov_degrees, 0.1, 200.0))
            .behaviour(OrbitCamera::new(settings.clone(), Vec3::zeros()))
            .build(ctx)?;
        let picker = Node::builder("picker")
            .behaviour(Picker::new(settings.pick_range, self.stats.clone()))
            .build(ctx)?;
        camera.add_child(&picker, ctx)?;
        scene.add_node(&camera, None, ctx)?;
        scene.set_active_camera(Some(&camera))?;
        Ok(camera)
    }
}

impl Application for BallPit {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        log::info!("Initializing ball pit");
        self.config.validate()?;
        let (scene, ctx) = engine.parts_mut();
        self.register_models(ctx)?;

        self.build_floor(scene, ctx)?;

        let sun = Node::builder("sun")
            .transform(Transform::identity().with_rotation_axis_angle(Vec3::x(), -0.8))
            .light(LightDesc::directional(Vec3::new(1.0, 0.95, 0.9), 3.0))
            .build(ctx)?;
        scene.add_node(&sun, None, ctx)?;

        let ball = self.config.gameplay.ball_model.clone();
        let model = self.acquire(ctx, &ball)?;
        let palette = PALETTE
            .iter()
            .enumerate()
            .map(|(i, color)| ctx.registry.create_material(MaterialDesc::colored(format!("ball-{i}"), *color)))
            .collect();
        let spawner = Node::builder("spawner")
            .behaviour(Spawner::new(model, palette, self.config.gameplay.clone(), self.stats.clone()))
            .build(ctx)?;
        scene.add_node(&spawner, None, ctx)?;

        self.build_camera(scene, ctx)?;
        log::info!("Ball pit ready with {} nodes", scene.node_count());
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        for event in scripted_input(engine.frame_count()) {
            self.handle_event(engine, event)?;
        }
        Ok(())
    }

    fn frame_finished(&mut self, _engine: &mut Engine, report: &FrameReport) {
        if report.drawn() {
            self.draws += 1;
        }
        if report.frame % 120 == 0 {
            let stats = self.stats();
            log::info!(
                "Frame {}: {} spawned, {} removed, {} picked, {} draw commands",
                report.frame,
                stats.spawned,
                stats.removed,
                stats.picked,
                report.queued_commands
            );
        }
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        let (scene, ctx) = engine.parts_mut();
        // Instances must be gone before their models can be released
        if let Err(e) = scene.clear(ctx) {
            log::warn!("Scene cleanup reported: {}", e);
        }
        for name in self.acquired.drain(..) {
            if let Err(e) = ctx.assets.release(&name, &mut ctx.registry) {
                log::warn!("Failed to release model '{}': {}", name, e);
            }
        }
        let stats = self.stats();
        log::info!(
            "Ball pit finished: {} spawned, {} removed, {} picked",
            stats.spawned,
            stats.removed,
            stats.picked
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frames: u64) -> GameConfig {
        let mut config = GameConfig::default();
        config.session.frames = frames;
        config.session.target_fps = None;
        config
    }

    fn initialized(config: &GameConfig) -> (Engine, BallPit) {
        let mut engine = Engine::new(config.application_config()).unwrap();
        let mut app = BallPit::new(config.clone());
        app.initialize(&mut engine).unwrap();
        (engine, app)
    }

    fn step(engine: &mut Engine, app: &mut BallPit, frames: u32, dt: f32) {
        for _ in 0..frames {
            app.update(engine, dt).unwrap();
            let report = engine.frame(dt).unwrap();
            app.frame_finished(engine, &report);
        }
    }

    #[test]
    fn test_scripted_input_pairs_presses_and_releases() {
        let events: Vec<AppEvent> = (0..240).flat_map(scripted_input).collect();
        let presses = events
            .iter()
            .filter(|e| matches!(e, AppEvent::KeyInput { pressed: true, .. }))
            .count();
        let releases = events
            .iter()
            .filter(|e| matches!(e, AppEvent::KeyInput { pressed: false, .. }))
            .count();
        assert_eq!(presses, releases);
        assert_eq!(
            scripted_input(45),
            vec![AppEvent::KeyInput { key: KeyCode::Space, pressed: true }]
        );
    }

    #[test]
    fn test_initialize_builds_the_pit() {
        let (engine, app) = initialized(&config(0));
        let scene = engine.scene();
        assert!(scene.active_camera().is_some());
        assert!(scene.root().find_child("floor").is_some());
        assert!(scene.root().find_child("spawner").is_some());
        assert_eq!(app.acquired_models(), [FLOOR_MODEL.to_string(), BALL_MODEL.to_string()]);
        // The floor collider is the only body until balls spawn
        assert_eq!(engine.context().physics.body_count(), 1);
    }

    #[test]
    fn test_invalid_config_fails_initialize() {
        let mut config = config(0);
        config.gameplay.spawn_interval = -1.0;
        let mut engine = Engine::new(config.application_config()).unwrap();
        let mut app = BallPit::new(config);
        assert!(matches!(app.initialize(&mut engine), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_ball_model_falls_back_to_cube() {
        let mut config = config(0);
        config.gameplay.ball_model = "teapot".to_string();
        let (mut engine, mut app) = initialized(&config);
        assert_eq!(app.acquired_models(), [FLOOR_MODEL.to_string(), FALLBACK_MODEL.to_string()]);

        step(&mut engine, &mut app, 10, 1.0 / 30.0);
        assert!(app.stats().spawned > 0);
    }

    #[test]
    fn test_balls_spawn_fall_and_expire() {
        let mut config = config(0);
        config.gameplay.ball_lifetime = (0.5, 0.5);
        config.gameplay.spawn_interval = 0.1;
        let (mut engine, mut app) = initialized(&config);

        step(&mut engine, &mut app, 6, 0.05);
        let stats = app.stats();
        assert!(stats.spawned >= 2);
        assert_eq!(stats.removed, 0);
        let spawner = engine.scene().root().find_child("spawner").unwrap();
        let ball = spawner.children()[0].clone();
        let start = ball.transform().position.y;

        step(&mut engine, &mut app, 20, 0.05);
        assert!(ball.is_destroyed() || ball.transform().position.y < start);
        assert!(app.stats().removed > 0);
        assert_eq!(app.draws(), 26);
        // Every live ball still owns exactly one body, plus the floor
        assert_eq!(engine.context().physics.body_count(), spawner.child_count() + 1);
    }

    #[test]
    fn test_run_cleans_up_every_resource() {
        let mut config = config(100);
        // Real frame times are tiny without a frame cap
        config.gameplay.spawn_interval = 1e-5;
        let mut app = BallPit::new(config.clone());
        Engine::run(config.application_config(), &mut app).unwrap();

        assert!(app.acquired_models().is_empty());
        let stats = app.stats();
        assert!(stats.spawned > 0);
        // Clearing the scene destroyed whatever was still alive
        assert_eq!(stats.removed, stats.spawned);
    }
}
