//! Main loop and the per-frame pipeline
//!
//! The engine owns the scene, the [`Context`] of subsystems and a render
//! backend, and runs one frame as a fixed pipeline:
//!
//! 1. scene update pass (`on_process`, then deferred destroys)
//! 2. physics: accumulate the frame delta and take fixed steps
//! 3. body poses written back into their nodes (interpolated)
//! 4. pre-render pass (`pre_render`, world transforms pushed to the registry)
//! 5. render queue built from the registry and drawn by the backend
//!
//! Any error aborts the frame and ends the main loop.

use crate::{
    application::{AppError, AppEvent, Application},
    assets::AssetError,
    config::ConfigError,
    context::Context,
    core::config::ApplicationConfig,
    foundation::{logging, time::Timer},
    physics::PhysicsError,
    render::{FrameStats, HeadlessBackend, RegistryError, RenderBackend, RenderError, RenderQueue},
    scene::{Scene, SceneError},
};
use thiserror::Error;

/// Owns the scene and its subsystems and drives frames
///
/// Build one with [`Engine::new`] for manual stepping or let [`Engine::run`] drive an [`Application`].
pub struct Engine {
    /// Scene graph
    scene: Scene,

    /// Registry, assets, physics and input shared with every node
    context: Context,

    /// Draw-side consumer of the registry
    backend: Box<dyn RenderBackend>,

    /// Frame timing
    timer: Timer,

    /// Engine configuration
    config: ApplicationConfig,

    /// Viewport aspect ratio for the active camera
    aspect_ratio: f32,

    /// Completed frames
    frames: u64,

    /// Cleared by `quit` or a close event
    running: bool,
}

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Delta fed into the frame, after clamping
    pub delta: f32,
    /// Fixed physics steps taken
    pub physics_steps: u32,
    /// Physics interpolation factor used for node sync
    pub alpha: f32,
    /// Body nodes whose transform was written from physics
    pub synced_bodies: usize,
    /// Draw commands in the render queue
    pub queued_commands: usize,
    /// Backend counters, `None` when no camera was active and the draw was skipped
    pub stats: Option<FrameStats>,
}

impl FrameReport {
    /// Whether the frame reached the backend
    pub fn drawn(&self) -> bool {
        self.stats.is_some()
    }
}

impl Engine {
    /// Create a new engine instance with the headless backend
    pub fn new(config: ApplicationConfig) -> Result<Self, EngineError> {
        Self::with_backend(config, Box::new(HeadlessBackend::new()))
    }

    /// Create a new engine instance drawing through `backend`
    pub fn with_backend(config: ApplicationConfig, backend: Box<dyn RenderBackend>) -> Result<Self, EngineError> {
        log::info!("Initializing ev2 engine");
        config.validate()?;

        let context = Context::new(&config);
        let scene = Scene::new("main");
        log::info!("Render backend: {}", backend.name());

        Ok(Self {
            scene,
            context,
            backend,
            timer: Timer::new(),
            aspect_ratio: config.render.aspect_ratio,
            config,
            frames: 0,
            running: true,
        })
    }

    /// Drive `app` until something stops the loop
    ///
    /// Stops on [`Engine::quit`], a close event, `max_frames`, or the first
    /// error. `cleanup` runs in every case.
    pub fn run<T: Application>(config: ApplicationConfig, app: &mut T) -> Result<(), EngineError> {
        logging::init_with_level(&config.engine.log_level);
        let mut engine = Self::new(config)?;

        let result = engine.main_loop(app);
        if let Err(err) = &result {
            if err.is_contract_violation() {
                log::error!("Contract violation, stopping: {}", err);
            } else {
                log::error!("Stopping after error: {}", err);
            }
        }

        app.cleanup(&mut engine);
        if let Err(err) = engine.scene.clear(&mut engine.context) {
            log::warn!("Clearing the scene on shutdown failed: {}", err);
        }

        log::info!(
            "Engine shutdown complete after {} frame(s) ({:.1} fps average)",
            engine.frames,
            engine.timer.average_fps()
        );
        result
    }

    fn main_loop<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        app.initialize(self).map_err(EngineError::from_app)?;

        log::info!("Entering main loop");
        self.timer = Timer::new();

        while self.running {
            let delta_time = self.timer.tick();

            app.update(self, delta_time).map_err(EngineError::from_app)?;
            let report = self.frame(delta_time)?;
            app.frame_finished(self, &report);

            if self.config.engine.max_frames.is_some_and(|max| self.frames >= max) {
                log::info!("Reached the frame limit of {}", self.frames);
                self.running = false;
            }
            if let Some(fps) = self.config.engine.target_fps {
                self.timer.limit_frame_rate(fps);
            }
        }
        Ok(())
    }

    /// Run one frame of the pipeline with the given delta
    pub fn frame(&mut self, delta_time: f32) -> Result<FrameReport, EngineError> {
        let delta = if delta_time.is_finite() && delta_time >= 0.0 { delta_time } else { 0.0 };

        self.scene.update(delta, &mut self.context)?;

        let physics_steps = self.context.physics.advance(delta);
        let alpha = self.context.physics.alpha();
        let synced_bodies = self.context.physics.sync_nodes();

        self.scene.update_pre_render(&mut self.context)?;

        let (queued_commands, stats) = match self.scene.camera_matrices(self.aspect_ratio) {
            Some(camera) => {
                let queue = RenderQueue::build(&self.context.registry, &camera);
                let stats = self.backend.draw(&self.context.registry, &queue)?;
                (queue.command_count(), Some(stats))
            }
            None => {
                log::debug!("No active camera, skipping draw of frame {}", self.frames + 1);
                (0, None)
            }
        };

        self.context.input.update();
        self.frames += 1;

        let report = FrameReport {
            frame: self.frames,
            delta,
            physics_steps,
            alpha,
            synced_bodies,
            queued_commands,
            stats,
        };
        log::trace!("{:?}", report);
        Ok(report)
    }

    /// Feed a window or input event to the engine
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::WindowCloseRequested => {
                self.running = false;
            }
            AppEvent::WindowResized { width, height } => {
                if width > 0 && height > 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let aspect = width as f32 / height as f32;
                    self.aspect_ratio = aspect;
                    log::debug!("Viewport resized to {}x{}", width, height);
                }
            }
            AppEvent::KeyInput { key, pressed } => {
                self.context.input.handle_key_input(key, pressed);
            }
            AppEvent::MouseButton { button, pressed } => {
                self.context.input.handle_mouse_button(button, pressed);
            }
            AppEvent::MouseMoved { x, y } => {
                self.context.input.handle_mouse_move(x, y);
            }
            AppEvent::MouseWheel { delta_x, delta_y } => {
                self.context.input.handle_mouse_wheel(delta_x, delta_y);
            }
        }
    }

    /// Stop after the current frame
    pub fn quit(&mut self) {
        log::info!("Quit requested after frame {}", self.frames);
        self.running = false;
    }

    /// Whether the main loop keeps going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get the scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Get the subsystems
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Get mutable access to the subsystems
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Split borrow for building and editing the scene
    pub fn parts_mut(&mut self) -> (&mut Scene, &mut Context) {
        (&mut self.scene, &mut self.context)
    }

    /// Get the render backend
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    /// Get the engine configuration
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Viewport aspect ratio the active camera projects with
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Completed frames
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Clipped delta of the last frame
    pub fn delta_time(&self) -> f32 {
        self.timer.delta_time()
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Scene graph error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Renderer resource registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Physics error
    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),

    /// Asset system error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Rendering error
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Application error
    #[error("Application error: {0}")]
    Application(String),
}

impl EngineError {
    /// Whether this error is a programming error
    ///
    /// Contract violations (stale ids, structural misuse) indicate a bug in
    /// the caller; everything else is a resource or environment failure.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Scene(err) => err.is_contract_violation(),
            Self::Registry(err) => err.is_contract_violation(),
            Self::Physics(err) => err.is_contract_violation(),
            Self::Asset(err) => err.is_contract_violation(),
            Self::Render(RenderError::InvalidDraw(_)) => true,
            Self::Render(_) | Self::Config(_) | Self::Application(_) => false,
        }
    }

    fn from_app(err: AppError) -> Self {
        match err {
            AppError::Engine(err) => err,
            other => Self::Application(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Model;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::MaterialDesc;
    use crate::scene::{Camera, Node};

    fn engine() -> Engine {
        Engine::new(ApplicationConfig::default()).unwrap()
    }

    fn populate(engine: &mut Engine) -> Node {
        let (scene, ctx) = engine.parts_mut();
        ctx.assets.register(Model::cube("cube", 0.5, MaterialDesc::colored("red", [1.0, 0.0, 0.0, 1.0]))).unwrap();
        let handle = ctx.assets.acquire("cube", &mut ctx.registry).unwrap();
        let cube = Node::builder("cube").model(&handle).build(ctx).unwrap();
        scene.add_node(&cube, None, ctx).unwrap();

        let camera = Node::builder("camera")
            .transform(Transform::from_position(Vec3::new(0.0, 0.0, 5.0)))
            .camera(Camera::default())
            .build(ctx)
            .unwrap();
        scene.add_node(&camera, None, ctx).unwrap();
        camera
    }

    #[test]
    fn test_frame_without_camera_skips_draw() {
        let mut engine = engine();
        populate(&mut engine);
        engine.scene().set_active_camera(None).unwrap();

        let report = engine.frame(1.0 / 60.0).unwrap();
        assert!(!report.drawn());
        assert_eq!(report.frame, 1);
    }

    #[test]
    fn test_frame_draws_from_active_camera() {
        let mut engine = engine();
        let camera = populate(&mut engine);
        engine.scene().set_active_camera(Some(&camera)).unwrap();

        let report = engine.frame(1.0 / 60.0).unwrap();
        let stats = report.stats.unwrap();
        assert_eq!(report.queued_commands, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.triangles, 12);
        assert_eq!(stats.material_rebuilds, 1);

        let stats = engine.frame(1.0 / 60.0).unwrap().stats.unwrap();
        assert_eq!(stats.material_rebuilds, 0);
    }

    #[test]
    fn test_resize_changes_aspect() {
        let mut engine = engine();
        engine.handle_event(AppEvent::WindowResized { width: 800, height: 400 });
        assert_eq!(engine.aspect_ratio(), 2.0);
        engine.handle_event(AppEvent::WindowResized { width: 0, height: 400 });
        assert_eq!(engine.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_events_reach_input_and_stop_the_loop() {
        let mut engine = engine();
        engine.handle_event(AppEvent::KeyInput { key: crate::input::KeyCode::W, pressed: true });
        assert!(engine.context().input.is_key_down(crate::input::KeyCode::W));

        // Edges are cleared once a frame has seen them
        assert!(engine.context().input.is_key_just_pressed(crate::input::KeyCode::W));
        engine.frame(0.0).unwrap();
        assert!(!engine.context().input.is_key_just_pressed(crate::input::KeyCode::W));

        engine.handle_event(AppEvent::WindowCloseRequested);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_quit_stops_after_completed_frames() {
        let mut engine = engine();
        engine.frame(1.0 / 60.0).unwrap();
        engine.frame(1.0 / 60.0).unwrap();
        assert!(engine.is_running());

        engine.quit();
        assert!(!engine.is_running());
        assert_eq!(engine.frame_count(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ApplicationConfig::default();
        config.physics.max_substeps = 0;
        let result = Engine::new(config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    struct CountingApp {
        updates: u32,
        cleaned_up: bool,
        fail_at: Option<u32>,
    }

    impl Application for CountingApp {
        fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
            Ok(())
        }

        fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
            self.updates += 1;
            if self.fail_at == Some(self.updates) {
                return Err(AppError::GameLogic("boom".to_string()));
            }
            Ok(())
        }

        fn cleanup(&mut self, _engine: &mut Engine) {
            self.cleaned_up = true;
        }
    }

    #[test]
    fn test_run_stops_at_frame_limit() {
        let mut config = ApplicationConfig::default();
        config.engine.max_frames = Some(3);
        let mut app = CountingApp { updates: 0, cleaned_up: false, fail_at: None };

        Engine::run(config, &mut app).unwrap();
        assert_eq!(app.updates, 3);
        assert!(app.cleaned_up);
    }

    #[test]
    fn test_run_aborts_on_application_error() {
        let mut config = ApplicationConfig::default();
        config.engine.max_frames = Some(10);
        let mut app = CountingApp { updates: 0, cleaned_up: false, fail_at: Some(2) };

        let err = Engine::run(config, &mut app).unwrap_err();
        assert!(matches!(err, EngineError::Application(_)));
        assert_eq!(app.updates, 2);
        assert!(app.cleaned_up);
    }
}
