//! Ball pit demo
//!
//! Runs headless for the configured number of frames:
//!
//! ```text
//! ev2_demo [config.toml|config.ron]
//! ```

mod behaviours;
mod config;
mod game;

use config::GameConfig;
use ev2::Engine;
use game::BallPit;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up panic hook for better error reporting
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC occurred: {:?}", panic_info);

        if let Some(location) = panic_info.location() {
            eprintln!("Panic location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Initialize logging; the engine keeps an already installed logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting ev2 ball pit demo");
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = GameConfig::load(path.as_deref());
    let app_config = config.application_config();

    let mut app = BallPit::new(config);
    match Engine::run(app_config, &mut app) {
        Ok(()) => {
            let stats = app.stats();
            log::info!(
                "Ball pit demo completed: {} draws, {} balls spawned, {} picked",
                app.draws(),
                stats.spawned,
                stats.picked
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Ball pit demo failed: {}", e);
            Err(e.into())
        }
    }
}
