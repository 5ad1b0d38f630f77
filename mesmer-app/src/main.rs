mod app;
mod app_dir;
mod gl_backend;
mod input;
mod settings;
mod ui;

use tracing::{info, warn};
use winit::event_loop::EventLoop;

use app::MesmerApp;
use settings::{AppConfig, Settings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Mesmer");

    let mut settings = Settings::load(&app_dir::settings_path());
    let config = AppConfig::from_settings(&settings, app_dir::default_images_directory());
    if settings.is_fresh() {
        config.store(&mut settings);
        match settings.save() {
            Ok(()) => info!("Wrote default settings to {}", settings.path().display()),
            Err(e) => warn!("Failed to write default settings: {e}"),
        }
    }

    let event_loop = EventLoop::new()?;
    let mut app = MesmerApp::new(settings, config, app_dir::shaders_directory());
    event_loop.run_app(&mut app)?;

    match app.take_fatal() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
