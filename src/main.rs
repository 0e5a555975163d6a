pub mod config;
pub mod hardware;
pub mod listener;
pub mod shm;
pub mod surface;
pub mod touch;
pub mod ui_bridge;
pub mod widgets;

use crate::config::SurfaceConfig;
use crate::surface::{SurfaceEvent, SurfaceHandle};
use color_eyre::{eyre::eyre, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = config::config_path();
    info!("Loading surface config from {:?}", config_path);
    let config = SurfaceConfig::load_or_create(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;

    let (event_sender, mut event_receiver) = mpsc::channel(1000);
    let surface = SurfaceHandle::spawn(config, event_sender)
        .map_err(|e| eyre!("Failed to spawn control surface: {}", e))?;

    let cancel = surface.cancel_token();
    let _event_log = tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            log_event(&event);
        }
        debug!("Surface event channel closed");
    });

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| eyre!("Failed to install SIGTERM handler: {}", e))?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
        _ = terminate.recv() => info!("SIGTERM received, shutting down"),
        _ = cancel.cancelled() => info!("Control surface stopped"),
    }

    surface
        .shutdown()
        .await
        .map_err(|e| eyre!("Control surface did not shut down cleanly: {}", e))?;
    info!("Shutdown complete");
    Ok(())
}

fn log_event(event: &SurfaceEvent) {
    match event {
        SurfaceEvent::Hardware(event) => info!("Hardware: {:?}", event),
        SurfaceEvent::Ui(event) => debug!("Renderer: {:?}", event),
        SurfaceEvent::Widget(event) => info!("Widget: {:?}", event),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
