pub mod backend;
pub mod command;
pub mod config;
pub mod input;
pub mod pipeline;
pub mod profile;

use crate::backend::{LoggingBackend, VehicleBackend};
use crate::config::OpenwheelConfig;
use crate::input::EvdevSource;
use crate::pipeline::Pipeline;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // Konfiguration laden, Profil früh auflösen
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = OpenwheelConfig::load(config_path.as_deref())?;
    let profile = config.resolve_profile()?;
    info!(
        "Bridging {} with profile {} at {} Hz",
        config.device.display(),
        profile.name(),
        config.publish_rate_hz
    );

    let source = EvdevSource::open(&config.device)?;

    // Diagnostic backend; real actuation backends plug in through the
    // VehicleBackend trait.
    let backend: Box<dyn VehicleBackend> = Box::new(LoggingBackend::new());

    let mut pipeline = Pipeline::spawn(
        Box::new(source),
        profile,
        backend,
        config.publisher_settings(),
        config.power_button_mapper(),
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
        }
        _ = pipeline.ingest_finished() => {
            info!("Event source ended, shutting down");
        }
    }

    pipeline.shutdown().await?;
    info!("Shutdown complete");
    Ok(())
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
