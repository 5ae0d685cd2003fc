use portbridge::demo::{DemoOptions, run as RunDemo};
use portbridge::error::PortbridgeError;
use portbridge::logger::initialize as LoggerInitialize;

use channel_core::ChannelConfig;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{error, info};

const APP_DIR_NAME: &str = "portbridge";

#[tokio::main]
async fn main() -> Result<(), PortbridgeError> {
    let log_dir = app_dir(dirs::cache_dir(), "cache")?;
    create_dir_all(&log_dir).map_err(|e| PortbridgeError::Portbridge {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Portbridge demo starting");
    info!("Log directory: {}", log_dir.display());

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let config = ChannelConfig::load(&config_dir)?;
    info!("Trusted origin: {}", config.trusted_origin);

    match RunDemo(&config, &DemoOptions::default()).await {
        Ok(report) => {
            for (n, session) in report.sessions.iter().enumerate() {
                info!("Session {}: {session}", n + 1);
            }
            Ok(())
        }
        Err(e) => {
            error!("Demo failed: {e}");
            if let Ok(json) = serde_json::to_string(&e) {
                error!("{json}");
            }
            Err(e)
        }
    }
}

#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, PortbridgeError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| PortbridgeError::Portbridge {
            message: format!("No platform {kind} directory"),
            location: ErrorLocation::from(Location::caller()),
        })
}
