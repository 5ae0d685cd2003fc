use channel_core::{ChannelError, ConfigError};
use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors that end a demo run.
///
/// Channel-level drops never get here; endpoints log and carry on. These are
/// the failures the demo cannot recover from: no directories, bad config, a
/// closed endpoint, or a handshake that never completes.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PortbridgeError {
    /// Error from this App
    #[error("Portbridge Error: {message} {location}")]
    Portbridge {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be loaded or failed validation
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// An endpoint stopped accepting commands
    #[error("Channel Error: {message} {location}")]
    Channel {
        message: String,
        location: ErrorLocation,
    },

    /// A step did not complete in time
    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for PortbridgeError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        PortbridgeError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ChannelError> for PortbridgeError {
    #[track_caller]
    fn from(error: ChannelError) -> Self {
        PortbridgeError::Channel {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
