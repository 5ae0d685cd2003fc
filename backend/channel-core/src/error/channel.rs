use common::ErrorLocation;
use models::ModelError;

use std::panic::Location;

use log::Level;
use thiserror::Error as ThisError;

/// Everything that can go wrong while establishing or using a channel.
///
/// None of these reach the application callback. Endpoints log them at the
/// level returned by [`ChannelError::severity`] and carry on.
#[derive(Debug, ThisError)]
pub enum ChannelError {
    /// The target has no loaded context yet. Retried on the backoff schedule.
    #[error("Target Unreachable Error: {message} {location}")]
    TargetUnreachable {
        message: String,
        location: ErrorLocation,
    },

    /// A handshake came from, or was addressed to, an untrusted origin.
    #[error("Origin Mismatch Error: {message} {location}")]
    OriginMismatch {
        message: String,
        location: ErrorLocation,
    },

    /// A handshake arrived without a transferred port.
    #[error("Missing Endpoint Error: {message} {location}")]
    MissingEndpoint {
        message: String,
        location: ErrorLocation,
    },

    /// Traffic tagged with a session id other than the current one.
    #[error("Session Mismatch Error: {message} {location}")]
    SessionMismatch {
        message: String,
        location: ErrorLocation,
    },

    /// A value that is not one of the known wire shapes.
    #[error("Malformed Message Error: {message} {location}")]
    Malformed {
        message: String,
        location: ErrorLocation,
    },

    /// The peer port (or this port) has been closed.
    #[error("Port Closed Error: {message} {location}")]
    PortClosed {
        message: String,
        location: ErrorLocation,
    },

    /// The endpoint task has stopped; no further commands are accepted.
    #[error("Endpoint Closed Error: {message} {location}")]
    EndpointClosed {
        message: String,
        location: ErrorLocation,
    },
}

impl ChannelError {
    /// Log level a dropped message of this kind is reported at.
    ///
    /// Session mismatches are routine during reconnects and stay at `Trace`;
    /// security rejections are `Warn`.
    pub fn severity(&self) -> Level {
        match self {
            ChannelError::SessionMismatch { .. } => Level::Trace,
            ChannelError::Malformed { .. }
            | ChannelError::PortClosed { .. }
            | ChannelError::TargetUnreachable { .. } => Level::Debug,
            ChannelError::OriginMismatch { .. } | ChannelError::MissingEndpoint { .. } => {
                Level::Warn
            }
            ChannelError::EndpointClosed { .. } => Level::Error,
        }
    }
}

impl From<ModelError> for ChannelError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        ChannelError::Malformed {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
