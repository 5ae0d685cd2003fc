//! Channel configuration.
//!
//! The protocol itself keeps no persisted state; this is only the set of
//! knobs a host wires into its endpoints (trusted origin, id prefix, retry
//! schedule). Hosts that want a file can use [`ChannelConfig::load`] and
//! [`ChannelConfig::save`].

use crate::error::config::ConfigError;

use common::ErrorLocation;
use models::Origin;

use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use const_format::concatcp;
use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "portbridge.json";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TRUSTED_ORIGIN: &str = concatcp!("http://", DEFAULT_HOST, ":", DEFAULT_PORT);
pub const DEFAULT_SESSION_ID_PREFIX: &str = "handshake";

const MAX_STALE_HISTORY: usize = 1024;

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// How the delay between connect attempts evolves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay every time (`initial_interval_ms`).
    Fixed,
    /// Multiply by `multiplier` after each attempt, capped at `max_interval_ms`.
    #[default]
    Exponential,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default)]
    pub strategy: RetryStrategy,
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
    /// `None` retries until `reconnect` or teardown cancels the attempt.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Origin shared by host and child. Handshakes are addressed to it and
    /// accepted only from it.
    #[serde(default = "default_trusted_origin")]
    pub trusted_origin: String,

    #[serde(default = "default_session_id_prefix")]
    pub session_id_prefix: String,

    /// How many superseded session ids a parent remembers for diagnostics.
    #[serde(default = "default_stale_history")]
    pub stale_history: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            trusted_origin: default_trusted_origin(),
            session_id_prefix: default_session_id_prefix(),
            stale_history: default_stale_history(),
            retry: RetryConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_trusted_origin() -> String {
    DEFAULT_TRUSTED_ORIGIN.to_string()
}
fn default_session_id_prefix() -> String {
    DEFAULT_SESSION_ID_PREFIX.to_string()
}
fn default_stale_history() -> usize {
    8
}
fn default_initial_interval_ms() -> u64 {
    50
}
fn default_max_interval_ms() -> u64 {
    2_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_randomization_factor() -> f64 {
    0.5
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ChannelConfig {
    /// Load config from {config_dir}/portbridge.json.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ChannelConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/portbridge.json via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        self.trusted_origin()?;

        if self.session_id_prefix.is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "session_id_prefix cannot be empty".to_string(),
            });
        }

        if self.stale_history > MAX_STALE_HISTORY {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid stale_history: {} (must be at most {MAX_STALE_HISTORY})",
                    self.stale_history
                ),
            });
        }

        self.retry.validate()
    }

    /// The trusted origin, parsed.
    #[track_caller]
    pub fn trusted_origin(&self) -> Result<Origin, ConfigError> {
        Origin::parse(&self.trusted_origin).map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid trusted_origin: {e}"),
        })
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "retry.initial_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.max_interval_ms < self.initial_interval_ms {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "retry.max_interval_ms ({}) must be at least initial_interval_ms ({})",
                    self.max_interval_ms, self.initial_interval_ms
                ),
            });
        }

        if !(self.multiplier >= 1.0 && self.multiplier.is_finite()) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid retry.multiplier: {} (must be >= 1.0)", self.multiplier),
            });
        }

        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid retry.randomization_factor: {} (must be 0.0-1.0)",
                    self.randomization_factor
                ),
            });
        }

        Ok(())
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}
