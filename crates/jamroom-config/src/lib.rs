//! Jamroom mesh configuration.
//!
//! TOML-based configuration for the signaling channel, capture, peer
//! sessions, the relay, and logging. Every section uses serde defaults so a
//! partial file (or no file at all) works out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jamroom_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    CaptureConfig, LogLevel, LoggingConfig, MeshConfig, RelayConfig, SessionConfig,
    SignalingConfig, CONFIG_SCHEMA_VERSION,
};

use jamroom_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
pub fn load_config() -> Result<MeshConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &MeshConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
