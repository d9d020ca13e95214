//! Full configuration validation.
//!
//! Each section has its own check; this orchestrator runs them all and
//! collects the errors into a single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::MeshConfig;
use jamroom_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &MeshConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_signaling(&mut errors, config);
    sections::validate_capture(&mut errors, config);
    sections::validate_session(&mut errors, config);
    sections::validate_relay(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
