//! Config loading from a TOML file, with the documented template written
//! out on first run.

use crate::schema::MeshConfig;
use crate::validation;
use jamroom_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::template::default_config_toml;

/// `mesh.toml` under `jamroom/` in the platform config directory
/// (`~/.config/jamroom/mesh.toml` on Linux).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("jamroom").join("mesh.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. If the parsed values fail
/// validation, a warning is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<MeshConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let config: MeshConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
        return Ok(MeshConfig::default());
    }

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Load `path`, first writing the default template there if it is missing.
pub fn load_or_create(path: &Path) -> Result<MeshConfig, ConfigError> {
    if path.exists() {
        return load_from_path(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error(path, e))?;
    info!(path = %path.display(), "Wrote default config");
    Ok(MeshConfig::default())
}

/// [`load_or_create`] at [`default_config_path`].
pub fn load_default() -> Result<MeshConfig, ConfigError> {
    load_or_create(&default_config_path()?)
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}
