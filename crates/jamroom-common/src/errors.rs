use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("could not determine the platform config directory")]
    NoConfigDir,

    #[error("config I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that stop a jamroom binary at startup.
#[derive(Debug, thiserror::Error)]
pub enum JamroomError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("signaling.dedup_capacity = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: signaling.dedup_capacity = 0"
        );
    }

    #[test]
    fn config_io_error_names_the_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/etc/jamroom/mesh.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "config I/O error at /etc/jamroom/mesh.toml: denied");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn jamroom_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: JamroomError = config_err.into();
        assert!(matches!(err, JamroomError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn jamroom_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: JamroomError = io_err.into();
        assert!(matches!(err, JamroomError::Io(_)));
        assert!(err.to_string().contains("port taken"));
    }
}
