//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    InitError(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TelemetryError::ConfigError("bad level".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad level");

        let err = TelemetryError::InitError("already set".to_string());
        assert_eq!(err.to_string(), "Initialization error: already set");
    }
}
