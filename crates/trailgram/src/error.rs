//! Error types for the relay.

use thiserror::Error;

use crate::template::TemplateError;

/// Errors produced while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("required environment variable \"{0}\" is not set")]
    Missing(&'static str),

    /// A variable is set but its value cannot be used.
    #[error("environment variable \"{var}\" is invalid: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by the outbound Telegram client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The proxy address cannot be turned into a SOCKS5 proxy.
    #[error("invalid SOCKS5 proxy '{address}': {reason}")]
    Proxy {
        /// Address as configured.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The Bot API rejected the call or could not be reached.
    #[error("telegram API error: {0}")]
    Telegram(String),
}

/// Result type for outbound sends.
pub type SendResult<T> = Result<T, SendError>;

/// Startup failures of the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The message template does not compile.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The Telegram client could not be set up.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type for relay startup.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_variable() {
        let err = ConfigError::Missing("TG_TOKEN");
        assert_eq!(err.to_string(), "required environment variable \"TG_TOKEN\" is not set");

        let err = ConfigError::Invalid {
            var: "CHAT_ID",
            reason: "invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "environment variable \"CHAT_ID\" is invalid: invalid digit found in string"
        );
    }

    #[test]
    fn send_error_display() {
        let err = SendError::Telegram("Bad Request: chat not found".to_string());
        assert_eq!(err.to_string(), "telegram API error: Bad Request: chat not found");

        let err = SendError::Proxy {
            address: "::".to_string(),
            reason: "empty host".to_string(),
        };
        assert_eq!(err.to_string(), "invalid SOCKS5 proxy '::': empty host");
    }

    #[test]
    fn relay_error_is_transparent_over_config() {
        let err = RelayError::from(ConfigError::Missing("CHAT_ID"));
        assert_eq!(err.to_string(), "required environment variable \"CHAT_ID\" is not set");
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
        assert_send_sync::<SendError>();
        assert_send_sync::<RelayError>();
    }
}
