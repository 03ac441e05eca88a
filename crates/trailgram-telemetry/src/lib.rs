//! Trailgram Telemetry - logging setup for the trailgram relay.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Environment-driven configuration (`RUST_LOG`, `LOG_FORMAT`)
//!
//! # Example
//!
//! ```rust,no_run
//! use trailgram_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), trailgram_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("trailgram=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Listening :5555");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
