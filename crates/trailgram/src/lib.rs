//! Trailgram - relay Papertrail webhook alerts to a Telegram chat.
//!
//! Papertrail posts a JSON payload (the matched events and the saved search
//! that fired) to `/`. Trailgram renders it through a Go-style text template
//! and sends the result to one configured chat via the Bot API, optionally
//! through a SOCKS5 proxy.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn start() -> Result<(), trailgram::RelayError> {
//! let config = trailgram::Config::from_env()?;
//! trailgram::run(config).await
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod handler;
pub mod payload;
pub mod sender;
pub mod server;
pub mod template;

pub use config::Config;
pub use error::{ConfigError, ConfigResult, RelayError, RelayResult, SendError, SendResult};
pub use handler::AppState;
pub use payload::{Event, Payload, SavedSearch};
pub use sender::{MessageSender, Route, TelegramSender, build_sender};
pub use server::{LISTEN_ADDR, router, run, serve};
pub use template::{Rendered, Template, TemplateError, TemplateResult, Value};
