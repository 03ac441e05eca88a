//! Trailgram Test - shared test utilities for the relay.
//!
//! Provides a recording [`MockSender`], payload fixtures and a
//! [`LogCapture`] for asserting on log output, for use as a
//! dev-dependency.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trailgram_test::{MockSender, disk_full_payload};
//!
//! let sender = Arc::new(MockSender::new());
//! // ... drive the handler ...
//! assert_eq!(sender.send_count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod logs;
pub mod mocks;

pub use fixtures::*;
pub use logs::*;
pub use mocks::*;
