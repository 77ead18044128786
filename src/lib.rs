//! # Burz Gateway
//!
//! Kaiheila websocket gateway connection engine: keeps one long-lived gateway
//! connection alive with heartbeat and session resume, and hands every
//! received event to a [`Subscriber`].

#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod bot;
pub mod subscriber;
pub mod ws;

mod error;
pub use bot::Bot;
pub use error::Error;
pub use subscriber::{DeliverError, Subscriber};

/// framework result type
pub type Result<T> = std::result::Result<T, Error>;
