//! Kaiheila websocket protocol client implement

pub mod client;
pub mod event;
pub mod message;

pub use client::{Config, ConnectionState, Gateway, GatewayError, Status};
pub use event::{Event, EventData};
pub use message::{DecodeError, Frame, Signal};
