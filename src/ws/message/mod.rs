//! Kaiheila websocket signal types and codec.

mod types;

pub use types::{Hello, OnlyData, Reconnect, ResumeAck, Sn};

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use miniz_oxide::inflate::{self, TINFLStatus};
use serde::Deserialize;
use snafu::prelude::*;

use super::event::EventData;

/// One websocket data frame, as seen by the codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// text frame, plain json
    Text(String),
    /// binary frame, compressed json
    Binary(Bytes),
}

/// Error when decode a frame as signal
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)), module(error), context(suffix(false)))]
pub enum DecodeError {
    /// Decompress data failed
    #[snafu(display("decompress frame failed: {status:?}"))]
    DecompressFailed {
        /// decompress error status code
        status: TINFLStatus,
    },

    /// data is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// source error
        source: serde_json::Error,
    },

    /// data json is not an object
    #[snafu(display("parsed signal is not object: {json}"))]
    SignalNotObject {
        /// json string
        json: String,
    },

    /// data json has no type(s) field
    #[snafu(display("signal has no type(s) field: {json}"))]
    NoSignalType {
        /// json string
        json: String,
    },

    /// data json type filed is not number type
    #[snafu(display("signal has non-number s field: {json}"))]
    SignalTypeNotNumber {
        /// json string
        json: String,
    },

    /// data json has an unknown type
    #[snafu(display("signal has unknown type {s}"))]
    UnknownSignal {
        /// type number
        s: i64,
    },

    /// data json is not valid typed signal
    #[snafu(display("parse to {type_name} signal failed: {source}"))]
    ParseTypedSignalFailed {
        /// type name
        type_name: &'static str,
        /// source error
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// The frame is well formed but carries a signal type we do not know
    pub fn is_unknown_signal(&self) -> bool {
        matches!(self, Self::UnknownSignal { .. })
    }

    /// The frame is structurally broken
    pub fn is_malformed(&self) -> bool {
        !self.is_unknown_signal()
    }
}

const SIGNAL_INTERNAL_TYPE_TAG: &str = "__internal_type_tag__";

/// Kaiheila websocket protocol signal
///
/// Decode only, outbound frames are built by [`encode_ping`] and [`encode_resume`].
#[derive(Debug, Clone, PartialEq, Deserialize, EnumAsInner)]
// serde does not support number tag for now, see: https://github.com/serde-rs/serde/issues/745
#[serde(tag = "__internal_type_tag__")]
pub enum Signal {
    /// Event, server -> client
    Event(EventData),
    /// Hello, server -> client
    Hello(OnlyData<Hello>),
    /// Ping, client -> server
    Ping(Sn),
    /// Pong, server -> client
    Pong,
    /// Resume, client -> server
    Resume(Sn),
    /// Reconnect, server -> client
    Reconnect(OnlyData<Reconnect>),
    /// ResumeAck, server -> client
    ResumeAck(OnlyData<ResumeAck>),
}

impl Signal {
    fn type_number_to_type_name(s: i64) -> Option<&'static str> {
        match s {
            0 => Some("Event"),
            1 => Some("Hello"),
            2 => Some("Ping"),
            3 => Some("Pong"),
            4 => Some("Resume"),
            5 => Some("Reconnect"),
            6 => Some("ResumeAck"),
            _ => None,
        }
    }

    /// get type number
    pub fn type_number(&self) -> i64 {
        match self {
            Self::Event(_) => 0,
            Self::Hello(_) => 1,
            Self::Ping(_) => 2,
            Self::Pong => 3,
            Self::Resume(_) => 4,
            Self::Reconnect(_) => 5,
            Self::ResumeAck(_) => 6,
        }
    }

    /// get type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Event(_) => "Event",
            Self::Hello(_) => "Hello",
            Self::Ping(_) => "Ping",
            Self::Pong => "Pong",
            Self::Resume(_) => "Resume",
            Self::Reconnect(_) => "Reconnect",
            Self::ResumeAck(_) => "ResumeAck",
        }
    }
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // gateway sends zlib wrapped deflate, bare deflate stream is accepted too
    inflate::decompress_to_vec_zlib(data)
        .or_else(|_| inflate::decompress_to_vec(data))
        .map_err(|status| error::DecompressFailed { status }.build())
}

/// Decode a frame to a signal.
///
/// Binary frames are inflated first, so a binary frame and a text frame carrying
/// the same json always decode to the same signal.
pub fn decode(frame: &Frame) -> Result<Signal, DecodeError> {
    let inflated;
    let buff: &[u8] = match frame {
        Frame::Text(text) => text.as_bytes(),
        Frame::Binary(data) => {
            inflated = decompress(data)?;
            &inflated
        }
    };

    let mut value: serde_json::Value =
        serde_json::from_slice(buff).context(error::ParseJSONFailed)?;

    let obj = value
        .as_object_mut()
        .with_context(|| error::SignalNotObject {
            json: String::from_utf8_lossy(buff),
        })?;

    let s = obj
        .get("s")
        .with_context(|| error::NoSignalType {
            json: String::from_utf8_lossy(buff),
        })?
        .as_i64()
        .with_context(|| error::SignalTypeNotNumber {
            json: String::from_utf8_lossy(buff),
        })?;

    let type_name =
        Signal::type_number_to_type_name(s).context(error::UnknownSignal { s })?;

    obj.insert(
        SIGNAL_INTERNAL_TYPE_TAG.to_string(),
        serde_json::Value::String(type_name.to_string()),
    );

    serde_json::from_value(value).context(error::ParseTypedSignalFailed { type_name })
}

/// Encode a ping signal, `{"s":2,"sn":<sn>}`
pub fn encode_ping(sn: u64) -> String {
    serde_json::json!({ "s": 2, "sn": sn }).to_string()
}

/// Encode a resume signal, `{"s":4,"sn":<sn>}`
pub fn encode_resume(sn: u64) -> String {
    serde_json::json!({ "s": 4, "sn": sn }).to_string()
}
