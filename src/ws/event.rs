//! Event payloads carried by the [Event](super::message::Signal::Event) signal.
//!
//! The engine never looks inside an event, it only tracks the serial number and
//! passes the body through to the subscriber.

use serde::{Deserialize, Serialize};

/// Body of an `s = 0` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// serial number, increases by one per event in a session
    pub sn: u64,

    /// the `d` field, untouched
    #[serde(rename = "d")]
    pub event: Event,
}

/// Event body, opaque to the gateway engine
pub type Event = serde_json::Value;

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_body_kept_as_is() {
        let body = json!({
            "channel_type": "GROUP",
            "type": 9,
            "content": "hello",
            "extra": { "mention": [] },
        });

        let data: EventData = serde_json::from_value(json!({ "sn": 42, "d": body })).unwrap();

        assert_eq!(data.sn, 42);
        assert_eq!(data.event, body);
    }

    #[test]
    fn test_event_needs_sn() {
        assert!(serde_json::from_value::<EventData>(json!({ "d": {} })).is_err());
    }
}
