use serde::{Deserialize, Serialize};

/// A util structure to hold data filed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlyData<D> {
    /// data field
    #[serde(rename = "d")]
    pub data: D,
}

/// Hello signal data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// status code, zero for success
    pub code: i64,
    /// session id, exist only when code is zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// A util structure to hold only sn field
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sn {
    /// serial number
    pub sn: u64,
}

/// Reconnect signal data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconnect {
    /// status code for why we need reconnect
    pub code: i64,
    /// reason for human read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// ResumeAck signal data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAck {
    /// resumed session id
    pub session_id: String,
}
