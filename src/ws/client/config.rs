use std::time::Duration;

/// Gateway engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Give up after this many failed attempts in a row, zero means never give up.
    pub max_retry_attempts: u32,
    /// Base interval between two ping signals.
    pub heartbeat_interval: Duration,
    /// Max random offset applied to each heartbeat interval, in both direction.
    pub heartbeat_jitter: Duration,
    /// Deadline of hello (or resume ack) after transport established.
    pub hello_timeout: Duration,
    /// Deadline of pong after a ping is sent.
    pub pong_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retry_attempts: 0,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_jitter: Duration::from_secs(5),
            hello_timeout: Duration::from_secs(6),
            pong_timeout: Duration::from_secs(6),
        }
    }
}

impl Config {
    /// Set max retry attempts, zero for unbounded
    #[must_use]
    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Set heartbeat base interval and jitter
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration, jitter: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_jitter = jitter.min(interval);
        self
    }

    /// Set hello timeout
    #[must_use]
    pub fn with_hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    /// Set pong timeout
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }
}
