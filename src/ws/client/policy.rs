//! Retry timing and failure classification, independent of any I/O.

use std::time::Duration;

use super::GatewayError;

/// Reconnect codes after which the old session can't be resumed.
///
/// 40106: resume failed, missing params; 40107: session expired; 40108: invalid sn.
pub const NON_RESUMABLE_RECONNECT_CODES: [i64; 3] = [40106, 40107, 40108];

/// Bounded linear retry wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// lower bound of a wait
    pub const MIN_WAIT: Duration = Duration::from_secs(1);
    /// wait grows by this per attempt
    pub const STEP: Duration = Duration::from_secs(2);
    /// upper bound of a wait
    pub const MAX_WAIT: Duration = Duration::from_secs(60);

    /// Wait before the `attempt`-th retry, `attempt` starts at 1.
    pub fn next_wait(attempt: u32) -> Duration {
        Self::STEP
            .saturating_mul(attempt)
            .clamp(Self::MIN_WAIT, Self::MAX_WAIT)
    }

    /// `max_attempts` of zero never gives up
    pub fn should_give_up(attempt: u32, max_attempts: u32) -> bool {
        max_attempts != 0 && attempt >= max_attempts
    }
}

/// How the engine recovers from an error that ended a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// retry, resume the session if we have one
    Resume,
    /// retry with a cold connect, session is discarded
    Cold,
    /// stop in failed state
    Fatal,
}

/// Classify an error which ended a generation.
pub fn classify(err: &GatewayError) -> Recovery {
    match err {
        GatewayError::HandshakeRejected { .. } | GatewayError::RetriesExhausted { .. } => {
            Recovery::Fatal
        }
        GatewayError::ResumeRejected { .. } => Recovery::Cold,
        GatewayError::ServerReconnect { code, .. }
            if NON_RESUMABLE_RECONNECT_CODES.contains(code) =>
        {
            Recovery::Cold
        }
        GatewayError::ServerReconnect { .. }
        | GatewayError::ResolveFailure { .. }
        | GatewayError::TransportFailure { .. }
        | GatewayError::HelloTimeout { .. }
        | GatewayError::PongTimeout { .. } => Recovery::Resume,
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// wait then try again
    Wait(Duration),
    /// stop retrying
    GiveUp,
}

/// Failed attempts counter, owned by the engine driver.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    disabled: bool,
}

impl RetryState {
    /// create a counter, zero `max_attempts` for unbounded
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            disabled: false,
        }
    }

    /// failed attempts since last success
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record one more failed attempt and decide what to do next
    pub fn record_failure(&mut self) -> RetryDecision {
        if self.disabled {
            return RetryDecision::GiveUp;
        }

        self.attempt = self.attempt.saturating_add(1);

        if RetryPolicy::should_give_up(self.attempt, self.max_attempts) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Wait(RetryPolicy::next_wait(self.attempt))
        }
    }

    /// connection reached active state
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// engine is stopping, no more retry
    pub fn disable(&mut self) {
        self.disabled = true;
    }
}
