use chrono::TimeDelta;
use std::time::Duration;

/// Tuning knobs for a reconciliation attempt.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Client-side bound on the STK-push initiation call.
    pub initiation_timeout: Duration,
    /// Overall window to wait for a confirmation frame.
    pub confirmation_timeout: Duration,
    /// First reconnect delay after an unexpected channel closure.
    pub reconnect_base_delay: Duration,
    /// Reconnect delays double up to this cap.
    pub reconnect_max_delay: Duration,
    /// Bounded persistence retries once a charge has succeeded.
    pub persist_attempts: u32,
    /// Delay before the first persistence retry; doubles per attempt.
    pub persist_retry_delay: Duration,
    /// How long a confirmed booking reserves the domain.
    pub booking_validity: TimeDelta,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            initiation_timeout: Duration::from_secs(15),
            confirmation_timeout: Duration::from_secs(120),
            reconnect_base_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            persist_attempts: 3,
            persist_retry_delay: Duration::from_millis(300),
            booking_validity: TimeDelta::days(7),
        }
    }
}
