//! Engine tuning knobs

use std::time::Duration;
use tracing::warn;

/// Retry and timeout settings for [`crate::core::TransactionEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Extra commit attempts after a version conflict
    pub max_retries: u32,

    /// Base backoff; attempt `n` sleeps `n * retry_backoff`
    pub retry_backoff: Duration,

    /// Upper bound on waiting for account locks in one commit
    ///
    /// Applied to the store built by [`crate::core::TransactionEngine::in_memory`].
    /// A store passed to [`crate::core::TransactionEngine::new`] keeps its own
    /// lock timeout.
    pub commit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(5),
            commit_timeout: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    /// Create a config, replacing a zero commit timeout with the default
    ///
    /// Zero retries and zero backoff are accepted as-is.
    pub fn new(max_retries: u32, retry_backoff: Duration, commit_timeout: Duration) -> Self {
        let default = Self::default();

        let commit_timeout = if commit_timeout.is_zero() {
            warn!(
                requested = ?commit_timeout,
                fallback = ?default.commit_timeout,
                "Invalid commit_timeout, using default"
            );
            default.commit_timeout
        } else {
            commit_timeout
        };

        Self {
            max_retries,
            retry_backoff,
            commit_timeout,
        }
    }

    /// Sleep before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }
}
