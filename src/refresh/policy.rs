use std::time::{Duration, Instant};

/// Decides when a source is due for another fetch.
///
/// Owned by the render loop.  [`should_refresh`](Self::should_refresh) is a
/// pure query; the caller records an attempt only when it actually started a
/// fetch, and reports outcomes as they are settled.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    min_interval: Duration,
    error_backoff: Duration,
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
    last_failure: Option<Instant>,
    /// Set when any fetch started by the latest attempt failed.
    attempt_failed: bool,
    attempted_fingerprint: Option<u64>,
    success_fingerprint: Option<u64>,
}

impl RefreshPolicy {
    pub fn new(min_interval: Duration, error_backoff: Duration) -> Self {
        Self {
            min_interval,
            error_backoff,
            last_attempt: None,
            last_success: None,
            last_failure: None,
            attempt_failed: false,
            attempted_fingerprint: None,
            success_fingerprint: None,
        }
    }

    /// True when a fetch should start now.
    ///
    /// Due when nothing was ever attempted, when `fingerprint` differs from
    /// both the last successful and the last attempted configuration, or when
    /// the interval since the last attempt has elapsed.  The interval is
    /// `error_backoff` after a failed attempt and `min_interval` otherwise.
    pub fn should_refresh(&self, now: Instant, fingerprint: u64) -> bool {
        let Some(last_attempt) = self.last_attempt else {
            return true;
        };
        if self.success_fingerprint != Some(fingerprint)
            && self.attempted_fingerprint != Some(fingerprint)
        {
            return true;
        }
        let wait = if self.attempt_failed {
            self.error_backoff
        } else {
            self.min_interval
        };
        now.saturating_duration_since(last_attempt) >= wait
    }

    pub fn record_attempt(&mut self, now: Instant, fingerprint: u64) {
        self.last_attempt = Some(now);
        self.attempted_fingerprint = Some(fingerprint);
        self.attempt_failed = false;
    }

    /// Record a completed fetch that was started under `fingerprint`.
    pub fn record_success(&mut self, at: Instant, fingerprint: u64) {
        self.last_success = Some(at);
        self.success_fingerprint = Some(fingerprint);
    }

    pub fn record_failure(&mut self, at: Instant) {
        self.last_failure = Some(at);
        self.attempt_failed = true;
    }

    pub fn set_intervals(&mut self, min_interval: Duration, error_backoff: Duration) {
        self.min_interval = min_interval;
        self.error_backoff = error_backoff;
    }

    /// True when the latest failure is more recent than the latest success.
    pub fn is_failing(&self) -> bool {
        match (self.last_failure, self.last_success) {
            (Some(failure), Some(success)) => failure > success,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
impl RefreshPolicy {
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }
}
