//! Poll pacing and the consecutive-failure circuit breaker.

use std::time::Duration;

/// Pacing state for the polling agent.
///
/// The server drives the inter-cycle sleep through `Retry-After`; the
/// agent gives up once more than `max_failures` cycles in a row have
/// failed.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    max_failures: u32,
    failures: u32,
    retry_after: Duration,
}

impl PollBackoff {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            failures: 0,
            retry_after: Duration::ZERO,
        }
    }

    /// How long to sleep before the next cycle.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    pub fn adopt_retry_after(&mut self, interval: Duration) {
        self.retry_after = interval;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Count a failed cycle. Returns `true` when the breaker trips.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.failures > self.max_failures
    }
}

/// Parse a `Retry-After` value given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_delay() {
        let b = PollBackoff::new(50);
        assert_eq!(b.retry_after(), Duration::ZERO);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn trips_on_fifty_first_failure() {
        let mut b = PollBackoff::new(50);
        for _ in 0..50 {
            assert!(!b.record_failure());
        }
        assert!(b.record_failure());
    }

    #[test]
    fn success_resets_count() {
        let mut b = PollBackoff::new(50);
        for _ in 0..50 {
            b.record_failure();
        }
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
        assert!(!b.record_failure());
    }

    #[test]
    fn adopts_server_interval() {
        let mut b = PollBackoff::new(50);
        b.adopt_retry_after(Duration::from_secs(7));
        assert_eq!(b.retry_after(), Duration::from_secs(7));
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
