//! Reconnect backoff.

use std::time::Duration;

use crate::config::EngineConfig;

/// Capped exponential backoff between reconnect attempts.
///
/// The delay starts at `initial`, grows by `multiplier` after every failed
/// attempt up to `max`, and returns to `initial` once a connection is
/// established.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: Option<u32>,
    attempts: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            max_attempts: None,
            attempts: 0,
            current: initial,
        }
    }

    /// Limits consecutive failures. Unbounded by default.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_initial_delay_ms),
            Duration::from_millis(config.reconnect_max_delay_ms),
            config.reconnect_multiplier,
        )
        .with_max_attempts(config.max_reconnect_attempts)
    }

    /// Consecutive failures since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a failure and returns how long to wait before the next
    /// attempt, or `None` if the attempt limit is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        let delay = self.current;
        self.attempts += 1;
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = std::cmp::min(grown, self.max);
        Some(delay)
    }

    /// Resets after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn grows_and_caps() {
        let mut backoff = Backoff::new(ms(100), ms(500), 2.0);
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(delays, [ms(100), ms(200), ms(400), ms(500), ms(500)]);
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = Backoff::new(ms(100), ms(1000), 3.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(ms(100)));
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut backoff = Backoff::new(ms(10), ms(10), 1.0).with_max_attempts(Some(2));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn oversized_growth_clamps_to_max() {
        let mut backoff = Backoff::new(ms(100), ms(2_000), 1e30);
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(delays, [ms(100), ms(2_000), ms(2_000), ms(2_000)]);
    }

    #[test]
    fn unrepresentable_growth_clamps_to_max() {
        let mut backoff = Backoff::new(ms(100), ms(2_000), f64::NAN);
        assert_eq!(backoff.next_delay(), Some(ms(100)));
        assert_eq!(backoff.next_delay(), Some(ms(2_000)));
    }
}
