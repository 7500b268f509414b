//! Minimum re-fire interval for a handler.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// What a cooldown is tracked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownScope {
    /// One timer for the whole handler.
    #[default]
    PerHandler,
    /// One timer per channel (case-insensitive).
    PerChannel,
}

/// Last-fired bookkeeping for one handler.
///
/// [`try_fire`](Self::try_fire) checks and records in one step under a
/// lock, so two concurrent attempts can never both pass.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    scope: CooldownScope,
    last_fired: Mutex<HashMap<String, Instant>>,
}

impl Cooldown {
    /// Creates a cooldown. A zero period always fires.
    pub fn new(period: Duration, scope: CooldownScope) -> Self {
        Self {
            period,
            scope,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Records a firing at `now` if at least `period` has passed since the
    /// previous one for `channel`'s key. Returns whether it fired.
    pub fn try_fire(&self, channel: &str, now: Instant) -> bool {
        if self.period.is_zero() {
            return true;
        }

        let key = match self.scope {
            CooldownScope::PerHandler => String::new(),
            CooldownScope::PerChannel => channel.to_lowercase(),
        };

        let mut last_fired = self.last_fired.lock();
        match last_fired.get(&key) {
            Some(last) if now.saturating_duration_since(*last) < self.period => false,
            _ => {
                last_fired.insert(key, now);
                true
            }
        }
    }
}
