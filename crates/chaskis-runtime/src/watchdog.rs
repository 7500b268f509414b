//! Connection liveness watchdog.
//!
//! One watchdog runs per connection. Each received line bumps an activity
//! counter. When a whole period passes without activity the watchdog sends
//! `PING watchdog` and waits up to `timeout` for any traffic; if none
//! arrives it trips, and the engine takes the normal disconnect path.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chaskis_core::IrcWriter;

use crate::config::EngineConfig;
use crate::session::SessionTracker;

/// Payload of the watchdog ping.
pub const WATCHDOG_PING_PAYLOAD: &str = "watchdog";

/// Watchdog timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub enabled: bool,
    /// Send a ping when idle. With this off, only unsolicited traffic
    /// keeps the connection alive.
    pub send_ping: bool,
    pub period: Duration,
    pub timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            send_ping: true,
            period: Duration::from_secs(60),
            timeout: Duration::from_secs(90),
        }
    }
}

impl From<&EngineConfig> for WatchdogConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            enabled: config.watchdog_enabled,
            send_ping: config.watchdog_send_ping,
            period: Duration::from_millis(config.watchdog_period_ms),
            timeout: Duration::from_millis(config.watchdog_timeout_ms),
        }
    }
}

/// Producer side of the activity counter, owned by the reader loop.
#[derive(Debug)]
pub struct Activity {
    tx: watch::Sender<u64>,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(0),
        }
    }

    /// Records one received line.
    pub fn touch(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the watchdog until `stop` fires or it trips.
///
/// Returns `true` if it tripped. Never returns an error: a failed ping
/// send is left to the writer, which reports it as a write failure.
/// Each queued ping is stamped on the session snapshot.
pub async fn run_watchdog<W: IrcWriter + ?Sized>(
    config: WatchdogConfig,
    writer: &W,
    session: &SessionTracker,
    mut activity: watch::Receiver<u64>,
    stop: CancellationToken,
) -> bool {
    if !config.enabled {
        stop.cancelled().await;
        return false;
    }

    activity.borrow_and_update();
    loop {
        tokio::select! {
            _ = stop.cancelled() => return false,
            _ = tokio::time::sleep(config.period) => {}
        }

        if activity.has_changed().unwrap_or(false) {
            activity.borrow_and_update();
            continue;
        }

        if config.send_ping {
            debug!("Connection idle, sending watchdog ping");
            match writer.send_ping(WATCHDOG_PING_PAYLOAD) {
                Ok(()) => session.watchdog_pinged(),
                Err(e) => debug!(error = %e, "Watchdog ping not queued"),
            }
        } else {
            debug!("Connection idle, waiting for traffic");
        }

        let answered = tokio::select! {
            _ = stop.cancelled() => return false,
            result = tokio::time::timeout(config.timeout, activity.changed()) => result,
        };
        match answered {
            Ok(Ok(())) => {
                activity.borrow_and_update();
            }
            // Reader loop is gone; the connection is ending anyway.
            Ok(Err(_)) => return false,
            Err(_) => {
                warn!(timeout = ?config.timeout, "No traffic after watchdog ping");
                return true;
            }
        }
    }
}
