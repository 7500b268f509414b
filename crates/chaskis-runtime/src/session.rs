//! Publishes the session snapshot.

use tokio::sync::watch;
use tokio::time::Instant;

use chaskis_core::{ConnectionState, IrcConfig, IrcLine, SessionSnapshot};

/// Owner of the session snapshot.
///
/// Only the connection engine writes; handlers get a `watch::Receiver`
/// through their writer.
#[derive(Debug)]
pub struct SessionTracker {
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionTracker {
    pub fn new(config: &IrcConfig) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::new(
            config.nick.clone(),
            config.admins.clone(),
        ));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.tx.borrow().state
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.tx.send_if_modified(|s| {
            if s.state == state {
                return false;
            }
            s.state = state;
            if !state.is_online() {
                s.joined_channels.clear();
            }
            if state == ConnectionState::Connecting {
                s.last_activity = None;
                s.last_watchdog_ping = None;
            }
            true
        });
    }

    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.tx.send_modify(|s| s.reconnect_attempts = attempts);
    }

    /// Records that the watchdog queued its ping.
    pub fn watchdog_pinged(&self) {
        let now = Instant::now();
        self.tx.send_modify(|s| s.last_watchdog_ping = Some(now));
    }

    /// Resets the nick to the configured one before registering again.
    pub fn reset_nick(&self, nick: &str) {
        self.tx.send_modify(|s| s.nick = nick.to_string());
    }

    /// Applies one received line: activity time, own membership and nick.
    ///
    /// Returns the parsed line, if it parses.
    pub fn observe(&self, raw: &str) -> Option<IrcLine> {
        let now = Instant::now();
        let line = IrcLine::parse(raw);
        self.tx.send_modify(|s| {
            s.last_activity = Some(now);
            if let Some(line) = &line {
                apply(s, line);
            }
        });
        line
    }
}

fn apply(s: &mut SessionSnapshot, line: &IrcLine) {
    let from_self = line.source_nick().is_some_and(|n| s.is_own_nick(n));

    match line.command.as_str() {
        // RPL_WELCOME names the nick the server registered us under.
        "001" => {
            if let Some(nick) = line.param(0) {
                s.nick = nick.to_string();
            }
        }
        "JOIN" if from_self => {
            if let Some(channel) = line.param(0)
                && !s.in_channel(channel)
            {
                s.joined_channels.push(channel.to_string());
            }
        }
        "PART" if from_self => {
            if let Some(channel) = line.param(0) {
                s.joined_channels.retain(|c| !c.eq_ignore_ascii_case(channel));
            }
        }
        "KICK" => {
            if let (Some(channel), Some(user)) = (line.param(0), line.param(1))
                && s.is_own_nick(user)
            {
                s.joined_channels.retain(|c| !c.eq_ignore_ascii_case(channel));
            }
        }
        "NICK" if from_self => {
            if let Some(nick) = line.param(0) {
                s.nick = nick.to_string();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SessionTracker {
        SessionTracker::new(&IrcConfig::new("irc.example.net", "bot").with_admin("root"))
    }

    #[test]
    fn tracks_own_membership() {
        let t = tracker();
        t.set_state(ConnectionState::Connected);
        t.observe(":bot!b@h JOIN #a");
        t.observe(":bot!b@h JOIN :#b");
        t.observe(":other!o@h JOIN #c");
        assert_eq!(t.snapshot().joined_channels, ["#a", "#b"]);

        t.observe(":bot!b@h PART #a :bye");
        t.observe(":op!o@h KICK #b bot :out");
        assert!(t.snapshot().joined_channels.is_empty());
    }

    #[test]
    fn follows_nick_changes() {
        let t = tracker();
        t.observe(":server 001 bot_ :Welcome");
        assert_eq!(t.snapshot().nick, "bot_");
        t.observe(":bot_!b@h NICK :bot");
        assert!(t.snapshot().is_own_nick("BOT"));
    }

    #[test]
    fn going_offline_forgets_channels() {
        let t = tracker();
        t.set_state(ConnectionState::Connected);
        t.observe(":bot!b@h JOIN #a");
        t.set_state(ConnectionState::Disconnecting);
        let snapshot = t.snapshot();
        assert!(snapshot.joined_channels.is_empty());
        assert_eq!(snapshot.admins, ["root"]);
    }

    #[test]
    fn reconnecting_clears_connection_timestamps() {
        let t = tracker();
        t.set_state(ConnectionState::Connected);
        t.observe("PONG :watchdog");
        t.watchdog_pinged();
        let snapshot = t.snapshot();
        assert!(snapshot.last_activity.is_some());
        assert!(snapshot.last_watchdog_ping.is_some());

        t.set_state(ConnectionState::Reconnecting);
        assert!(t.snapshot().last_watchdog_ping.is_some());

        t.set_state(ConnectionState::Connecting);
        let snapshot = t.snapshot();
        assert!(snapshot.last_activity.is_none());
        assert!(snapshot.last_watchdog_ping.is_none());
    }

    #[test]
    fn every_line_is_activity() {
        let t = tracker();
        assert!(t.snapshot().last_activity.is_none());
        t.observe("garbage");
        assert!(t.snapshot().last_activity.is_some());
    }
}
