//! Connection lifecycle state and the read-only session snapshot.

use std::fmt;

use tokio::time::Instant;

/// Lifecycle state of the connection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected. Initial state, and terminal after an explicit quit.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Sending `PASS`/`USER`/`NICK`.
    Authenticating,
    /// Sending `JOIN` for every configured channel.
    JoiningChannels,
    /// Steady state.
    Connected,
    /// Tearing down the transport.
    Disconnecting,
    /// Waiting out the backoff before the next connection attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::JoiningChannels => "joining-channels",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Returns `true` while a transport is open.
    pub fn is_online(&self) -> bool {
        matches!(
            self,
            Self::Authenticating | Self::JoiningChannels | Self::Connected
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable copy of the session state, published by the connection engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Current nick.
    pub nick: String,
    /// Channels the server has confirmed we are in.
    pub joined_channels: Vec<String>,
    /// Configured admins.
    pub admins: Vec<String>,
    /// Failed connection attempts since the last successful connection.
    pub reconnect_attempts: u32,
    /// When the last line was received.
    pub last_activity: Option<Instant>,
    /// When the watchdog last queued its ping on this connection.
    pub last_watchdog_ping: Option<Instant>,
}

impl SessionSnapshot {
    /// Creates a disconnected snapshot for `nick`.
    pub fn new(nick: impl Into<String>, admins: Vec<String>) -> Self {
        Self {
            nick: nick.into(),
            admins,
            ..Default::default()
        }
    }

    /// Returns `true` if `name` is the bot's own nick.
    pub fn is_own_nick(&self, name: &str) -> bool {
        self.nick.eq_ignore_ascii_case(name)
    }

    /// Returns `true` if the server confirmed we joined `channel`.
    pub fn in_channel(&self, channel: &str) -> bool {
        self.joined_channels
            .iter()
            .any(|c| c.eq_ignore_ascii_case(channel))
    }
}
