//! The immutable session configuration view handed to the engine and plugins.
//!
//! Loading and validation happen in `chaskis-runtime`; this is the resolved
//! result (passwords already read from the environment where requested).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default plain-text IRC port.
pub const DEFAULT_PORT: u16 = 6667;

/// Default minimum delay between outgoing lines.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(800);

/// Longest quit message accepted by the engine.
pub const MAX_QUIT_MESSAGE_LENGTH: usize = 160;

/// Placeholder replaced with the NickServ password in the identify template.
pub const PASSWORD_PLACEHOLDER: &str = "{%password%}";

/// When the NickServ identify message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NickServTrigger {
    /// Right after the JOIN sequence has been issued.
    #[default]
    AfterJoin,
    /// When the server's `001` welcome numeric arrives.
    OnWelcome,
}

/// NickServ identification settings.
#[derive(Clone, PartialEq, Eq)]
pub struct NickServConfig {
    /// Nick of the NickServ service.
    pub nick: String,
    /// Password substituted into the message template.
    pub password: String,
    /// Message template, e.g. `IDENTIFY {%password%}`.
    pub message: String,
    /// When to send the identify message.
    pub trigger: NickServTrigger,
}

impl NickServConfig {
    /// Creates settings with the conventional NickServ nick and template.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            nick: "NickServ".to_string(),
            password: password.into(),
            message: format!("IDENTIFY {PASSWORD_PLACEHOLDER}"),
            trigger: NickServTrigger::AfterJoin,
        }
    }

    /// Renders the identify message with the password substituted.
    pub fn identify_message(&self) -> String {
        self.message.replace(PASSWORD_PLACEHOLDER, &self.password)
    }
}

impl fmt::Debug for NickServConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NickServConfig")
            .field("nick", &self.nick)
            .field("password", &"<redacted>")
            .field("message", &self.message)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// A bot that relays messages for remote users.
///
/// `message_pattern` must contain the named groups `bridgeUser` and
/// `bridgeMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeBot {
    /// Pattern matched against the sender's nick.
    pub nick_pattern: String,
    /// Pattern matched against the relayed message.
    pub message_pattern: String,
}

/// Resolved, read-only session configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct IrcConfig {
    /// Server host name.
    pub server: String,
    /// Server port.
    pub port: u16,
    /// Connect with TLS.
    pub use_ssl: bool,
    /// Bot nick.
    pub nick: String,
    /// User name sent in `USER`.
    pub user_name: String,
    /// Real name sent in `USER`.
    pub real_name: String,
    /// Channels to join.
    pub channels: Vec<String>,
    /// Users allowed to run admin commands.
    pub admins: Vec<String>,
    /// Server password sent with `PASS`.
    pub server_password: Option<String>,
    /// NickServ identification.
    pub nickserv: Option<NickServConfig>,
    /// Minimum delay between outgoing lines.
    pub rate_limit: Duration,
    /// Message used for `PART` and `QUIT` on shutdown.
    pub quit_message: String,
    /// Relay bots whose messages carry a remote user.
    pub bridge_bots: Vec<BridgeBot>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_PORT,
            use_ssl: false,
            nick: "chaskisbot".to_string(),
            user_name: "chaskisbot".to_string(),
            real_name: "Chaskis IRC Bot".to_string(),
            channels: Vec::new(),
            admins: Vec::new(),
            server_password: None,
            nickserv: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            quit_message: "Chaskis IRC Bot".to_string(),
            bridge_bots: Vec::new(),
        }
    }
}

impl IrcConfig {
    /// Creates a configuration for `server` with default identity settings.
    pub fn new(server: impl Into<String>, nick: impl Into<String>) -> Self {
        let nick = nick.into();
        Self {
            server: server.into(),
            user_name: nick.clone(),
            nick,
            ..Default::default()
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Adds a channel to join.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Adds an admin.
    pub fn with_admin(mut self, admin: impl Into<String>) -> Self {
        self.admins.push(admin.into());
        self
    }

    /// Sets the rate limit.
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Adds a bridge bot.
    pub fn with_bridge_bot(
        mut self,
        nick_pattern: impl Into<String>,
        message_pattern: impl Into<String>,
    ) -> Self {
        self.bridge_bots.push(BridgeBot {
            nick_pattern: nick_pattern.into(),
            message_pattern: message_pattern.into(),
        });
        self
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Returns `true` if `channel` is one of the configured channels.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c.eq_ignore_ascii_case(channel))
    }

    /// Returns `true` if `user` is a configured admin.
    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a.eq_ignore_ascii_case(user))
    }
}

impl fmt::Debug for IrcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("nick", &self.nick)
            .field("user_name", &self.user_name)
            .field("real_name", &self.real_name)
            .field("channels", &self.channels)
            .field("admins", &self.admins)
            .field(
                "server_password",
                &self.server_password.as_ref().map(|_| "<redacted>"),
            )
            .field("nickserv", &self.nickserv)
            .field("rate_limit", &self.rate_limit)
            .field("quit_message", &self.quit_message)
            .field("bridge_bots", &self.bridge_bots)
            .finish()
    }
}
