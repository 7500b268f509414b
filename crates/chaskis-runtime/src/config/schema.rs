//! Configuration schema definitions.
//!
//! ```toml
//! [irc]
//! server = "irc.libera.chat"
//! port = 6697
//! use_ssl = true
//! nick = "chaskisbot"
//! channels = ["#chaskis"]
//! admins = ["xforever1313"]
//! nickserv_password = { env = "CHASKIS_NICKSERV_PASSWORD" }
//!
//! [irc.bridge_bots]
//! "^relay\\d*$" = "^<(?P<bridgeUser>[^>]+)>\\s+(?P<bridgeMessage>.+)$"
//!
//! [engine]
//! handler_timeout_ms = 15000
//!
//! [plugins]
//! enabled = ["echo"]
//!
//! [plugins.settings.echo]
//! prefix = "[echo]"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chaskis_core::{BridgeBot, IrcConfig, NickServConfig, NickServTrigger};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChaskisConfig {
    /// Server and identity settings.
    #[serde(default)]
    pub irc: IrcConfigFile,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connection engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Plugins to load.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

// =============================================================================
// IRC
// =============================================================================

/// A password given inline or read from an environment variable.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PasswordSource {
    /// `password = "hunter2"`
    Inline(String),
    /// `password = { env = "VAR" }`
    Env { env: String },
}

impl PasswordSource {
    /// Returns the password, reading the environment if needed.
    pub fn resolve(&self) -> ConfigResult<String> {
        match self {
            Self::Inline(password) => Ok(password.clone()),
            Self::Env { env } => std::env::var(env)
                .map_err(|e| ConfigError::missing_env_var(env, e)),
        }
    }
}

impl fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::Env { env } => f.debug_struct("Env").field("env", env).finish(),
        }
    }
}

/// The `[irc]` section as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfigFile {
    /// Server host name.
    #[serde(default)]
    pub server: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect with TLS.
    #[serde(default)]
    pub use_ssl: bool,

    /// Accept self-signed or otherwise invalid certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Bot nick.
    #[serde(default = "default_nick")]
    pub nick: String,

    /// User name; defaults to the nick.
    #[serde(default)]
    pub user_name: Option<String>,

    /// Real name.
    #[serde(default = "default_real_name")]
    pub real_name: String,

    /// Channels to join.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Admin nicks.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Server password.
    #[serde(default)]
    pub server_password: Option<PasswordSource>,

    /// NickServ password. NickServ identification is off without one.
    #[serde(default)]
    pub nickserv_password: Option<PasswordSource>,

    /// NickServ nick.
    #[serde(default = "default_nickserv_nick")]
    pub nickserv_nick: String,

    /// NickServ identify template.
    #[serde(default = "default_nickserv_message")]
    pub nickserv_message: String,

    /// When to identify.
    #[serde(default)]
    pub nickserv_trigger: NickServTrigger,

    /// Minimum delay between outgoing lines.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Message used for `PART` and `QUIT` on shutdown.
    #[serde(default = "default_quit_message")]
    pub quit_message: String,

    /// Bridge bots: nick pattern to message pattern.
    #[serde(default)]
    pub bridge_bots: BTreeMap<String, String>,
}

impl Default for IrcConfigFile {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            use_ssl: false,
            accept_invalid_certs: false,
            nick: default_nick(),
            user_name: None,
            real_name: default_real_name(),
            channels: Vec::new(),
            admins: Vec::new(),
            server_password: None,
            nickserv_password: None,
            nickserv_nick: default_nickserv_nick(),
            nickserv_message: default_nickserv_message(),
            nickserv_trigger: NickServTrigger::default(),
            rate_limit_ms: default_rate_limit_ms(),
            quit_message: default_quit_message(),
            bridge_bots: BTreeMap::new(),
        }
    }
}

impl IrcConfigFile {
    /// Resolves the file schema into the engine's read-only view.
    pub fn resolve(&self) -> ConfigResult<IrcConfig> {
        let server_password = self
            .server_password
            .as_ref()
            .map(PasswordSource::resolve)
            .transpose()?;
        let nickserv = self
            .nickserv_password
            .as_ref()
            .map(|source| {
                source.resolve().map(|password| NickServConfig {
                    nick: self.nickserv_nick.clone(),
                    password,
                    message: self.nickserv_message.clone(),
                    trigger: self.nickserv_trigger,
                })
            })
            .transpose()?;

        Ok(IrcConfig {
            server: self.server.clone(),
            port: self.port,
            use_ssl: self.use_ssl,
            nick: self.nick.clone(),
            user_name: self.user_name.clone().unwrap_or_else(|| self.nick.clone()),
            real_name: self.real_name.clone(),
            channels: self.channels.clone(),
            admins: self.admins.clone(),
            server_password,
            nickserv,
            rate_limit: Duration::from_millis(self.rate_limit_ms),
            quit_message: self.quit_message.clone(),
            bridge_bots: self
                .bridge_bots
                .iter()
                .map(|(nick, message)| BridgeBot {
                    nick_pattern: nick.clone(),
                    message_pattern: message.clone(),
                })
                .collect(),
        })
    }
}

fn default_port() -> u16 {
    chaskis_core::config::DEFAULT_PORT
}

fn default_nick() -> String {
    "chaskisbot".to_string()
}

fn default_real_name() -> String {
    "Chaskis IRC Bot".to_string()
}

fn default_nickserv_nick() -> String {
    "NickServ".to_string()
}

fn default_nickserv_message() -> String {
    format!("IDENTIFY {}", chaskis_core::config::PASSWORD_PLACEHOLDER)
}

fn default_rate_limit_ms() -> u64 {
    800
}

fn default_quit_message() -> String {
    "Chaskis IRC Bot".to_string()
}

// =============================================================================
// Engine
// =============================================================================

/// The `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-invocation handler timeout.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Concurrent background jobs handlers may run.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Dispatch queue capacity.
    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,

    /// TCP/TLS connect timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Run the watchdog.
    #[serde(default = "default_true")]
    pub watchdog_enabled: bool,

    /// Send watchdog pings; with this off only incoming traffic counts.
    #[serde(default = "default_true")]
    pub watchdog_send_ping: bool,

    /// Watchdog tick period.
    #[serde(default = "default_watchdog_period_ms")]
    pub watchdog_period_ms: u64,

    /// How long to wait for traffic after a watchdog ping.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    /// First reconnect delay.
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,

    /// Reconnect delay ceiling.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Reconnect delay growth factor.
    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,

    /// Give up after this many consecutive failures. Unbounded when unset.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Publish a `SEND` core event for every line written to the server.
    #[serde(default = "default_true")]
    pub send_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            worker_pool_size: default_worker_pool_size(),
            dispatch_queue_capacity: default_dispatch_queue_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            watchdog_enabled: true,
            watchdog_send_ping: true,
            watchdog_period_ms: default_watchdog_period_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_multiplier: default_reconnect_multiplier(),
            max_reconnect_attempts: None,
            send_events: true,
        }
    }
}

impl EngineConfig {
    /// Handler timeout as a duration.
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_handler_timeout_ms() -> u64 {
    15_000
}

fn default_worker_pool_size() -> usize {
    32
}

fn default_dispatch_queue_capacity() -> usize {
    1024
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_watchdog_period_ms() -> u64 {
    60_000
}

fn default_watchdog_timeout_ms() -> u64 {
    90_000
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}

// =============================================================================
// Plugins
// =============================================================================

/// The `[plugins]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginsConfig {
    /// Plugins that must be compiled in. Empty loads every compiled-in plugin.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Free-form settings per plugin.
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,

    /// Channels each plugin ignores, keyed by plugin name.
    #[serde(default)]
    pub blacklist: HashMap<String, Vec<String>>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` overrides it.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-module levels, e.g. `chaskis_transport = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}
