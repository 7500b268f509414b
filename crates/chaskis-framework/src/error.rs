//! Error types for the Chaskis framework.

use thiserror::Error;

/// Errors raised while building handlers or loading plugins.
///
/// These surface before the first connection attempt; a missing plugin is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A handler or bridge-bot pattern does not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler error.
        #[source]
        source: regex::Error,
    },

    /// A handler was configured inconsistently.
    #[error("invalid handler: {0}")]
    InvalidHandler(String),

    /// A plugin listed in the configuration is not compiled in.
    #[error("required plugin '{0}' is not available")]
    MissingPlugin(String),

    /// Two descriptors share a name.
    #[error("plugin '{0}' is registered more than once")]
    DuplicatePlugin(String),

    /// An event could not be encoded.
    #[error(transparent)]
    Event(#[from] chaskis_core::EventError),

    /// The dispatch queue is closed or full.
    #[error("dispatch queue unavailable: {0}")]
    QueueClosed(String),

    /// A plugin's initialization routine failed.
    #[error("plugin '{plugin}' failed to initialize: {reason}")]
    PluginInit {
        /// Plugin name.
        plugin: String,
        /// Failure reason.
        reason: String,
    },
}

impl FrameworkError {
    /// Creates an invalid pattern error.
    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Creates an invalid handler error.
    pub fn invalid_handler(msg: impl Into<String>) -> Self {
        Self::InvalidHandler(msg.into())
    }

    /// Creates a plugin initialization error.
    pub fn plugin_init(plugin: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::PluginInit {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
