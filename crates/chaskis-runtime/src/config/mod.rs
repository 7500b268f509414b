//! Configuration module for the Chaskis runtime.
//!
//! Layered loading (defaults, files, environment), the file schema and
//! validation. [`IrcConfigFile::resolve`] produces the read-only
//! [`chaskis_core::IrcConfig`] the engine and handlers see.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChaskisConfig, EngineConfig, IrcConfigFile, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PasswordSource, PluginsConfig, SpanEventConfig,
};
pub use validation::validate_config;
