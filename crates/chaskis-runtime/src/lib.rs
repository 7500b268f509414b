//! Chaskis Runtime - connection engine and orchestration.
//!
//! This crate provides:
//! - The protocol state machine with reconnect backoff (`IrcConnection`)
//! - The rate-limited writer every outgoing line goes through
//! - The liveness watchdog
//! - The session snapshot publisher
//! - Layered configuration loading and validation
//! - Logging setup
//! - `ChaskisRuntime`, which wires all of it to the dispatch worker
//!
//! ```ignore
//! use chaskis_runtime::ChaskisRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChaskisRuntime::builder()
//!         .config_file("chaskis.toml")
//!         .plugins(&[ECHO_PLUGIN])
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod watchdog;
pub mod writer;

pub use backoff::Backoff;
pub use config::{ChaskisConfig, ConfigError, ConfigLoader, ConfigResult};
pub use connection::{Disconnect, IrcConnection};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CORE_PLUGIN, ChaskisRuntime, RuntimeBuilder, VERSION};
pub use session::SessionTracker;
pub use watchdog::{WATCHDOG_PING_PAYLOAD, WatchdogConfig};
pub use writer::{WriterHandle, spawn_writer};

// Re-export tracing for use by plugin crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
