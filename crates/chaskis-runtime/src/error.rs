//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or running the engine.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin loading or initialization failed.
    #[error(transparent)]
    Framework(#[from] chaskis_framework::FrameworkError),

    /// A transport failure that ended the run.
    #[error(transparent)]
    Transport(#[from] chaskis_core::TransportError),

    /// Reconnect attempts exhausted.
    #[error("Gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),

    /// The connection engine task panicked or was aborted.
    #[error("Connection engine task failed: {0}")]
    EngineTask(#[from] tokio::task::JoinError),

    /// Installing a signal handler failed.
    #[error("Signal handler error: {0}")]
    Signal(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
