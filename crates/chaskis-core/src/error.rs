//! Unified error types for the Chaskis core.
//!
//! Framework-level errors (handler registration, plugin loading) live in
//! `chaskis-framework`; configuration and orchestration errors live in
//! `chaskis-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while talking to the IRC server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The TCP connection could not be established.
    #[error("connection failed: {addr} - {reason}")]
    ConnectionFailed {
        /// The address that failed to connect.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// The host name could not be resolved.
    #[error("failed to resolve '{host}': {reason}")]
    Dns {
        /// The host that failed to resolve.
        host: String,
        /// Reason for failure.
        reason: String,
    },

    /// The TLS handshake failed.
    #[error("TLS handshake with '{host}' failed: {reason}")]
    Tls {
        /// The host the handshake was attempted with.
        host: String,
        /// Reason for failure.
        reason: String,
    },

    /// The connection was closed by the peer or reset mid-stream.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// The transport was shut down locally.
    #[error("transport shut down")]
    Shutdown,

    /// A line could not be written because it is not a single protocol line.
    #[error("invalid outgoing line: {0}")]
    InvalidLine(String),

    /// The outgoing write queue has been closed.
    #[error("writer is closed")]
    WriterClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error was caused by a local shutdown request.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => Self::closed(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Event Errors
// =============================================================================

/// Errors produced while encoding or decoding a chaskis event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// The payload is not well-formed XML.
    #[error("malformed chaskis event: {0}")]
    Malformed(String),

    /// The root element is not `chaskis_event`.
    #[error("unexpected root element '{0}'")]
    UnexpectedRoot(String),

    /// A required attribute is missing.
    #[error("missing attribute '{0}'")]
    MissingAttribute(&'static str),

    /// The `source_type` attribute is not `CORE` or `PLUGIN`.
    #[error("invalid source type '{0}'")]
    InvalidSourceType(String),

    /// An argument key cannot be used as an element name.
    #[error("invalid argument key '{0}'")]
    InvalidKey(String),
}

impl EventError {
    /// Creates a malformed-payload error from any displayable cause.
    pub fn malformed(cause: impl std::fmt::Display) -> Self {
        Self::Malformed(cause.to_string())
    }
}

/// Result type for event codec operations.
pub type EventResult<T> = Result<T, EventError>;

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors returned from a handler action.
///
/// The dispatch queue logs these together with the handler name and the
/// triggering line; they never stop dispatch of later lines.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler failed with a message.
    #[error("{0}")]
    Failed(String),

    /// The handler observed its cancellation signal and stopped.
    #[error("handler was cancelled")]
    Cancelled,

    /// The handler exceeded its invocation timeout.
    #[error("handler timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Writing a response failed.
    #[error("write failed: {0}")]
    Write(#[from] TransportError),

    /// A chaskis event could not be encoded or decoded.
    #[error("event error: {0}")]
    Event(#[from] EventError),
}

impl HandlerError {
    /// Creates a handler failure with the given message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Result type returned by handler actions.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_reset_maps_to_closed() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(matches!(
            TransportError::from(err),
            TransportError::ConnectionClosed { .. }
        ));
    }

    #[test]
    fn other_io_maps_to_io() {
        let err = std::io::Error::other("boom");
        assert_eq!(TransportError::from(err), TransportError::Io("boom".into()));
    }

    #[test]
    fn handler_error_wraps_transport() {
        let err: HandlerError = TransportError::WriterClosed.into();
        assert_eq!(err.to_string(), "write failed: writer is closed");
    }
}
