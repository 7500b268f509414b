//! # Chaskis Core
//!
//! Shared types for the Chaskis IRC bot framework.
//!
//! This crate has no I/O of its own. It defines the vocabulary every other
//! layer speaks:
//!
//! - **Events**: the XML inter-plugin message format ([`ChaskisEvent`])
//! - **Responses**: parsed protocol lines and handler views ([`IrcLine`], [`IrcResponse`])
//! - **Writer**: the outgoing interface handed to handlers ([`IrcWriter`])
//! - **Session**: connection state and the read-only snapshot ([`SessionSnapshot`])
//! - **Config**: the resolved session configuration ([`IrcConfig`])
//! - **Errors**: transport, event and handler errors
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐  line   ┌────────────┐  IrcResponse  ┌──────────┐
//! │ Transport │────────▶│  Dispatch  │──────────────▶│ Handler  │
//! └───────────┘         └────────────┘               └──────────┘
//!       ▲                                                 │
//!       │             rate-limited IrcWriter              │
//!       └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod response;
pub mod session;
pub mod writer;

pub use config::{BridgeBot, IrcConfig, NickServConfig, NickServTrigger};
pub use error::{
    EventError, EventResult, HandlerError, HandlerResult, TransportError, TransportResult,
};
pub use event::{CORE_PROTOCOL, ChaskisEvent, EventArgs, EventSource, core_events};
pub use response::{IrcLine, IrcPrefix, IrcResponse, MatchGroups};
pub use session::{ConnectionState, SessionSnapshot};
pub use writer::{BoxedWriter, IrcWriter};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        ChaskisEvent, EventSource, HandlerError, HandlerResult, IrcConfig, IrcResponse, IrcWriter,
        SessionSnapshot,
    };
}
