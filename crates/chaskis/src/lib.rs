//! # Chaskis
//!
//! A plugin-based IRC bot framework.
//!
//! ## Overview
//!
//! Chaskis keeps one server session alive: it connects over TCP or TLS,
//! registers, joins its channels and reconnects with backoff when the link
//! dies or the watchdog stops hearing from the server. Every received line
//! goes through a single ordered dispatch queue to the handlers that
//! compiled-in plugins register. Plugins talk to each other with XML chaskis
//! events that travel through the same queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐ lines ┌────────────────┐ in order ┌──────────────────────────┐
//! │ Transport │──────▶│ Dispatch queue │─────────▶│ Handlers (per plugin)    │
//! └───────────┘       └────────────────┘          └──────────────────────────┘
//!       ▲                     ▲  chaskis events              │
//!       │                     └──────────────────────────────┤
//!       │          rate-limited writer                       │
//!       └────────────────────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: connection engine, watchdog, writer, config and logging
//! - **Framework**: handler types, dispatch, event bus, plugins, scheduler
//! - **Transport**: line framing over TCP and TLS
//! - **Core**: shared types with no I/O
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chaskis::prelude::*;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl IrcPlugin for Hello {
//!     fn name(&self) -> &str { "hello" }
//!
//!     async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
//!         let config = MessageHandlerConfig::new(
//!             "^!hello$",
//!             into_action(|ctx: HandlerContext| async move { ctx.reply("Hello!") }),
//!         );
//!         Ok(vec![Arc::new(MessageHandler::new(config, ctx.config())?)])
//!     }
//! }
//!
//! static HELLO: PluginDescriptor = PluginDescriptor::new("hello", "1.0.0", || Arc::new(Hello));
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     ChaskisRuntime::builder()
//!         .config_file("chaskis.toml")
//!         .plugins(&[HELLO])
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use chaskis_core as core;
pub use chaskis_framework as framework;
pub use chaskis_runtime as runtime;
pub use chaskis_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use chaskis::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use chaskis_runtime::{ChaskisConfig, ChaskisRuntime, RuntimeError, RuntimeResult};

    // Plugin system
    pub use chaskis_framework::prelude::*;

    // Handler types beyond the plugin prelude
    pub use chaskis_framework::{AllHandler, CtcpHandler, PingHandler, PongHandler, ReceiveHandler};

    // Shared types for actions
    pub use chaskis_core::{
        ChaskisEvent, EventSource, HandlerError, HandlerResult, IrcConfig, IrcResponse, IrcWriter,
        SessionSnapshot, core_events,
    };

    pub use std::sync::Arc;
}
