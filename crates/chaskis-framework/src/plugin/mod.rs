//! Plugin system.
//!
//! Plugins are compiled in. Each one is exposed as a static
//! [`PluginDescriptor`] holding its name and a factory; the runtime builds a
//! [`PluginRegistry`] from the descriptors, instantiates the plugins named in
//! the configuration and calls [`IrcPlugin::init`] on each before the first
//! connection. The handlers returned there are registered in plugin order.
//!
//! A plugin listed in the configuration but not compiled in is fatal.
//!
//! # Quick start
//!
//! ```rust,ignore
//! struct Echo;
//!
//! #[async_trait]
//! impl IrcPlugin for Echo {
//!     fn name(&self) -> &str { "echo" }
//!
//!     async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
//!         let handler = MessageHandler::new(
//!             MessageHandlerConfig::new("^!echo (?P<text>.+)$", into_action(echo)),
//!             ctx.config(),
//!         )?;
//!         Ok(vec![Arc::new(handler)])
//!     }
//! }
//!
//! pub static ECHO: PluginDescriptor = PluginDescriptor::new("echo", "1.0.0", || Arc::new(Echo));
//! ```
//!
//! # Configuration
//!
//! Each plugin may have a free-form settings section:
//!
//! ```toml
//! [plugins.settings.echo]
//! prefix = "[echo]"
//! ```
//!
//! read in `init` with [`PluginInitContext::get_config`].

// ─── Submodules ──────────────────────────────────────────────────────────────
pub mod builtin;
pub mod context;
pub mod descriptor;
pub mod registry;

// ─── Re-exports ──────────────────────────────────────────────────────────────
pub use builtin::{BUILTIN_PLUGIN, BuiltinPlugin, PluginCatalog, PluginInfo};
pub use context::PluginInitContext;
pub use descriptor::PluginDescriptor;
pub use registry::PluginRegistry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FrameworkResult;
use crate::handler::BoxedHandler;

/// A compiled-in plugin.
#[async_trait]
pub trait IrcPlugin: Send + Sync {
    /// The plugin name. Also its event-bus address.
    fn name(&self) -> &str;

    /// Builds the plugin's handlers.
    ///
    /// Called once, before the first connection. An error aborts startup.
    async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>>;

    /// Called once when the runtime shuts down.
    async fn on_shutdown(&self) {}

    /// One line describing the plugin, shown by `about`.
    fn about(&self) -> &str {
        ""
    }

    /// Where the plugin's source lives, shown by `source`.
    fn source_url(&self) -> &str {
        ""
    }

    /// Help text for `args`, the words after the plugin name in `help`.
    ///
    /// `None` means the plugin has no help for them.
    fn help(&self, _args: &[&str]) -> Option<String> {
        None
    }
}

/// Shared, type-erased plugin.
pub type BoxedPlugin = Arc<dyn IrcPlugin>;
