//! Ordered handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::BoxedHandler;

/// A handler together with the plugin that registered it.
#[derive(Clone)]
pub struct RegisteredHandler {
    /// Owning plugin, used in logs.
    pub plugin: String,
    /// The handler.
    pub handler: BoxedHandler,
    /// Channels the owning plugin must ignore.
    pub blacklist: Arc<[String]>,
}

impl RegisteredHandler {
    /// Returns `true` if lines from `channel` must not reach this handler.
    pub fn is_blacklisted(&self, channel: &str) -> bool {
        self.blacklist
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(channel))
    }
}

impl fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("plugin", &self.plugin)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Handlers in registration order.
///
/// Filled while plugins load, before the first connection; the dispatcher
/// takes ownership of it afterwards, so there is no registration during
/// dispatch.
#[derive(Default, Clone, Debug)]
pub struct HandlerRegistry {
    handlers: Vec<RegisteredHandler>,
    blacklists: HashMap<String, Arc<[String]>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn register(&mut self, plugin: &str, handler: BoxedHandler) {
        self.handlers.push(RegisteredHandler {
            plugin: plugin.to_string(),
            handler,
            blacklist: Arc::from(Vec::new()),
        });
    }

    /// Stops every handler of `plugin` from seeing lines from `channels`.
    ///
    /// Applies to handlers registered before and after the call.
    pub fn blacklist(&mut self, plugin: &str, channels: impl IntoIterator<Item = String>) {
        let channels: Vec<String> = channels.into_iter().collect();
        if channels.is_empty() {
            self.blacklists.remove(plugin);
        } else {
            self.blacklists.insert(plugin.to_string(), Arc::from(channels));
        }
    }

    /// Appends every handler from `handlers`, keeping their order.
    pub fn extend(&mut self, plugin: &str, handlers: impl IntoIterator<Item = BoxedHandler>) {
        for handler in handlers {
            self.register(plugin, handler);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredHandler> {
        self.handlers.iter()
    }

    pub(crate) fn into_handlers(self) -> Vec<RegisteredHandler> {
        let Self {
            mut handlers,
            blacklists,
        } = self;
        for entry in &mut handlers {
            if let Some((_, channels)) = blacklists
                .iter()
                .find(|(plugin, _)| plugin.eq_ignore_ascii_case(&entry.plugin))
            {
                entry.blacklist = channels.clone();
            }
        }
        handlers
    }
}
