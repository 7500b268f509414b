//! Context handed to [`IrcPlugin::init`](super::IrcPlugin::init).

use std::sync::Arc;

use chaskis_core::{BoxedWriter, EventSource, IrcConfig};

use crate::bus::{EventBus, EventCreator};
use crate::handler::{BoxedHandler, HandlerAction};
use crate::scheduler::EventScheduler;

/// What a plugin gets while it builds its handlers.
///
/// ```rust,ignore
/// #[derive(serde::Deserialize, Default)]
/// #[serde(default)]
/// struct GreeterConfig { greeting: String }
///
/// async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
///     let cfg: GreeterConfig = ctx.get_config().map_err(|e| FrameworkError::plugin_init("greeter", e))?;
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct PluginInitContext {
    plugin: String,
    config: Arc<IrcConfig>,
    writer: BoxedWriter,
    events: EventCreator,
    bus: EventBus,
    scheduler: EventScheduler,
    settings: Arc<serde_json::Value>,
}

impl PluginInitContext {
    /// Creates a context for `plugin`.
    pub fn new(
        plugin: &str,
        config: Arc<IrcConfig>,
        writer: BoxedWriter,
        scheduler: EventScheduler,
        bus: EventBus,
        settings: Arc<serde_json::Value>,
    ) -> Self {
        Self {
            plugin: plugin.to_string(),
            config,
            writer,
            events: bus.creator(plugin),
            bus,
            scheduler,
            settings,
        }
    }

    /// The plugin being initialized.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Read-only session configuration.
    pub fn config(&self) -> &IrcConfig {
        &self.config
    }

    /// Write capability, usable from actions and background tasks.
    pub fn writer(&self) -> BoxedWriter {
        self.writer.clone()
    }

    /// Event creator stamped with this plugin's name.
    pub fn events(&self) -> &EventCreator {
        &self.events
    }

    /// The event bus. Handler actions must use
    /// [`try_publish`](EventBus::try_publish), since the worker running them
    /// is the one draining the queue.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribes this plugin to chaskis events.
    pub fn subscribe(
        &self,
        source_type: EventSource,
        from: Option<&str>,
        action: HandlerAction,
    ) -> BoxedHandler {
        EventBus::subscribe(&self.plugin, source_type, from, action)
    }

    /// Scheduler for delayed and recurring jobs. Jobs stop at shutdown.
    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    /// Deserialises the plugin's settings section into `T`.
    ///
    /// A missing section reads as an empty table; use `#[serde(default)]`
    /// on `T` to make every field optional.
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.settings.as_ref() {
            serde_json::Value::Null => {
                T::deserialize(&serde_json::Value::Object(serde_json::Map::new()))
            }
            value => T::deserialize(value),
        }
    }
}

impl std::fmt::Debug for PluginInitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInitContext")
            .field("plugin", &self.plugin)
            .field("settings", &self.settings)
            .finish()
    }
}
