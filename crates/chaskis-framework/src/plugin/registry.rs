//! Compiled-in plugin registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use chaskis_core::{BoxedWriter, IrcConfig};

use super::{BoxedPlugin, PluginDescriptor, PluginInitContext};
use crate::bus::EventBus;
use crate::error::{FrameworkError, FrameworkResult};
use crate::registry::HandlerRegistry;
use crate::scheduler::EventScheduler;

/// The set of plugins compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginRegistry {
    /// Builds a registry, rejecting duplicate names.
    pub fn new(descriptors: &[PluginDescriptor]) -> FrameworkResult<Self> {
        let mut registry = Self::default();
        for descriptor in descriptors {
            registry.add(*descriptor)?;
        }
        Ok(registry)
    }

    /// Adds one descriptor.
    pub fn add(&mut self, descriptor: PluginDescriptor) -> FrameworkResult<()> {
        if self.get(descriptor.name).is_some() {
            return Err(FrameworkError::DuplicatePlugin(descriptor.name.to_string()));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Looks a descriptor up by name.
    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.descriptors.iter().find(|d| d.is_named(name))
    }

    /// Names of every compiled-in plugin, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    /// Number of compiled-in plugins.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no plugin is compiled in.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Instantiates the plugins named in `enabled`, in that order.
    ///
    /// An empty list loads every compiled-in plugin. A name with no
    /// descriptor is a [`FrameworkError::MissingPlugin`].
    pub fn load(&self, enabled: &[String]) -> FrameworkResult<Vec<BoxedPlugin>> {
        if enabled.is_empty() {
            return Ok(self.descriptors.iter().map(|d| d.instantiate()).collect());
        }

        let mut plugins = Vec::with_capacity(enabled.len());
        for name in enabled {
            let descriptor = self.get(name).ok_or_else(|| {
                error!(plugin = %name, available = ?self.names(), "Required plugin is not compiled in");
                FrameworkError::MissingPlugin(name.clone())
            })?;
            info!(plugin = descriptor.name, version = descriptor.version, "Loaded plugin");
            plugins.push(descriptor.instantiate());
        }
        Ok(plugins)
    }

    /// Calls `init` on every plugin and registers the returned handlers.
    ///
    /// `settings` maps plugin names (case-insensitive) to their settings
    /// section. The first failing plugin aborts initialization.
    pub async fn initialize(
        plugins: &[BoxedPlugin],
        config: Arc<IrcConfig>,
        writer: BoxedWriter,
        scheduler: &EventScheduler,
        bus: &EventBus,
        settings: &HashMap<String, serde_json::Value>,
        handlers: &mut HandlerRegistry,
    ) -> FrameworkResult<()> {
        for plugin in plugins {
            let name = plugin.name();
            let section = settings
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
                .unwrap_or(serde_json::Value::Null);
            let ctx = PluginInitContext::new(
                name,
                config.clone(),
                writer.clone(),
                scheduler.clone(),
                bus.clone(),
                Arc::new(section),
            );

            let built = plugin.init(&ctx).await.map_err(|e| match e {
                FrameworkError::PluginInit { .. } => e,
                other => FrameworkError::plugin_init(name, other),
            })?;
            info!(plugin = %name, handlers = built.len(), "Plugin initialized");
            handlers.extend(name, built);
        }
        Ok(())
    }
}
