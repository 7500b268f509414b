//! Plugin descriptor, the static handle to a plugin.

use super::BoxedPlugin;

/// A static, `Copy` descriptor that names and instantiates a plugin.
///
/// Descriptors live in `static` items and are handed to the runtime builder;
/// nothing is instantiated until the registry loads the plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Plugin name, matched case-insensitively against the configuration.
    pub name: &'static str,

    /// Plugin version, for logs.
    pub version: &'static str,

    /// Factory that creates the live plugin.
    pub create: fn() -> BoxedPlugin,
}

impl PluginDescriptor {
    /// Creates a descriptor.
    pub const fn new(name: &'static str, version: &'static str, create: fn() -> BoxedPlugin) -> Self {
        Self {
            name,
            version,
            create,
        }
    }

    /// Creates the live plugin from the factory function.
    #[inline]
    pub fn instantiate(&self) -> BoxedPlugin {
        (self.create)()
    }

    /// Returns `true` if this descriptor answers to `name`.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
