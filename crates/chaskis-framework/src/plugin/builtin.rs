//! The built-in `chaskis` plugin.
//!
//! Answers questions about the bot itself:
//!
//! | Command                      | Reply                                  |
//! |------------------------------|----------------------------------------|
//! | `!nick plugins`              | names of every loaded plugin           |
//! | `!nick admins`               | configured admins                      |
//! | `!nick source [plugin]`      | where the plugin's source lives        |
//! | `!nick version [plugin]`     | the plugin's version                   |
//! | `!nick about [plugin]`       | the plugin's description               |
//! | `!nick help [plugin] [args]` | the plugin's help for `args`           |
//!
//! `@` works in place of `!`. Without a plugin name the commands describe
//! `chaskis` itself.
//!
//! Other plugins can ask for a version over the event bus by sending
//! `QUERY=VERSION` and `PLUGIN=<name>` to `chaskis`. The reply is targeted
//! back at the sender with either `VERSION` or `ERROR`, and carries the
//! query's passthrough arguments.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use chaskis_core::EventSource;

use super::{BoxedPlugin, IrcPlugin, PluginInitContext};
use crate::bus::EventCreator;
use crate::error::FrameworkResult;
use crate::handler::{BoxedHandler, HandlerAction, MessageHandler, MessageHandlerConfig, into_action};

/// Name of the built-in plugin.
pub const BUILTIN_PLUGIN: &str = "chaskis";

/// Reply to a bare `help`.
pub const DEFAULT_HELP: &str = "Default Commands: 'plugins', 'admins', 'source [plugin]', \
     'version [plugin]', 'about [plugin]', 'help [plugin] [arg1] [arg2]...'";

const ABOUT: &str = "I am running chaskis, a plugin-based IRC framework written in Rust.";

const SOURCE_URL: &str = "https://github.com/xforever1313/Chaskis/";

/// What the built-in commands report about one plugin.
#[derive(Clone)]
pub struct PluginInfo {
    name: String,
    version: String,
    about: String,
    source_url: String,
    plugin: Option<BoxedPlugin>,
}

impl PluginInfo {
    /// The plugin name, lower-cased.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plugin version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The plugin description.
    pub fn about(&self) -> &str {
        &self.about
    }

    /// Where the plugin's source lives.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The plugin's help for `args`.
    pub fn help(&self, args: &[&str]) -> Option<String> {
        match &self.plugin {
            Some(plugin) => plugin.help(args),
            None => Some(builtin_help(args)),
        }
    }
}

impl std::fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}

/// The loaded plugins, with `chaskis` itself first.
#[derive(Clone, Debug)]
pub struct PluginCatalog {
    builtin: PluginInfo,
    loaded: Vec<PluginInfo>,
}

impl PluginCatalog {
    /// Creates a catalog holding only `chaskis` at `version`.
    pub fn new(version: &str) -> Self {
        Self {
            builtin: PluginInfo {
                name: BUILTIN_PLUGIN.to_string(),
                version: version.to_string(),
                about: ABOUT.to_string(),
                source_url: SOURCE_URL.to_string(),
                plugin: None,
            },
            loaded: Vec::new(),
        }
    }

    /// Records a loaded plugin.
    pub fn add(&mut self, plugin: BoxedPlugin, version: &str) {
        self.loaded.push(PluginInfo {
            name: plugin.name().to_lowercase(),
            version: version.to_string(),
            about: plugin.about().to_string(),
            source_url: plugin.source_url().to_string(),
            plugin: Some(plugin),
        });
    }

    /// Looks a plugin up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        std::iter::once(&self.builtin)
            .chain(&self.loaded)
            .find(|info| info.name.eq_ignore_ascii_case(name))
    }

    /// Every plugin name, `chaskis` first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(&self.builtin)
            .chain(&self.loaded)
            .map(|info| info.name.as_str())
            .collect()
    }

    /// The entry for `chaskis` itself.
    pub fn builtin(&self) -> &PluginInfo {
        &self.builtin
    }
}

/// The `chaskis` plugin.
pub struct BuiltinPlugin {
    catalog: Arc<PluginCatalog>,
}

impl BuiltinPlugin {
    /// Creates the plugin over `catalog`.
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }
}

#[async_trait]
impl IrcPlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        BUILTIN_PLUGIN
    }

    async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
        let catalog = self.catalog.clone();
        let plugin_list = format!(
            "List of plugins I am running: {}",
            catalog.names().join(" ")
        );
        let admin_list = format!(
            "People who are admins for me: {}",
            ctx.config().admins.join(" ")
        );

        Ok(vec![
            command(ctx, "plugins", r"plugin(s|\s*list)", fixed(plugin_list))?,
            command(
                ctx,
                "source",
                r"source(\s+(?P<plugin>\w+))?",
                describe(catalog.clone(), |name, info| {
                    format!("Source of '{name}': {}", info.source_url())
                }),
            )?,
            command(
                ctx,
                "version",
                r"version(\s+(?P<plugin>\w+))?",
                describe(catalog.clone(), |name, info| {
                    format!("Version of '{name}': {}", info.version())
                }),
            )?,
            command(
                ctx,
                "about",
                r"about(\s+(?P<plugin>\w+))?",
                describe(catalog.clone(), |name, info| {
                    format!("About '{name}': {}", info.about())
                }),
            )?,
            command(ctx, "help", r"help(\s+(?P<args>.+))?", help(catalog.clone()))?,
            command(ctx, "admins", "admins", fixed(admin_list))?,
            ctx.subscribe(EventSource::Plugin, None, version_query(catalog)),
        ])
    }

    fn about(&self) -> &str {
        ABOUT
    }

    fn source_url(&self) -> &str {
        SOURCE_URL
    }

    fn help(&self, args: &[&str]) -> Option<String> {
        Some(builtin_help(args))
    }
}

fn builtin_help(args: &[&str]) -> String {
    let Some(first) = args.first() else {
        return DEFAULT_HELP.to_string();
    };
    match *first {
        "plugins" | "pluginlist" => "Gets the list of plugins running.",
        "source" => "Gets the source code URL of the given plugin.",
        "version" => "Gets the version of the given plugin.",
        "about" => "Gets information about the given plugin.",
        "help" => "Gets help information about the given plugin.",
        "admins" => "Shows the list of people who are considered admins.",
        _ => "Invalid Command!",
    }
    .to_string()
}

fn not_loaded(name: &str) -> String {
    format!("'{name}' is not a plugin I have loaded...")
}

fn command(
    ctx: &PluginInitContext,
    name: &str,
    pattern: &str,
    action: HandlerAction,
) -> FrameworkResult<BoxedHandler> {
    let config = MessageHandlerConfig::new(format!(r"^[!@]{{%nick%}}:?\s+{pattern}"), action)
        .named(format!("{BUILTIN_PLUGIN}:{name}"));
    Ok(Arc::new(MessageHandler::new(config, ctx.config())?))
}

fn fixed(message: String) -> HandlerAction {
    into_action(move |ctx| {
        let message = message.clone();
        async move { ctx.reply(&message) }
    })
}

fn describe(catalog: Arc<PluginCatalog>, render: fn(&str, &PluginInfo) -> String) -> HandlerAction {
    into_action(move |ctx| {
        let catalog = catalog.clone();
        async move {
            let name = ctx
                .response
                .groups
                .name("plugin")
                .filter(|name| !name.is_empty())
                .unwrap_or(BUILTIN_PLUGIN)
                .to_lowercase();
            let message = match catalog.get(&name) {
                Some(info) => render(&name, info),
                None => not_loaded(&name),
            };
            ctx.reply(&message)
        }
    })
}

fn help(catalog: Arc<PluginCatalog>) -> HandlerAction {
    into_action(move |ctx| {
        let catalog = catalog.clone();
        async move {
            let args = ctx
                .response
                .groups
                .name("args")
                .unwrap_or_default()
                .to_lowercase();
            let words: Vec<&str> = args.split_whitespace().collect();
            let (info, rest) = match words.first().and_then(|first| catalog.get(first)) {
                Some(info) => (info, &words[1..]),
                None => (catalog.builtin(), &words[..]),
            };
            let message = info
                .help(rest)
                .unwrap_or_else(|| format!("'{}' has no help for that.", info.name()));
            ctx.reply(&message)
        }
    })
}

fn version_query(catalog: Arc<PluginCatalog>) -> HandlerAction {
    into_action(move |ctx| {
        let catalog = catalog.clone();
        async move {
            let Some(event) = ctx.event.as_ref() else {
                return Ok(());
            };
            if event.args.get("QUERY") != Some("VERSION") {
                return Ok(());
            }

            let reply = EventCreator::new(BUILTIN_PLUGIN).targeted(event.source_plugin());
            let mut reply = match event.args.get("PLUGIN") {
                Some(name) => match catalog.get(name) {
                    Some(info) => reply.with_arg("VERSION", info.version()),
                    None => reply.with_arg("ERROR", "Plugin Name Not Found"),
                },
                None => reply.with_arg("ERROR", "Need Plugin Key"),
            };
            reply.passthrough_args = event.passthrough_args.clone();
            debug!(to = %event.source_plugin(), "Answering version query");
            ctx.writer.send_chaskis_event(reply)?;
            Ok(())
        }
    })
}
