//! Echo Bot Example
//!
//! Three small plugins on top of the Chaskis runtime:
//!
//! - `echo` answers `!echo <text>` in channels, with a per-channel cooldown,
//!   and announces each echo on the event bus
//! - `greeter` greets users who join and, if configured, posts a recurring
//!   reminder to every channel
//! - `event_logger` logs connection lifecycle events, every line the bot
//!   sends and the echo announcements
//!
//! The built-in `chaskis` commands (`!echo_bot plugins`, `!echo_bot help echo`,
//! ...) come with the runtime.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config chaskis.toml
//! ```
//!
//! ```toml
//! [irc]
//! server = "irc.libera.chat"
//! use_ssl = true
//! port = 6697
//! nick = "echo_bot"
//! channels = ["#chaskis-test"]
//!
//! [plugins]
//! enabled = ["echo", "greeter", "event_logger"]
//!
//! [plugins.settings.greeter]
//! greeting = "Welcome"
//! reminder_minutes = 60
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};

use chaskis::prelude::*;

// ============================================================================
// Echo
// ============================================================================

struct Echo;

#[async_trait]
impl IrcPlugin for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
        let events = ctx.events().clone();
        let config = MessageHandlerConfig::new(
            r"^!echo\s+(?P<text>.+)$",
            into_action(move |ctx: HandlerContext| {
                let events = events.clone();
                async move {
                    let text = ctx.response.groups.name("text").unwrap_or_default().to_string();
                    ctx.reply(&text)?;

                    let announcement = events
                        .broadcast()
                        .with_arg("channel", ctx.response.channel.clone())
                        .with_arg("user", ctx.response.remote_user.clone())
                        .with_arg("text", text);
                    ctx.writer.send_chaskis_event(announcement)?;
                    Ok(())
                }
            }),
        )
        .named("echo")
        .respond_to(ResponseOption::ChannelOnly)
        .cooldown(Duration::from_secs(3))
        .cooldown_scope(CooldownScope::PerChannel);

        Ok(vec![Arc::new(MessageHandler::new(config, ctx.config())?)])
    }

    fn about(&self) -> &str {
        "Repeats what you tell it."
    }

    fn help(&self, _args: &[&str]) -> Option<String> {
        Some("Usage: !echo <text>. Once every 3 seconds per channel.".to_string())
    }
}

static ECHO: PluginDescriptor = PluginDescriptor::new("echo", "1.0.0", || Arc::new(Echo));

// ============================================================================
// Greeter
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GreeterConfig {
    greeting: String,
    /// Minutes between channel reminders; `0` disables them.
    reminder_minutes: u64,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            reminder_minutes: 0,
        }
    }
}

struct Greeter;

#[async_trait]
impl IrcPlugin for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
        let settings: GreeterConfig = ctx
            .get_config()
            .map_err(|e| FrameworkError::plugin_init("greeter", e))?;

        if settings.reminder_minutes > 0 {
            let every = Duration::from_secs(settings.reminder_minutes * 60);
            ctx.scheduler().schedule_recurring_event(every, |writer| async move {
                writer.send_broadcast_message("Say !echo <text> and I will repeat it.")?;
                Ok(())
            });
        }

        let greeting = Arc::new(settings.greeting);
        let join = JoinHandler::new(into_action(move |ctx: HandlerContext| {
            let greeting = greeting.clone();
            async move {
                ctx.reply(&format!("{greeting}, {}!", ctx.response.remote_user))
            }
        }))
        .named("greeter");

        Ok(vec![Arc::new(join)])
    }
}

static GREETER: PluginDescriptor =
    PluginDescriptor::new("greeter", "1.0.0", || Arc::new(Greeter));

// ============================================================================
// Event logger
// ============================================================================

struct EventLogger;

#[async_trait]
impl IrcPlugin for EventLogger {
    fn name(&self) -> &str {
        "event_logger"
    }

    async fn init(&self, ctx: &PluginInitContext) -> FrameworkResult<Vec<BoxedHandler>> {
        let lifecycle = ctx.subscribe(
            EventSource::Core,
            None,
            into_action(|ctx: HandlerContext| async move {
                if let Some(event) = &ctx.event {
                    match event.event_id() {
                        Some(core_events::WATCHDOG_FAILED) => {
                            warn!(server = ?event.args.get("server"), "Server went quiet")
                        }
                        Some(id) if core_events::is_send_event(id) => {
                            debug!(event = id, args = ?event.args, "Sent")
                        }
                        Some(id) => info!(event = id, args = ?event.args, "Lifecycle"),
                        None => {}
                    }
                }
                Ok(())
            }),
        );

        let echoes = ctx.subscribe(
            EventSource::Plugin,
            Some("echo"),
            into_action(|ctx: HandlerContext| async move {
                if let Some(event) = &ctx.event {
                    info!(
                        channel = ?event.args.get("channel"),
                        user = ?event.args.get("user"),
                        "Echoed"
                    );
                }
                Ok(())
            }),
        );

        Ok(vec![lifecycle, echoes])
    }
}

static EVENT_LOGGER: PluginDescriptor =
    PluginDescriptor::new("event_logger", "1.0.0", || Arc::new(EventLogger));

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Debug, Parser)]
#[command(version, about = "Chaskis echo bot")]
struct Args {
    /// Configuration file. Searched for as `chaskis.*` when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ChaskisRuntime::builder().plugins(&[ECHO, GREETER, EVENT_LOGGER]);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder.build()?;
    runtime.run().await?;
    Ok(())
}
