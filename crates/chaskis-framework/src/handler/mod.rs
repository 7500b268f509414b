//! Handler types.
//!
//! A handler decides whether a received line is for it
//! ([`IrcHandler::try_match`]) and, if so, produces the [`IrcResponse`] its
//! action is invoked with. Matching runs on the dispatch worker, in
//! registration order, so it must be cheap and must not block; the action
//! runs afterwards under the invocation timeout.
//!
//! | handler | fires on |
//! |---------|----------|
//! | [`MessageHandler`] | `PRIVMSG` text matching a pattern |
//! | [`JoinHandler`] / [`PartHandler`] | `JOIN` / `PART` |
//! | [`KickHandler`] | `KICK` |
//! | [`PingHandler`] / [`PongHandler`] | `PING` / `PONG` |
//! | [`ReceiveHandler`] | every line from the server |
//! | [`AllHandler`] | every line, chaskis events included |
//! | [`ChaskisEventHandler`] | chaskis events routed to the plugin |

mod ctcp;
mod event;
mod membership;
mod message;
mod protocol;

pub use ctcp::CtcpHandler;
pub use event::ChaskisEventHandler;
pub use membership::{JoinHandler, KickHandler, PartHandler};
pub use message::{MessageHandler, MessageHandlerConfig, ResponseOption};
pub use protocol::{AllHandler, PingHandler, PongHandler, ReceiveHandler};

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::{Captures, Regex};
use tokio::time::Instant;
use tracing::debug;

use chaskis_core::{
    ChaskisEvent, HandlerError, HandlerResult, IrcConfig, IrcLine, IrcResponse, MatchGroups,
    SessionSnapshot,
};

use crate::bridge::BridgeBots;
use crate::context::HandlerContext;

// ============================================================================
// Actions
// ============================================================================

/// Type-erased handler action.
pub type HandlerAction =
    Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wraps an async function or closure as a [`HandlerAction`].
///
/// ```rust,ignore
/// let action = into_action(|ctx: HandlerContext| async move {
///     ctx.reply("pong")?;
///     Ok(())
/// });
/// ```
pub fn into_action<F, Fut>(f: F) -> HandlerAction
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

// ============================================================================
// Lines
// ============================================================================

/// Where a dispatched line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    /// Read from the server.
    Server,
    /// Injected locally (chaskis events).
    Local,
}

/// A line as seen by the dispatch worker, parsed once for all handlers.
#[derive(Debug, Clone)]
pub struct DispatchLine {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Where the line came from.
    pub origin: LineOrigin,
    /// The raw text.
    pub raw: String,
    /// Protocol envelope, for server lines that parse.
    pub irc: Option<IrcLine>,
    /// Decoded event, for local event lines.
    pub event: Option<ChaskisEvent>,
}

impl DispatchLine {
    /// Wraps a line read from the server.
    pub fn server(seq: u64, raw: String) -> Self {
        let irc = IrcLine::parse(&raw);
        if irc.is_none() {
            debug!(seq, line = %raw, "Unparseable line");
        }
        Self {
            seq,
            origin: LineOrigin::Server,
            irc,
            event: None,
            raw,
        }
    }

    /// Wraps a locally injected line.
    ///
    /// Only local lines are decoded as chaskis events, so a server cannot
    /// forge one.
    pub fn local(seq: u64, raw: String) -> Self {
        let event = if ChaskisEvent::is_event_line(&raw) {
            match ChaskisEvent::from_xml(&raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(seq, error = %e, "Dropping malformed chaskis event");
                    None
                }
            }
        } else {
            None
        };
        Self {
            seq,
            origin: LineOrigin::Local,
            irc: None,
            event,
            raw,
        }
    }

    /// Returns the parsed envelope if its command is `command`.
    pub fn command(&self, command: &str) -> Option<&IrcLine> {
        self.irc.as_ref().filter(|line| line.command == command)
    }

    /// The channel a channel-scoped server line was sent to.
    pub fn channel(&self) -> Option<&str> {
        let irc = self.irc.as_ref()?;
        match irc.command.as_str() {
            "PRIVMSG" | "NOTICE" | "JOIN" | "PART" | "KICK" => irc
                .param(0)
                .filter(|target| target.starts_with(['#', '&', '+', '!'])),
            _ => None,
        }
    }
}

/// Read-only state available while matching.
pub struct MatchEnv<'a> {
    /// Session configuration.
    pub config: &'a IrcConfig,
    /// Current session snapshot.
    pub session: &'a SessionSnapshot,
    /// Compiled bridge bots.
    pub bridges: &'a BridgeBots,
    /// Time used for cooldown checks.
    pub now: Instant,
}

impl MatchEnv<'_> {
    /// Returns `true` if `name` is the bot itself.
    pub fn is_self(&self, name: &str) -> bool {
        self.session.is_own_nick(name) || self.config.nick.eq_ignore_ascii_case(name)
    }

    /// Returns `true` if `channel` is configured or currently joined.
    pub fn is_known_channel(&self, channel: &str) -> bool {
        self.config.has_channel(channel) || self.session.in_channel(channel)
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// A registered handler.
pub trait IrcHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Returns the response to invoke the action with, or `None` if the line
    /// is not for this handler. Errors are logged and treated as no match.
    fn try_match(
        &self,
        line: &DispatchLine,
        env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError>;

    /// The action to run on a match.
    fn action(&self) -> HandlerAction;
}

/// Shared, type-erased handler.
pub type BoxedHandler = Arc<dyn IrcHandler>;

/// Collects positional and named captures.
pub(crate) fn capture_groups(regex: &Regex, caps: &Captures<'_>) -> MatchGroups {
    let positional = caps
        .iter()
        .map(|group| group.map(|m| m.as_str().to_string()))
        .collect();
    let named = regex
        .capture_names()
        .flatten()
        .filter_map(|name| {
            caps.name(name)
                .map(|m| (name.to_string(), m.as_str().to_string()))
        })
        .collect();
    MatchGroups::new(positional, named)
}
