//! The writer interface handed to every handler action.
//!
//! Implementations only need [`IrcWriter::send_raw`],
//! [`IrcWriter::send_chaskis_event`] and the two read accessors; the
//! convenience methods build on top of them. All sends are non-blocking:
//! lines are queued and paced by the rate-limited writer.
//!
//! ```rust,ignore
//! async fn greet(ctx: HandlerContext) -> HandlerResult {
//!     ctx.writer.send_message(&format!("Hello, {}!", ctx.response.remote_user), &ctx.response.channel)?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use crate::config::IrcConfig;
use crate::error::TransportResult;
use crate::event::ChaskisEvent;
use crate::format;
use crate::session::SessionSnapshot;

/// Outgoing side of a session, shared by all handlers.
pub trait IrcWriter: Send + Sync {
    /// Queues one raw protocol line (without CRLF).
    fn send_raw(&self, line: String) -> TransportResult<()>;

    /// Queues a chaskis event.
    ///
    /// The event is delivered to local handlers; it never reaches the server.
    fn send_chaskis_event(&self, event: ChaskisEvent) -> TransportResult<()>;

    /// Returns the current session snapshot.
    fn session(&self) -> SessionSnapshot;

    /// Returns the session configuration.
    fn config(&self) -> Arc<IrcConfig>;

    /// Sends a message to a channel or user, splitting long text.
    fn send_message(&self, message: &str, target: &str) -> TransportResult<()> {
        for chunk in format::split_message(message) {
            self.send_raw(format::privmsg(target, &chunk))?;
        }
        Ok(())
    }

    /// Sends a message to every configured channel.
    fn send_broadcast_message(&self, message: &str) -> TransportResult<()> {
        let config = self.config();
        for channel in &config.channels {
            self.send_message(message, channel)?;
        }
        Ok(())
    }

    /// Sends a notice, splitting long text.
    fn send_notice(&self, message: &str, target: &str) -> TransportResult<()> {
        for chunk in format::split_message(message) {
            self.send_raw(format::notice(target, &chunk))?;
        }
        Ok(())
    }

    /// Sends a CTCP action (`/me`).
    fn send_action(&self, message: &str, target: &str) -> TransportResult<()> {
        for chunk in format::split_message(message) {
            self.send_raw(format::action(target, &chunk))?;
        }
        Ok(())
    }

    /// Answers a CTCP request from `target`.
    fn send_ctcp_reply(&self, target: &str, command: &str, payload: &str) -> TransportResult<()> {
        self.send_raw(format::ctcp_reply(target, command, &format::sanitize(payload)))
    }

    /// Leaves `channel`.
    fn send_part(&self, reason: &str, channel: &str) -> TransportResult<()> {
        self.send_raw(format::part(channel, &format::sanitize(reason)))
    }

    /// Kicks `user` from `channel`.
    fn send_kick(&self, user: &str, channel: &str, reason: &str) -> TransportResult<()> {
        self.send_raw(format::kick(channel, user, &format::sanitize(reason)))
    }

    /// Sends a `PING`.
    fn send_ping(&self, payload: &str) -> TransportResult<()> {
        self.send_raw(format::ping(payload))
    }

    /// Answers a server `PING`.
    fn send_pong(&self, payload: &str) -> TransportResult<()> {
        self.send_raw(format::pong(payload))
    }
}

/// Shared writer handle.
pub type BoxedWriter = Arc<dyn IrcWriter>;
