//! CTCP requests: `\x01COMMAND payload\x01` sent as a `PRIVMSG`.

use chaskis_core::{HandlerError, IrcResponse};

use super::{DispatchLine, HandlerAction, IrcHandler, MatchEnv, into_action};

const CTCP_DELIMITER: char = '\u{1}';

/// Fires on a CTCP request for one command. The message is the request
/// payload, the channel is where it was sent.
pub struct CtcpHandler {
    name: String,
    command: String,
    action: HandlerAction,
}

impl CtcpHandler {
    /// Creates a handler for `command`, compared case-insensitively.
    pub fn new(command: &str, action: HandlerAction) -> Self {
        Self {
            name: format!("ctcp-{}", command.to_lowercase()),
            command: command.to_uppercase(),
            action,
        }
    }

    /// Answers `VERSION` with `version`.
    pub fn version_responder(version: impl Into<String>) -> Self {
        let version = version.into();
        Self::new(
            "VERSION",
            into_action(move |ctx| {
                let version = version.clone();
                async move {
                    ctx.writer
                        .send_ctcp_reply(&ctx.response.remote_user, "VERSION", &version)?;
                    Ok(())
                }
            }),
        )
        .named("ctcp-version-responder")
    }

    /// Answers `PING` by echoing its payload.
    pub fn ping_responder() -> Self {
        Self::new(
            "PING",
            into_action(|ctx| async move {
                ctx.writer
                    .send_ctcp_reply(&ctx.response.remote_user, "PING", &ctx.response.message)?;
                Ok(())
            }),
        )
        .named("ctcp-ping-responder")
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Splits a CTCP body into its command and payload.
fn parse_request(text: &str) -> Option<(&str, &str)> {
    let body = text
        .strip_prefix(CTCP_DELIMITER)?
        .strip_suffix(CTCP_DELIMITER)?;
    match body.split_once(' ') {
        Some((command, payload)) => Some((command, payload)),
        None => Some((body, "")),
    }
}

impl IrcHandler for CtcpHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("PRIVMSG") else {
            return Ok(None);
        };
        let (Some(nick), Some(target), Some(text)) =
            (irc.source_nick(), irc.param(0), irc.last_param())
        else {
            return Ok(None);
        };
        let Some((command, payload)) = parse_request(text) else {
            return Ok(None);
        };
        if !command.eq_ignore_ascii_case(&self.command) || env.is_self(nick) {
            return Ok(None);
        }
        Ok(Some(IrcResponse::new(nick, target, payload, line.raw.clone())))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}
