//! Handlers for protocol traffic: `PING`, `PONG` and raw lines.

use chaskis_core::{HandlerError, IrcResponse};

use super::{DispatchLine, HandlerAction, IrcHandler, LineOrigin, MatchEnv, into_action};

/// Fires on server `PING`. The message is the ping payload.
pub struct PingHandler {
    name: String,
    action: HandlerAction,
}

impl PingHandler {
    /// Creates a handler with a custom action.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "ping".to_string(),
            action,
        }
    }

    /// The built-in responder that answers every `PING` with a `PONG`.
    pub fn responder() -> Self {
        Self::new(into_action(|ctx| async move {
            ctx.writer.send_pong(&ctx.response.message)?;
            Ok(())
        }))
        .named("pong-responder")
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for PingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        _env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("PING") else {
            return Ok(None);
        };
        let payload = irc.last_param().unwrap_or_default();
        let server = irc.source_nick().unwrap_or_default();
        Ok(Some(IrcResponse::new(server, "", payload, line.raw.clone())))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

/// Fires on `PONG`. The message is the pong payload.
pub struct PongHandler {
    name: String,
    action: HandlerAction,
}

impl PongHandler {
    /// Creates the handler.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "pong".to_string(),
            action,
        }
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for PongHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        _env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("PONG") else {
            return Ok(None);
        };
        let payload = irc.last_param().unwrap_or_default();
        let server = irc.source_nick().unwrap_or_default();
        Ok(Some(IrcResponse::new(server, "", payload, line.raw.clone())))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

/// Fires on every line read from the server. The message is the raw line.
pub struct ReceiveHandler {
    name: String,
    action: HandlerAction,
}

impl ReceiveHandler {
    /// Creates the handler.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "receive".to_string(),
            action,
        }
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for ReceiveHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        _env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        if line.origin != LineOrigin::Server {
            return Ok(None);
        }
        Ok(Some(raw_response(line)))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

/// Fires on every dispatched line, chaskis events included.
pub struct AllHandler {
    name: String,
    action: HandlerAction,
}

impl AllHandler {
    /// Creates the handler.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "all".to_string(),
            action,
        }
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for AllHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        _env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        Ok(Some(raw_response(line)))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

fn raw_response(line: &DispatchLine) -> IrcResponse {
    let user = line
        .irc
        .as_ref()
        .and_then(|irc| irc.source_nick())
        .unwrap_or_default();
    IrcResponse::new(user, "", line.raw.clone(), line.raw.clone())
}
