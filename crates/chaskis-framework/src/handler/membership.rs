//! Channel membership handlers: `JOIN`, `PART` and `KICK`.

use std::collections::HashMap;

use chaskis_core::{HandlerError, IrcResponse, MatchGroups};

use super::{DispatchLine, HandlerAction, IrcHandler, MatchEnv};

/// Named group holding the kicked user.
pub const KICKED_USER_GROUP: &str = "kickedUser";

// ─── Join ───────────────────────────────────────────────────────────────────

/// Fires when someone joins a channel.
///
/// The response carries the joining user and the channel; the message is empty.
pub struct JoinHandler {
    name: String,
    respond_to_self: bool,
    action: HandlerAction,
}

impl JoinHandler {
    /// Creates a handler that ignores the bot's own joins.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "join".to_string(),
            respond_to_self: false,
            action,
        }
    }

    /// Fire on the bot's own joins too.
    pub fn respond_to_self(mut self, enabled: bool) -> Self {
        self.respond_to_self = enabled;
        self
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for JoinHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("JOIN") else {
            return Ok(None);
        };
        let (Some(user), Some(channel)) = (irc.source_nick(), irc.param(0)) else {
            return Ok(None);
        };
        if !self.respond_to_self && env.is_self(user) {
            return Ok(None);
        }
        Ok(Some(IrcResponse::new(user, channel, "", line.raw.clone())))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

// ─── Part ───────────────────────────────────────────────────────────────────

/// Fires when someone leaves a channel.
///
/// The message is the part reason, or empty.
pub struct PartHandler {
    name: String,
    respond_to_self: bool,
    action: HandlerAction,
}

impl PartHandler {
    /// Creates a handler that ignores the bot's own parts.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "part".to_string(),
            respond_to_self: false,
            action,
        }
    }

    /// Fire on the bot's own parts too.
    pub fn respond_to_self(mut self, enabled: bool) -> Self {
        self.respond_to_self = enabled;
        self
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for PartHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("PART") else {
            return Ok(None);
        };
        let (Some(user), Some(channel)) = (irc.source_nick(), irc.param(0)) else {
            return Ok(None);
        };
        if !self.respond_to_self && env.is_self(user) {
            return Ok(None);
        }
        let reason = irc.param(1).unwrap_or_default();
        Ok(Some(IrcResponse::new(user, channel, reason, line.raw.clone())))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

// ─── Kick ───────────────────────────────────────────────────────────────────

/// Fires when someone is kicked from a channel.
///
/// `remote_user` is whoever performed the kick, `message` is the reason, and
/// the kicked user is in the `kickedUser` group.
pub struct KickHandler {
    name: String,
    respond_to_self_performing_kick: bool,
    respond_to_self_being_kicked: bool,
    action: HandlerAction,
}

impl KickHandler {
    /// Creates a handler that ignores kicks by or of the bot.
    pub fn new(action: HandlerAction) -> Self {
        Self {
            name: "kick".to_string(),
            respond_to_self_performing_kick: false,
            respond_to_self_being_kicked: false,
            action,
        }
    }

    /// Fire when the bot performs the kick.
    pub fn respond_to_self_performing_kick(mut self, enabled: bool) -> Self {
        self.respond_to_self_performing_kick = enabled;
        self
    }

    /// Fire when the bot is the one kicked.
    pub fn respond_to_self_being_kicked(mut self, enabled: bool) -> Self {
        self.respond_to_self_being_kicked = enabled;
        self
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IrcHandler for KickHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        let Some(irc) = line.command("KICK") else {
            return Ok(None);
        };
        let (Some(kicker), Some(channel), Some(kicked)) =
            (irc.source_nick(), irc.param(0), irc.param(1))
        else {
            return Ok(None);
        };
        if !self.respond_to_self_performing_kick && env.is_self(kicker) {
            return Ok(None);
        }
        if !self.respond_to_self_being_kicked && env.is_self(kicked) {
            return Ok(None);
        }

        let reason = irc.param(2).unwrap_or_default();
        let groups = MatchGroups::new(
            Vec::new(),
            HashMap::from([(KICKED_USER_GROUP.to_string(), kicked.to_string())]),
        );
        Ok(Some(
            IrcResponse::new(kicker, channel, reason, line.raw.clone()).with_groups(groups),
        ))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{config, counting_action, match_line};

    #[test]
    fn join_reports_user_and_channel() {
        let (action, _) = counting_action();
        let handler = JoinHandler::new(action);

        let response = match_line(&handler, &config(), ":alice!~a@h JOIN #room").unwrap();
        assert_eq!(response.remote_user, "alice");
        assert_eq!(response.channel, "#room");
    }

    #[test]
    fn join_accepts_trailing_channel() {
        let (action, _) = counting_action();
        let handler = JoinHandler::new(action);

        let response = match_line(&handler, &config(), ":alice!~a@h JOIN :#room").unwrap();
        assert_eq!(response.channel, "#room");
    }

    #[test]
    fn join_ignores_self_unless_opted_in() {
        let (action, _) = counting_action();
        let quiet = JoinHandler::new(action.clone());
        let chatty = JoinHandler::new(action).respond_to_self(true);
        let line = ":chaskis!~c@h JOIN #room";

        assert!(match_line(&quiet, &config(), line).is_none());
        assert!(match_line(&chatty, &config(), line).is_some());
    }

    #[test]
    fn part_carries_reason() {
        let (action, _) = counting_action();
        let handler = PartHandler::new(action);

        let response = match_line(&handler, &config(), ":bob!b@h PART #room :bye all").unwrap();
        assert_eq!(response.remote_user, "bob");
        assert_eq!(response.message, "bye all");

        let response = match_line(&handler, &config(), ":bob!b@h PART #room").unwrap();
        assert_eq!(response.message, "");
    }

    #[test]
    fn kick_flags_are_independent() {
        let (action, _) = counting_action();
        let default = KickHandler::new(action.clone());
        let kicked_ok = KickHandler::new(action).respond_to_self_being_kicked(true);

        let by_bot = ":chaskis!c@h KICK #room bob :spam";
        let of_bot = ":op!o@h KICK #room chaskis :spam";

        assert!(match_line(&default, &config(), by_bot).is_none());
        assert!(match_line(&default, &config(), of_bot).is_none());
        assert!(match_line(&kicked_ok, &config(), by_bot).is_none());
        assert!(match_line(&kicked_ok, &config(), of_bot).is_some());
    }

    #[test]
    fn kick_exposes_kicked_user_and_reason() {
        let (action, _) = counting_action();
        let handler = KickHandler::new(action);

        let response = match_line(&handler, &config(), ":op!o@h KICK #room bob :too loud").unwrap();
        assert_eq!(response.remote_user, "op");
        assert_eq!(response.message, "too loud");
        assert_eq!(response.groups.name(KICKED_USER_GROUP), Some("bob"));
    }
}
