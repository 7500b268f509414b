//! `PRIVMSG` pattern handler.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use chaskis_core::{HandlerError, IrcConfig, IrcResponse};

use super::{DispatchLine, HandlerAction, IrcHandler, MatchEnv, capture_groups};
use crate::cooldown::{Cooldown, CooldownScope};
use crate::error::{FrameworkError, FrameworkResult};

/// Replaced with the bot's nick.
pub const NICK_PLACEHOLDER: &str = "{%nick%}";
/// Replaced with the sender of the line being matched.
pub const USER_PLACEHOLDER: &str = "{%user%}";
/// Replaced with the channel of the line being matched.
pub const CHANNEL_PLACEHOLDER: &str = "{%channel%}";

/// Where a message handler responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOption {
    /// Only messages sent to a configured or joined channel.
    ChannelOnly,
    /// Only private messages to the bot.
    PmsOnly,
    /// Both.
    #[default]
    ChannelAndPms,
}

/// Settings for a [`MessageHandler`].
///
/// ```rust,ignore
/// let handler = MessageHandler::new(
///     MessageHandlerConfig::new(r"^!{%nick%}\s+help", help_action)
///         .respond_to(ResponseOption::ChannelOnly)
///         .cooldown(Duration::from_secs(10)),
///     &irc_config,
/// )?;
/// ```
#[derive(Clone)]
pub struct MessageHandlerConfig {
    /// Pattern matched against the message text.
    pub line_pattern: String,
    /// Action to run.
    pub action: HandlerAction,
    /// Minimum time between firings.
    pub cooldown: Duration,
    /// What the cooldown is tracked against.
    pub cooldown_scope: CooldownScope,
    /// Channel/PM filter.
    pub respond_to: ResponseOption,
    /// Fire on the bot's own messages.
    pub respond_to_self: bool,
    /// Case-insensitive matching.
    pub ignore_case: bool,
    /// Name used in logs.
    pub name: Option<String>,
}

impl MessageHandlerConfig {
    /// Creates settings with no cooldown, both scopes and no self responses.
    pub fn new(line_pattern: impl Into<String>, action: HandlerAction) -> Self {
        Self {
            line_pattern: line_pattern.into(),
            action,
            cooldown: Duration::ZERO,
            cooldown_scope: CooldownScope::PerHandler,
            respond_to: ResponseOption::ChannelAndPms,
            respond_to_self: false,
            ignore_case: false,
            name: None,
        }
    }

    /// Sets the cooldown.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the cooldown scope.
    pub fn cooldown_scope(mut self, scope: CooldownScope) -> Self {
        self.cooldown_scope = scope;
        self
    }

    /// Sets the channel/PM filter.
    pub fn respond_to(mut self, option: ResponseOption) -> Self {
        self.respond_to = option;
        self
    }

    /// Allows firing on the bot's own messages.
    pub fn respond_to_self(mut self, enabled: bool) -> Self {
        self.respond_to_self = enabled;
        self
    }

    /// Enables case-insensitive matching.
    pub fn ignore_case(mut self, enabled: bool) -> Self {
        self.ignore_case = enabled;
        self
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

enum LinePattern {
    Fixed(Regex),
    /// Still contains per-line placeholders.
    PerLine(String),
}

/// Fires when `PRIVMSG` text matches a pattern.
pub struct MessageHandler {
    name: String,
    pattern: LinePattern,
    ignore_case: bool,
    cooldown: Cooldown,
    respond_to: ResponseOption,
    respond_to_self: bool,
    action: HandlerAction,
}

impl MessageHandler {
    /// Builds the handler, substituting `{%nick%}` from `irc`.
    pub fn new(config: MessageHandlerConfig, irc: &IrcConfig) -> FrameworkResult<Self> {
        let pattern = config
            .line_pattern
            .replace(NICK_PLACEHOLDER, &regex::escape(&irc.nick));

        let pattern = if pattern.contains(USER_PLACEHOLDER) || pattern.contains(CHANNEL_PLACEHOLDER)
        {
            // Surface syntax errors now rather than on the first line.
            compile(&liquefy(&pattern, "user", "#channel"), config.ignore_case)?;
            LinePattern::PerLine(pattern)
        } else {
            LinePattern::Fixed(compile(&pattern, config.ignore_case)?)
        };

        Ok(Self {
            name: config
                .name
                .unwrap_or_else(|| format!("message:{}", config.line_pattern)),
            pattern,
            ignore_case: config.ignore_case,
            cooldown: Cooldown::new(config.cooldown, config.cooldown_scope),
            respond_to: config.respond_to,
            respond_to_self: config.respond_to_self,
            action: config.action,
        })
    }
}

impl IrcHandler for MessageHandler {
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
        let (Some(sender), Some(target), Some(text)) =
            (irc.source_nick(), irc.param(0), irc.param(1))
        else {
            return Ok(None);
        };
        if text.starts_with('\u{1}') {
            return Ok(None);
        }

        let (remote_user, message) = env
            .bridges
            .rewrite(sender, text)
            .unwrap_or_else(|| (sender.to_string(), text.to_string()));

        if !self.respond_to_self && env.is_self(&remote_user) {
            return Ok(None);
        }

        let is_pm = env.is_self(target);
        let in_scope = match self.respond_to {
            ResponseOption::ChannelOnly => !is_pm && env.is_known_channel(target),
            ResponseOption::PmsOnly => is_pm,
            ResponseOption::ChannelAndPms => true,
        };
        if !in_scope {
            return Ok(None);
        }

        let per_line;
        let regex = match &self.pattern {
            LinePattern::Fixed(regex) => regex,
            LinePattern::PerLine(pattern) => {
                per_line = compile(&liquefy(pattern, &remote_user, target), self.ignore_case)
                    .map_err(|e| HandlerError::failed(e.to_string()))?;
                &per_line
            }
        };
        let Some(caps) = regex.captures(&message) else {
            return Ok(None);
        };
        let groups = capture_groups(regex, &caps);

        if !self.cooldown.try_fire(target, env.now) {
            return Ok(None);
        }

        // Private replies go back to whoever sent the message.
        let channel = if is_pm { sender } else { target };

        Ok(Some(
            IrcResponse::new(remote_user, channel, message, line.raw.clone()).with_groups(groups),
        ))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}

fn liquefy(pattern: &str, user: &str, channel: &str) -> String {
    pattern
        .replace(USER_PLACEHOLDER, &regex::escape(user))
        .replace(CHANNEL_PLACEHOLDER, &regex::escape(channel))
}

fn compile(pattern: &str, ignore_case: bool) -> FrameworkResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| FrameworkError::pattern(pattern, e))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::time::Instant;

    use super::*;
    use crate::bridge::BridgeBots;
    use crate::handler::testing::{config, counting_action, match_line};
    use chaskis_core::SessionSnapshot;

    fn handler(settings: MessageHandlerConfig) -> MessageHandler {
        MessageHandler::new(settings, &config()).unwrap()
    }

    #[test]
    fn channel_only_ignores_private_messages() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new("help", action).respond_to(ResponseOption::ChannelOnly));
        let cfg = config();

        let response = match_line(&h, &cfg, ":alice!~a@h PRIVMSG #room :!bot help").unwrap();
        assert_eq!(response.remote_user, "alice");
        assert_eq!(response.channel, "#room");
        assert_eq!(response.message, "!bot help");

        assert!(match_line(&h, &cfg, ":alice!~a@h PRIVMSG chaskis :!bot help").is_none());
    }

    #[test]
    fn channel_only_ignores_unknown_channels() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new("help", action).respond_to(ResponseOption::ChannelOnly));

        assert!(match_line(&h, &config(), ":alice!~a@h PRIVMSG #elsewhere :help").is_none());
    }

    #[test]
    fn pms_only_replies_to_sender() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new("help", action).respond_to(ResponseOption::PmsOnly));
        let cfg = config();

        let response = match_line(&h, &cfg, ":alice!~a@h PRIVMSG chaskis :help").unwrap();
        assert_eq!(response.channel, "alice");
        assert!(match_line(&h, &cfg, ":alice!~a@h PRIVMSG #room :help").is_none());
    }

    #[test]
    fn ignores_own_messages_unless_opted_in() {
        let cfg = config();
        let (action, _) = counting_action();
        let quiet = handler(MessageHandlerConfig::new("hi", action.clone()));
        let chatty = handler(MessageHandlerConfig::new("hi", action).respond_to_self(true));

        let line = ":chaskis!~c@h PRIVMSG #room :hi";
        assert!(match_line(&quiet, &cfg, line).is_none());
        assert!(match_line(&chatty, &cfg, line).is_some());
    }

    #[test]
    fn captures_groups() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new(r"^!roll (?P<sides>\d+)$", action));

        let response = match_line(&h, &config(), ":a!b@c PRIVMSG #room :!roll 20").unwrap();
        assert_eq!(response.groups.get(1), Some("20"));
        assert_eq!(response.groups.name("sides"), Some("20"));
    }

    #[test]
    fn substitutes_placeholders() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new(
            r"^{%nick%}: hello from {%user%} in {%channel%}$",
            action,
        ));
        let cfg = config();

        assert!(match_line(&h, &cfg, ":bob!b@h PRIVMSG #room :chaskis: hello from bob in #room").is_some());
        assert!(match_line(&h, &cfg, ":bob!b@h PRIVMSG #room :chaskis: hello from eve in #room").is_none());
    }

    #[test]
    fn ignores_ctcp_actions() {
        let (action, _) = counting_action();
        let h = handler(MessageHandlerConfig::new(".+", action));

        assert!(match_line(&h, &config(), ":a!b@c PRIVMSG #room :\u{1}ACTION waves\u{1}").is_none());
    }

    #[test]
    fn bridge_bot_rewrites_user_and_message() {
        let (action, _) = counting_action();
        let cfg = config().with_bridge_bot(
            "^relay$",
            r"^<(?P<bridgeUser>\w+)> (?P<bridgeMessage>.+)$",
        );
        let h = MessageHandler::new(MessageHandlerConfig::new("^!help$", action), &cfg).unwrap();

        let response = match_line(&h, &cfg, ":relay!r@h PRIVMSG #room :<carol> !help").unwrap();
        assert_eq!(response.remote_user, "carol");
        assert_eq!(response.message, "!help");
    }

    #[test]
    fn cooldown_suppresses_second_match() {
        let (action, count) = counting_action();
        let h = handler(MessageHandlerConfig::new("hi", action).cooldown(Duration::from_secs(30)));
        let cfg = config();
        let session = SessionSnapshot::new("chaskis", Vec::new());
        let bridges = BridgeBots::default();
        let start = Instant::now();
        let line = DispatchLine::server(1, ":a!b@c PRIVMSG #room :hi".into());

        let at = |now| MatchEnv {
            config: &cfg,
            session: &session,
            bridges: &bridges,
            now,
        };

        assert!(h.try_match(&line, &at(start)).unwrap().is_some());
        assert!(h.try_match(&line, &at(start + Duration::from_secs(10))).unwrap().is_none());
        assert!(h.try_match(&line, &at(start + Duration::from_secs(30))).unwrap().is_some());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let (action, _) = counting_action();
        let err = MessageHandler::new(MessageHandlerConfig::new("(", action), &config())
            .err()
            .unwrap();
        assert!(matches!(err, FrameworkError::InvalidPattern { .. }));
    }
}
