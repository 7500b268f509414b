//! Bridge-bot rewriting.
//!
//! A bridge bot relays messages from another network, e.g.
//! `<relay> <carol> hi there`. When the sender matches a configured nick
//! pattern and the text matches its message pattern, the handler sees
//! `carol` as the remote user and `hi there` as the message.

use regex::Regex;

use chaskis_core::BridgeBot;

use crate::error::{FrameworkError, FrameworkResult};

/// Named group holding the relayed user.
pub const BRIDGE_USER_GROUP: &str = "bridgeUser";

/// Named group holding the relayed message.
pub const BRIDGE_MESSAGE_GROUP: &str = "bridgeMessage";

struct CompiledBridge {
    nick: Regex,
    message: Regex,
}

/// Compiled bridge-bot patterns.
#[derive(Default)]
pub struct BridgeBots {
    bots: Vec<CompiledBridge>,
}

impl BridgeBots {
    /// Compiles every configured bridge bot.
    ///
    /// Fails if a pattern does not compile or the message pattern lacks one
    /// of the two required named groups.
    pub fn compile(bots: &[BridgeBot]) -> FrameworkResult<Self> {
        let mut compiled = Vec::with_capacity(bots.len());
        for bot in bots {
            let nick = Regex::new(&bot.nick_pattern)
                .map_err(|e| FrameworkError::pattern(&bot.nick_pattern, e))?;
            let message = Regex::new(&bot.message_pattern)
                .map_err(|e| FrameworkError::pattern(&bot.message_pattern, e))?;

            let names: Vec<_> = message.capture_names().flatten().collect();
            for group in [BRIDGE_USER_GROUP, BRIDGE_MESSAGE_GROUP] {
                if !names.contains(&group) {
                    return Err(FrameworkError::invalid_handler(format!(
                        "bridge bot message pattern '{}' has no '{group}' group",
                        bot.message_pattern
                    )));
                }
            }

            compiled.push(CompiledBridge { nick, message });
        }
        Ok(Self { bots: compiled })
    }

    /// Returns `true` if no bridge bots are configured.
    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Returns the relayed `(user, message)` if `sender` is a bridge bot
    /// and `message` has the relay shape with both parts non-empty.
    pub fn rewrite(&self, sender: &str, message: &str) -> Option<(String, String)> {
        self.bots
            .iter()
            .filter(|bot| bot.nick.is_match(sender))
            .find_map(|bot| {
                let caps = bot.message.captures(message)?;
                let user = caps.name(BRIDGE_USER_GROUP)?.as_str();
                let text = caps.name(BRIDGE_MESSAGE_GROUP)?.as_str();
                if user.is_empty() || text.is_empty() {
                    return None;
                }
                Some((user.to_string(), text.to_string()))
            })
    }
}

impl std::fmt::Debug for BridgeBots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBots")
            .field("count", &self.bots.len())
            .finish()
    }
}
