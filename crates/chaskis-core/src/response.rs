//! Typed views of received protocol lines.
//!
//! [`IrcLine`] is the envelope parser: it splits a raw line into prefix,
//! command and parameters. Handlers use it to decide which line shapes they
//! care about and then build an [`IrcResponse`] for the plugin callback.

use std::collections::HashMap;
use std::fmt;

// =============================================================================
// IrcPrefix
// =============================================================================

/// The origin of a line: `nick!user@host`, `nick@host` or a bare server/nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcPrefix {
    /// Nick name (or server name for server-originated lines).
    pub nick: String,
    /// User name, if present.
    pub user: Option<String>,
    /// Host, if present.
    pub host: Option<String>,
}

impl IrcPrefix {
    /// Parses a prefix without its leading `:`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let (rest, host) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_string())),
            None => (rest, None),
        };

        if nick.is_empty() {
            return None;
        }

        Some(Self {
            nick: nick.to_string(),
            user,
            host,
        })
    }
}

impl fmt::Display for IrcPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

// =============================================================================
// IrcLine
// =============================================================================

/// A received line split into its protocol envelope.
///
/// The trailing parameter (after ` :`) is stored as the last element of
/// `params`. IRCv3 message tags are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    /// Origin of the line, if any.
    pub prefix: Option<IrcPrefix>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    /// Middle parameters followed by the trailing parameter.
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parses a raw line. Returns `None` for lines without a command.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start();

        if rest.starts_with('@') {
            rest = rest.split_once(' ')?.1.trim_start();
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, tail) = stripped.split_once(' ')?;
            rest = tail.trim_start();
            Some(IrcPrefix::parse(prefix)?)
        } else {
            None
        };

        let (command, mut tail) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            tail = tail.trim_start_matches(' ');
            if tail.is_empty() {
                break;
            }
            if let Some(trailing) = tail.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match tail.split_once(' ') {
                Some((param, next)) => {
                    params.push(param.to_string());
                    tail = next;
                }
                None => {
                    params.push(tail.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Returns the nick from the prefix, if any.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.nick.as_str())
    }

    /// Returns the parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Returns the last parameter, which is the trailing text when present.
    pub fn last_param(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Returns `true` for three-digit numeric replies.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }
}

// =============================================================================
// MatchGroups
// =============================================================================

/// Capture groups of a handler pattern, by position and by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchGroups {
    positional: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl MatchGroups {
    /// Creates groups from positional captures and named captures.
    pub fn new(positional: Vec<Option<String>>, named: HashMap<String, String>) -> Self {
        Self { positional, named }
    }

    /// Returns the capture at `index` (0 is the whole match).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional.get(index).and_then(|g| g.as_deref())
    }

    /// Returns the named capture `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Inserts or replaces a named value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.named.insert(name.into(), value.into());
    }

    /// Number of positional groups.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Returns `true` if there are no groups at all.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

// =============================================================================
// IrcResponse
// =============================================================================

/// The parsed view handed to a handler action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcResponse {
    /// Who sent the line (nick, or bridged user).
    pub remote_user: String,
    /// Channel, or for private messages the nick replies should go to.
    pub channel: String,
    /// Message text (PRIVMSG text, PART/KICK reason, PING/PONG payload, or the raw line).
    pub message: String,
    /// Pattern captures and handler-specific named values.
    pub groups: MatchGroups,
    /// The raw line as received.
    pub raw: String,
}

impl IrcResponse {
    /// Creates a response with no groups.
    pub fn new(
        remote_user: impl Into<String>,
        channel: impl Into<String>,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            remote_user: remote_user.into(),
            channel: channel.into(),
            message: message.into(),
            groups: MatchGroups::default(),
            raw: raw.into(),
        }
    }

    /// Attaches capture groups (builder style).
    pub fn with_groups(mut self, groups: MatchGroups) -> Self {
        self.groups = groups;
        self
    }
}
