//! Chaskis events and their single-line XML wire format.
//!
//! Chaskis events are how the core tells plugins about local state
//! transitions (connected, disconnected, watchdog failures) and how plugins
//! talk to each other. They never travel over the IRC connection; they are
//! encoded, injected into the dispatch queue, and decoded independently by
//! every subscriber.
//!
//! ```text
//! <chaskis_event source_type="CORE" source_plugin="IRC" dest_plugin="">
//!   <args><event_id>CONNECTED</event_id><server>irc.example.net</server></args>
//!   <passthrough_args/>
//! </chaskis_event>
//! ```
//!
//! (shown wrapped; the encoder always produces a single line)
//!
//! # Example
//!
//! ```rust,ignore
//! use chaskis_core::event::{ChaskisEvent, core_events};
//!
//! let event = ChaskisEvent::core(core_events::CONNECTED).with_arg("server", "irc.example.net");
//! let line = event.to_xml()?;
//! assert_eq!(ChaskisEvent::from_xml(&line)?, event);
//! ```

use std::fmt;
use std::mem;
use std::str::FromStr;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{EventError, EventResult};
use crate::format::redact;
use crate::response::IrcLine;

/// Root element of every encoded event.
pub const ROOT_ELEMENT: &str = "chaskis_event";

/// Protocol tag carried as the source plugin of core events.
pub const CORE_PROTOCOL: &str = "IRC";

/// Conventional argument naming the semantic event.
pub const EVENT_ID_KEY: &str = "event_id";

/// Event ids emitted by the connection engine.
pub mod core_events {
    /// The transport is up and the registration sequence has been sent.
    pub const CONNECTED: &str = "CONNECTED";
    /// Every configured channel has been sent a JOIN.
    pub const FINISHED_JOINING_CHANNELS: &str = "FINISHED JOINING CHANNELS";
    /// The connection is about to be torn down.
    pub const DISCONNECTING: &str = "DISCONNECTING";
    /// The connection has been torn down.
    pub const DISCONNECTED: &str = "DISCONNECTED";
    /// The watchdog did not observe traffic within its timeout.
    pub const WATCHDOG_FAILED: &str = "WATCHDOG FAILED";
    /// A reconnect is scheduled after a backoff delay.
    pub const ATTEMPTING_RECONNECT: &str = "ATTEMPTING RECONNECT";
    /// The bot sent a `JOIN`.
    pub const SEND_JOIN: &str = "SEND JOIN";
    /// The bot sent a `PART`.
    pub const SEND_PART: &str = "SEND PART";
    /// The bot sent a `KICK`.
    pub const SEND_KICK: &str = "SEND KICK";
    /// The bot sent a `PRIVMSG`.
    pub const SEND_MESSAGE: &str = "SEND MESSAGE";
    /// The bot sent any other line.
    pub const SEND: &str = "SEND";

    /// Returns `true` for the events that echo the bot's own output.
    pub fn is_send_event(event_id: &str) -> bool {
        event_id == SEND || event_id.starts_with("SEND ")
    }
}

// =============================================================================
// EventSource
// =============================================================================

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// The connection engine.
    Core,
    /// A plugin.
    Plugin,
}

impl EventSource {
    /// Returns the wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "CORE",
            Self::Plugin => "PLUGIN",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("CORE") {
            Ok(Self::Core)
        } else if s.eq_ignore_ascii_case("PLUGIN") {
            Ok(Self::Plugin)
        } else {
            Err(EventError::InvalidSourceType(s.to_string()))
        }
    }
}

// =============================================================================
// EventArgs
// =============================================================================

/// An insertion-ordered string map with unique keys.
///
/// Re-inserting an existing key replaces its value in place, so the original
/// position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventArgs {
    entries: Vec<(String, String)>,
}

impl EventArgs {
    /// Creates an empty argument map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, returning the previous value if the key existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EventArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

// =============================================================================
// ChaskisEvent
// =============================================================================

/// A decoded chaskis event.
///
/// Plugin and destination names are stored upper-cased. A destination of
/// `None` means the event is broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaskisEvent {
    source_type: EventSource,
    source_plugin: String,
    dest_plugin: Option<String>,
    /// Ordered event arguments; `event_id` is conventionally first.
    pub args: EventArgs,
    /// Opaque arguments forwarded unchanged to whoever answers the event.
    pub passthrough_args: EventArgs,
}

impl ChaskisEvent {
    /// Creates an event with empty argument maps.
    ///
    /// Plugins should prefer the creator handed out by the event bus, which
    /// stamps the plugin's own name as the source.
    pub fn new(source_type: EventSource, source_plugin: &str, dest_plugin: Option<&str>) -> Self {
        Self {
            source_type,
            source_plugin: source_plugin.to_uppercase(),
            dest_plugin: dest_plugin.and_then(normalize_destination),
            args: EventArgs::new(),
            passthrough_args: EventArgs::new(),
        }
    }

    /// Creates a broadcast core event carrying the given `event_id`.
    pub fn core(event_id: &str) -> Self {
        Self::new(EventSource::Core, CORE_PROTOCOL, None).with_arg(EVENT_ID_KEY, event_id)
    }

    /// Describes a line the bot just wrote, as one of the `SEND` core events.
    ///
    /// Returns `None` for lines carrying credentials. Control characters are
    /// written as `[hex]` so the event stays valid XML.
    pub fn sent(line: &str) -> Option<Self> {
        if redact(line) != line {
            return None;
        }
        let Some(irc) = IrcLine::parse(line) else {
            return Some(Self::core(core_events::SEND).with_arg("command", escape_controls(line)));
        };
        let param = |n: usize| escape_controls(irc.param(n).unwrap_or_default());

        let event = match irc.command.as_str() {
            "JOIN" => Self::core(core_events::SEND_JOIN).with_arg("channel", param(0)),
            "PART" => Self::core(core_events::SEND_PART)
                .with_arg("channel", param(0))
                .with_arg("reason", param(1)),
            "KICK" => Self::core(core_events::SEND_KICK)
                .with_arg("channel", param(0))
                .with_arg("user", param(1))
                .with_arg("reason", param(2)),
            "PRIVMSG" if !irc.param(1).is_some_and(|m| m.starts_with('\u{1}')) => {
                Self::core(core_events::SEND_MESSAGE)
                    .with_arg("channel", param(0))
                    .with_arg("message", param(1))
            }
            _ => Self::core(core_events::SEND).with_arg("command", escape_controls(line)),
        };
        Some(event)
    }

    /// Adds an argument (builder style).
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Adds a passthrough argument (builder style).
    pub fn with_passthrough(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.passthrough_args.insert(key, value);
        self
    }

    /// Returns who produced the event.
    pub fn source_type(&self) -> EventSource {
        self.source_type
    }

    /// Returns the producing plugin, or the protocol tag for core events.
    pub fn source_plugin(&self) -> &str {
        &self.source_plugin
    }

    /// Returns the destination plugin, or `None` for a broadcast.
    pub fn dest_plugin(&self) -> Option<&str> {
        self.dest_plugin.as_deref()
    }

    /// Returns `true` if the event has no specific destination.
    pub fn is_broadcast(&self) -> bool {
        self.dest_plugin.is_none()
    }

    /// Returns the `event_id` argument, if present.
    pub fn event_id(&self) -> Option<&str> {
        self.args.get(EVENT_ID_KEY)
    }

    /// Returns `true` if this event should be delivered to `plugin`.
    pub fn is_addressed_to(&self, plugin: &str) -> bool {
        match &self.dest_plugin {
            None => true,
            Some(dest) => dest.eq_ignore_ascii_case(plugin),
        }
    }

    /// Returns `true` if a received line looks like an encoded event.
    pub fn is_event_line(line: &str) -> bool {
        line.trim_start().starts_with("<chaskis_event")
    }

    // ─── Encoding ───────────────────────────────────────────────────────────

    /// Encodes the event as a single line of XML.
    pub fn to_xml(&self) -> EventResult<String> {
        let mut writer = Writer::new(Vec::new());

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute(("source_type", self.source_type.as_str()));
        root.push_attribute(("source_plugin", self.source_plugin.as_str()));
        root.push_attribute(("dest_plugin", self.dest_plugin.as_deref().unwrap_or("")));
        writer
            .write_event(Event::Start(root))
            .map_err(EventError::malformed)?;

        write_section(&mut writer, "args", &self.args)?;
        write_section(&mut writer, "passthrough_args", &self.passthrough_args)?;

        writer
            .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
            .map_err(EventError::malformed)?;

        String::from_utf8(writer.into_inner()).map_err(EventError::malformed)
    }

    // ─── Decoding ───────────────────────────────────────────────────────────

    /// Decodes an event from its XML form.
    pub fn from_xml(xml: &str) -> EventResult<Self> {
        let mut reader = Reader::from_str(xml.trim());

        let mut event: Option<Self> = None;
        let mut section: Option<Section> = None;
        let mut key: Option<String> = None;
        let mut value = String::new();
        let mut closed = false;

        loop {
            let depth = match (&event, &section, &key) {
                (None, _, _) => Depth::Document,
                (Some(_), None, _) => Depth::Root,
                (Some(_), Some(_), None) => Depth::Section,
                (Some(_), Some(_), Some(_)) => Depth::Argument,
            };

            match reader.read_event().map_err(EventError::malformed)? {
                Event::Start(start) => {
                    let name = element_name(&start)?;
                    match depth {
                        Depth::Document => event = Some(parse_root(&start, &name)?),
                        Depth::Root => section = Some(Section::parse(&name)?),
                        Depth::Section => {
                            key = Some(name);
                            value.clear();
                        }
                        Depth::Argument => return Err(nested(&name)),
                    }
                }
                Event::Empty(start) => {
                    let name = element_name(&start)?;
                    match depth {
                        Depth::Document => {
                            event = Some(parse_root(&start, &name)?);
                            closed = true;
                        }
                        Depth::Root => {
                            Section::parse(&name)?;
                        }
                        Depth::Section => {
                            if let (Some(ev), Some(s)) = (event.as_mut(), section) {
                                s.target(ev).insert(name, "");
                            }
                        }
                        Depth::Argument => return Err(nested(&name)),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(EventError::malformed)?;
                    if depth == Depth::Argument {
                        value.push_str(&text);
                    } else if !text.trim().is_empty() {
                        return Err(EventError::Malformed(format!(
                            "unexpected text '{}'",
                            text.trim()
                        )));
                    }
                }
                Event::CData(data) => {
                    if depth == Depth::Argument {
                        value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => match depth {
                    Depth::Argument => {
                        if let (Some(ev), Some(s), Some(k)) = (event.as_mut(), section, key.take()) {
                            s.target(ev).insert(k, mem::take(&mut value));
                        }
                    }
                    Depth::Section => section = None,
                    Depth::Root => closed = true,
                    Depth::Document => return Err(EventError::malformed("unbalanced end tag")),
                },
                Event::Eof => break,
                _ => {}
            }
        }

        match event {
            Some(event) if closed => Ok(event),
            Some(_) => Err(EventError::malformed("unterminated chaskis_event element")),
            None => Err(EventError::malformed("empty payload")),
        }
    }
}

impl FromStr for ChaskisEvent {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_xml(s)
    }
}

// =============================================================================
// Codec helpers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Document,
    Root,
    Section,
    Argument,
}

fn nested(name: &str) -> EventError {
    EventError::Malformed(format!("element '{name}' nested inside an argument"))
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Args,
    Passthrough,
}

impl Section {
    fn parse(name: &str) -> EventResult<Self> {
        match name {
            "args" => Ok(Self::Args),
            "passthrough_args" => Ok(Self::Passthrough),
            other => Err(EventError::Malformed(format!(
                "unexpected element '{other}'"
            ))),
        }
    }

    fn target<'a>(&self, event: &'a mut ChaskisEvent) -> &'a mut EventArgs {
        match self {
            Self::Args => &mut event.args,
            Self::Passthrough => &mut event.passthrough_args,
        }
    }
}

/// Broadcast is spelled as an empty destination on the wire; `*` and the
/// legacy `BCAST` are accepted on decode.
fn escape_controls(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() || c == '[' || c == ']' {
                format!("[{:X}]", c as u32)
            } else {
                c.to_string()
            }
        })
        .collect()
}

fn normalize_destination(dest: &str) -> Option<String> {
    let dest = dest.trim();
    if dest.is_empty() || dest == "*" || dest.eq_ignore_ascii_case("BCAST") {
        None
    } else {
        Some(dest.to_uppercase())
    }
}

fn element_name(start: &BytesStart<'_>) -> EventResult<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_owned)
        .map_err(EventError::malformed)
}

fn parse_root(start: &BytesStart<'_>, name: &str) -> EventResult<ChaskisEvent> {
    if name != ROOT_ELEMENT {
        return Err(EventError::UnexpectedRoot(name.to_string()));
    }

    let mut source_type = None;
    let mut source_plugin = None;
    let mut dest_plugin = None;

    for attr in start.attributes() {
        let attr = attr.map_err(EventError::malformed)?;
        let value = attr.unescape_value().map_err(EventError::malformed)?;
        match attr.key.as_ref() {
            b"source_type" => source_type = Some(value.parse::<EventSource>()?),
            b"source_plugin" => source_plugin = Some(value.into_owned()),
            b"dest_plugin" => dest_plugin = Some(value.into_owned()),
            _ => {}
        }
    }

    let source_type = source_type.ok_or(EventError::MissingAttribute("source_type"))?;
    let source_plugin = source_plugin.ok_or(EventError::MissingAttribute("source_plugin"))?;

    Ok(ChaskisEvent::new(
        source_type,
        &source_plugin,
        dest_plugin.as_deref(),
    ))
}

fn write_section(writer: &mut Writer<Vec<u8>>, name: &str, args: &EventArgs) -> EventResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(EventError::malformed)?;

    for (key, value) in args.iter() {
        if !is_valid_key(key) {
            return Err(EventError::InvalidKey(key.to_string()));
        }
        // Line breaks are written as character references so the event stays on one line.
        let escaped = quick_xml::escape::escape(value)
            .replace('\r', "&#13;")
            .replace('\n', "&#10;");

        writer
            .write_event(Event::Start(BytesStart::new(key)))
            .map_err(EventError::malformed)?;
        writer
            .write_event(Event::Text(BytesText::from_escaped(escaped)))
            .map_err(EventError::malformed)?;
        writer
            .write_event(Event::End(BytesEnd::new(key)))
            .map_err(EventError::malformed)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(EventError::malformed)?;
    Ok(())
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !key.to_ascii_lowercase().starts_with("xml")
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChaskisEvent {
        ChaskisEvent::new(EventSource::Plugin, "karmabot", Some("quotebot"))
            .with_arg(EVENT_ID_KEY, "QUERY")
            .with_arg("zeta", "last letter")
            .with_arg("alpha", "first letter")
            .with_passthrough("reply_to", "#chaskis")
    }

    #[test]
    fn round_trips_with_order_preserved() {
        let event = sample();
        let decoded = ChaskisEvent::from_xml(&event.to_xml().unwrap()).unwrap();

        assert_eq!(decoded, event);
        let keys: Vec<_> = decoded.args.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["event_id", "zeta", "alpha"]);
    }

    #[test]
    fn round_trips_empty_maps() {
        let event = ChaskisEvent::new(EventSource::Core, "irc", None);
        let xml = event.to_xml().unwrap();
        let decoded: ChaskisEvent = xml.parse().unwrap();

        assert_eq!(decoded, event);
        assert!(decoded.args.is_empty());
        assert!(decoded.passthrough_args.is_empty());
    }

    #[test]
    fn encodes_wire_format() {
        let xml = ChaskisEvent::core(core_events::CONNECTED).to_xml().unwrap();
        assert_eq!(
            xml,
            "<chaskis_event source_type=\"CORE\" source_plugin=\"IRC\" dest_plugin=\"\">\
             <args><event_id>CONNECTED</event_id></args><passthrough_args></passthrough_args>\
             </chaskis_event>"
        );
    }

    #[test]
    fn escapes_markup_and_line_breaks() {
        let event = ChaskisEvent::core("NOTE").with_arg("text", "a < b && c > d\r\nsecond \"line\"");
        let xml = event.to_xml().unwrap();

        assert!(!xml.contains('\n'));
        assert!(!xml.contains('\r'));
        assert_eq!(ChaskisEvent::from_xml(&xml).unwrap(), event);
    }

    #[test]
    fn names_are_upper_cased() {
        let event = ChaskisEvent::new(EventSource::Plugin, "weatherbot", Some("cowsaybot"));
        assert_eq!(event.source_plugin(), "WEATHERBOT");
        assert_eq!(event.dest_plugin(), Some("COWSAYBOT"));
        assert!(event.is_addressed_to("CowSayBot"));
        assert!(!event.is_addressed_to("karmabot"));
    }

    #[test]
    fn accepts_broadcast_spellings() {
        for dest in ["", "*", "BCAST", "bcast"] {
            let xml = format!(
                "<chaskis_event source_type=\"PLUGIN\" source_plugin=\"A\" dest_plugin=\"{dest}\">\
                 <args/><passthrough_args/></chaskis_event>"
            );
            let event = ChaskisEvent::from_xml(&xml).unwrap();
            assert!(event.is_broadcast(), "'{dest}' should mean broadcast");
        }
    }

    #[test]
    fn decodes_pretty_printed_input() {
        let xml = r#"
            <chaskis_event source_type="PLUGIN" source_plugin="a" dest_plugin="b">
                <args>
                    <event_id>PING</event_id>
                    <empty/>
                </args>
                <passthrough_args />
            </chaskis_event>
        "#;
        let event = ChaskisEvent::from_xml(xml).unwrap();

        assert_eq!(event.event_id(), Some("PING"));
        assert_eq!(event.args.get("empty"), Some(""));
        assert_eq!(event.dest_plugin(), Some("B"));
    }

    #[test]
    fn rejects_wrong_root() {
        let err = ChaskisEvent::from_xml("<other_event/>").unwrap_err();
        assert_eq!(err, EventError::UnexpectedRoot("other_event".into()));
    }

    #[test]
    fn rejects_bad_source_type() {
        let xml = "<chaskis_event source_type=\"SERVER\" source_plugin=\"A\"><args/></chaskis_event>";
        assert!(matches!(
            ChaskisEvent::from_xml(xml),
            Err(EventError::InvalidSourceType(_))
        ));
    }

    #[test]
    fn rejects_missing_source_plugin() {
        let xml = "<chaskis_event source_type=\"CORE\"><args/></chaskis_event>";
        assert_eq!(
            ChaskisEvent::from_xml(xml).unwrap_err(),
            EventError::MissingAttribute("source_plugin")
        );
    }

    #[test]
    fn rejects_invalid_keys_on_encode() {
        let event = ChaskisEvent::core("X").with_arg("two words", "v");
        assert_eq!(
            event.to_xml().unwrap_err(),
            EventError::InvalidKey("two words".into())
        );
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut args: EventArgs = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(args.insert("a", "3"), Some("1".to_string()));

        let entries: Vec<_> = args.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn detects_event_lines() {
        assert!(ChaskisEvent::is_event_line("<chaskis_event source_type=\"CORE\">"));
        assert!(!ChaskisEvent::is_event_line(":alice!a@h PRIVMSG #c :<chaskis_event"));
    }

    #[test]
    fn sent_lines_become_send_events() {
        let join = ChaskisEvent::sent("JOIN #room").unwrap();
        assert_eq!(join.event_id(), Some(core_events::SEND_JOIN));
        assert_eq!(join.args.get("channel"), Some("#room"));

        let kick = ChaskisEvent::sent("KICK #room eve :spam").unwrap();
        assert_eq!(kick.event_id(), Some(core_events::SEND_KICK));
        assert_eq!(kick.args.get("user"), Some("eve"));
        assert_eq!(kick.args.get("reason"), Some("spam"));

        let part = ChaskisEvent::sent("PART #room :bye").unwrap();
        assert_eq!(part.args.get("reason"), Some("bye"));

        let message = ChaskisEvent::sent("PRIVMSG #room :hello").unwrap();
        assert_eq!(message.event_id(), Some(core_events::SEND_MESSAGE));
        assert_eq!(message.args.get("message"), Some("hello"));

        let pong = ChaskisEvent::sent("PONG :irc.test").unwrap();
        assert_eq!(pong.event_id(), Some(core_events::SEND));
        assert_eq!(pong.args.get("command"), Some("PONG :irc.test"));
        assert!(pong.source_type() == EventSource::Core);
    }

    #[test]
    fn credentials_are_never_echoed() {
        assert!(ChaskisEvent::sent("PASS hunter2").is_none());
        assert!(ChaskisEvent::sent("PRIVMSG NickServ :IDENTIFY hunter2").is_none());
    }

    #[test]
    fn ctcp_output_is_escaped() {
        let event = ChaskisEvent::sent("NOTICE alice :\u{1}VERSION chaskis\u{1}").unwrap();
        assert_eq!(event.event_id(), Some(core_events::SEND));
        assert_eq!(event.args.get("command"), Some("NOTICE alice :[1]VERSION chaskis[1]"));

        let decoded = ChaskisEvent::from_xml(&event.to_xml().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn send_event_ids_are_recognized() {
        assert!(core_events::is_send_event(core_events::SEND));
        assert!(core_events::is_send_event(core_events::SEND_JOIN));
        assert!(!core_events::is_send_event(core_events::CONNECTED));
    }
}
