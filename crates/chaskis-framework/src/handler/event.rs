//! Chaskis event subscriptions.

use chaskis_core::{CORE_PROTOCOL, EventSource, HandlerError, IrcResponse};

use super::{DispatchLine, HandlerAction, IrcHandler, LineOrigin, MatchEnv};

/// Fires on chaskis events routed to a plugin.
///
/// An event is delivered when it is broadcast or addressed to the owning
/// plugin, its source type matches the subscription, and, if the
/// subscription names a source, the event came from it. Core subscriptions
/// only see events tagged with the IRC protocol.
///
/// The response carries the source plugin as `remote_user` and the raw
/// event line as `message`; the decoded event is on the context.
pub struct ChaskisEventHandler {
    name: String,
    plugin: String,
    source_type: EventSource,
    expected_source: Option<String>,
    action: HandlerAction,
}

impl ChaskisEventHandler {
    /// Subscribes `plugin` to core events.
    pub fn core(plugin: &str, action: HandlerAction) -> Self {
        Self {
            name: format!("{}:core-events", plugin.to_lowercase()),
            plugin: plugin.to_uppercase(),
            source_type: EventSource::Core,
            expected_source: Some(CORE_PROTOCOL.to_string()),
            action,
        }
    }

    /// Subscribes `plugin` to plugin events, optionally only from `source`.
    pub fn plugin(plugin: &str, source: Option<&str>, action: HandlerAction) -> Self {
        Self {
            name: format!("{}:plugin-events", plugin.to_lowercase()),
            plugin: plugin.to_uppercase(),
            source_type: EventSource::Plugin,
            expected_source: source.map(str::to_uppercase),
            action,
        }
    }

    /// Sets the log name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The subscribing plugin, upper-cased.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }
}

impl IrcHandler for ChaskisEventHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_match(
        &self,
        line: &DispatchLine,
        _env: &MatchEnv<'_>,
    ) -> Result<Option<IrcResponse>, HandlerError> {
        if line.origin != LineOrigin::Local {
            return Ok(None);
        }
        let Some(event) = line.event.as_ref() else {
            return Ok(None);
        };
        if event.source_type() != self.source_type || !event.is_addressed_to(&self.plugin) {
            return Ok(None);
        }
        if let Some(source) = &self.expected_source {
            if !event.source_plugin().eq_ignore_ascii_case(source) {
                return Ok(None);
            }
        }
        Ok(Some(IrcResponse::new(
            event.source_plugin(),
            "",
            line.raw.clone(),
            line.raw.clone(),
        )))
    }

    fn action(&self) -> HandlerAction {
        self.action.clone()
    }
}
