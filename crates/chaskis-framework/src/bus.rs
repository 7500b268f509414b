//! The chaskis event bus.
//!
//! Events never touch the network. Publishing encodes the event and injects
//! it into the dispatch queue as a local line, where the worker decodes it
//! and routes it to [`ChaskisEventHandler`]s like any other line.
//!
//! ```rust,ignore
//! // A plugin announcing something to everyone else.
//! let creator = bus.creator("weather");
//! let event = creator.broadcast().with_arg("event_id", "FORECAST").with_arg("city", "Lima");
//! bus.publish(&event).await?;
//!
//! // Another plugin listening for it.
//! let handler = EventBus::subscribe("logger", EventSource::Plugin, Some("weather"), action);
//! ```

use std::sync::Arc;

use chaskis_core::{ChaskisEvent, EventSource};

use crate::dispatch::DispatchHandle;
use crate::error::FrameworkResult;
use crate::handler::{BoxedHandler, ChaskisEventHandler, HandlerAction};

/// Publishes chaskis events into the dispatch queue.
#[derive(Clone, Debug)]
pub struct EventBus {
    queue: DispatchHandle,
}

impl EventBus {
    /// Creates a bus over the dispatch queue.
    pub fn new(queue: DispatchHandle) -> Self {
        Self { queue }
    }

    /// Publishes `event`, waiting for queue room.
    pub async fn publish(&self, event: &ChaskisEvent) -> FrameworkResult<u64> {
        self.queue.push_event(event).await
    }

    /// Publishes `event` without waiting.
    pub fn try_publish(&self, event: &ChaskisEvent) -> FrameworkResult<u64> {
        self.queue.try_push_event(event)
    }

    /// Hands `plugin` a creator stamped with its own name.
    pub fn creator(&self, plugin: &str) -> EventCreator {
        EventCreator::new(plugin)
    }

    /// Builds a subscription handler for `plugin`.
    ///
    /// Core subscriptions always expect the IRC protocol tag as source, so
    /// `from` is ignored for them.
    pub fn subscribe(
        plugin: &str,
        source_type: EventSource,
        from: Option<&str>,
        action: HandlerAction,
    ) -> BoxedHandler {
        match source_type {
            EventSource::Core => Arc::new(ChaskisEventHandler::core(plugin, action)),
            EventSource::Plugin => Arc::new(ChaskisEventHandler::plugin(plugin, from, action)),
        }
    }
}

/// Builds plugin events with a fixed source name.
#[derive(Clone, Debug)]
pub struct EventCreator {
    plugin: String,
}

impl EventCreator {
    /// Creates a creator for `plugin`.
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_uppercase(),
        }
    }

    /// The stamped source name.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// An event for every subscriber.
    pub fn broadcast(&self) -> ChaskisEvent {
        ChaskisEvent::new(EventSource::Plugin, &self.plugin, None)
    }

    /// An event for `dest` only.
    pub fn targeted(&self, dest: &str) -> ChaskisEvent {
        ChaskisEvent::new(EventSource::Plugin, &self.plugin, Some(dest))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    use chaskis_core::SessionSnapshot;

    use super::*;
    use crate::bridge::BridgeBots;
    use crate::dispatch::{DispatchWorker, Dispatcher, dispatch_channel};
    use crate::handler::into_action;
    use crate::handler::testing::{RecordingWriter, config};
    use crate::registry::HandlerRegistry;

    #[test]
    fn creator_stamps_source() {
        let creator = EventCreator::new("weather");
        let event = creator.targeted("logger");
        assert_eq!(event.source_type(), EventSource::Plugin);
        assert_eq!(event.source_plugin(), "WEATHER");
        assert_eq!(event.dest_plugin(), Some("LOGGER"));
        assert!(creator.broadcast().is_broadcast());
    }

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let action = into_action(move |ctx| {
            let counter = counter.clone();
            async move {
                let event = ctx.event.expect("event");
                assert_eq!(event.args.get("city"), Some("Lima"));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let mut registry = HandlerRegistry::new();
        registry.register(
            "logger",
            EventBus::subscribe("logger", EventSource::Plugin, Some("weather"), action.clone()),
        );
        registry.register(
            "other",
            EventBus::subscribe("other", EventSource::Plugin, None, action),
        );

        let (handle, rx) = dispatch_channel(8);
        let bus = EventBus::new(handle.clone());
        let creator = bus.creator("weather");

        bus.publish(&creator.broadcast().with_arg("city", "Lima"))
            .await
            .unwrap();
        bus.try_publish(&creator.targeted("logger").with_arg("city", "Lima"))
            .unwrap();
        bus.publish(&EventCreator::new("spoof").targeted("logger").with_arg("city", "Lima"))
            .await
            .unwrap();
        drop((bus, handle));

        let (_tx, session) = watch::channel(SessionSnapshot::default());
        let dispatcher = Arc::new(Dispatcher::new(registry, BridgeBots::default()));
        DispatchWorker::new(dispatcher, rx, RecordingWriter::new(config()), session)
            .run(CancellationToken::new())
            .await;

        // logger: broadcast + targeted; other: broadcast only.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
