//! # Chaskis Framework
//!
//! Handler, dispatch and plugin layer of the Chaskis IRC bot framework.
//!
//! This layer provides:
//! - Handler types for messages, membership changes, protocol traffic and
//!   chaskis events, with scope, self and cooldown filtering
//! - Bridge-bot rewriting of relayed messages
//! - The ordered handler registry and the single-consumer dispatch queue,
//!   with per-invocation timeouts and cooperative cancellation
//! - The chaskis event bus and per-plugin event creators
//! - Compiled-in plugin descriptors and the plugin registry
//! - The built-in `chaskis` command plugin and the CTCP responders
//! - A scheduler for delayed and recurring jobs, run by the dispatch worker
//!
//! It owns no sockets; the runtime feeds the dispatch queue and supplies the
//! writer.

pub mod bridge;
pub mod bus;
pub mod context;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod plugin;
pub mod pool;
pub mod registry;
pub mod scheduler;

pub use bridge::{BRIDGE_MESSAGE_GROUP, BRIDGE_USER_GROUP, BridgeBots};
pub use bus::{EventBus, EventCreator};
pub use context::HandlerContext;
pub use cooldown::{Cooldown, CooldownScope};
pub use dispatch::{
    ABORT_GRACE_PERIOD, DEFAULT_HANDLER_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DispatchHandle,
    DispatchReceiver, DispatchWorker, Dispatcher, QueueItem, QueuedJob, dispatch_channel,
};
pub use error::{FrameworkError, FrameworkResult};
pub use handler::{
    AllHandler, BoxedHandler, ChaskisEventHandler, CtcpHandler, DispatchLine, HandlerAction,
    IrcHandler, JoinHandler, KickHandler, LineOrigin, MatchEnv, MessageHandler,
    MessageHandlerConfig, PartHandler, PingHandler, PongHandler, ReceiveHandler, ResponseOption,
    into_action,
};
pub use plugin::{
    BUILTIN_PLUGIN, BoxedPlugin, BuiltinPlugin, IrcPlugin, PluginCatalog, PluginDescriptor,
    PluginInitContext, PluginRegistry,
};
pub use pool::{DEFAULT_POOL_SIZE, WorkerPool};
pub use registry::{HandlerRegistry, RegisteredHandler};
pub use scheduler::{EventScheduler, ScheduleId, ScheduledAction};

/// Prelude for plugin authors.
pub mod prelude {
    pub use super::{
        BoxedHandler, ChaskisEventHandler, CooldownScope, EventBus, EventScheduler, FrameworkError,
        FrameworkResult, HandlerContext, IrcPlugin, JoinHandler, KickHandler, MessageHandler,
        MessageHandlerConfig, PartHandler, PluginDescriptor, PluginInitContext, ResponseOption,
        into_action,
    };
    pub use async_trait::async_trait;
}
