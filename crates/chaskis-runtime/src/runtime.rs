//! Runtime orchestration.
//!
//! ```rust,ignore
//! use chaskis_runtime::ChaskisRuntime;
//!
//! static PLUGINS: &[PluginDescriptor] = &[ECHO, GREETER];
//!
//! let runtime = ChaskisRuntime::builder()
//!     .config_file("chaskis.toml")
//!     .plugins(PLUGINS)
//!     .build()?;
//! runtime.run().await?;
//! ```
//!
//! Startup order: resolve and validate configuration, load the required
//! plugins (a missing one is fatal, before any network activity), start the
//! writer and the dispatch worker, register the built-in PING and CTCP
//! responders, the `chaskis` command plugin and then every plugin's handlers,
//! and finally start the connection engine.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chaskis_core::{BoxedWriter, IrcConfig};
use chaskis_framework::{
    ABORT_GRACE_PERIOD, BUILTIN_PLUGIN, BoxedHandler, BoxedPlugin, BridgeBots, BuiltinPlugin,
    CtcpHandler, DispatchWorker, Dispatcher, EventBus, EventScheduler, FrameworkError,
    HandlerRegistry, PingHandler, PluginCatalog, PluginDescriptor, PluginRegistry, WorkerPool,
    dispatch_channel,
};
use chaskis_transport::TransportConfig;

use crate::backoff::Backoff;
use crate::config::{ChaskisConfig, ConfigLoader, validate_config};
use crate::connection::IrcConnection;
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::session::SessionTracker;
use crate::watchdog::WatchdogConfig;
use crate::writer::spawn_writer;

/// Plugin name the built-in handlers are registered under.
pub const CORE_PLUGIN: &str = BUILTIN_PLUGIN;

/// Version reported by `version` and CTCP `VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The bot: configuration, compiled-in plugins and extra handlers.
pub struct ChaskisRuntime {
    config: ChaskisConfig,
    irc: Arc<IrcConfig>,
    plugins: PluginRegistry,
    handlers: HandlerRegistry,
    shutdown: CancellationToken,
}

impl ChaskisRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, resolves passwords and initializes logging.
    pub fn from_config(config: ChaskisConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        validate_config(&config)?;
        let irc = Arc::new(config.irc.resolve()?);

        info!(
            server = %irc.address(),
            nick = %irc.nick,
            channels = irc.channels.len(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            irc,
            plugins: PluginRegistry::default(),
            handlers: HandlerRegistry::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &ChaskisConfig {
        &self.config
    }

    /// The resolved session configuration.
    pub fn irc_config(&self) -> Arc<IrcConfig> {
        self.irc.clone()
    }

    /// Adds compiled-in plugins. `chaskis` is reserved for the built-in one.
    pub fn with_plugins(mut self, descriptors: &[PluginDescriptor]) -> RuntimeResult<Self> {
        for descriptor in descriptors {
            if descriptor.is_named(BUILTIN_PLUGIN) {
                return Err(FrameworkError::DuplicatePlugin(descriptor.name.to_string()).into());
            }
            self.plugins.add(*descriptor)?;
        }
        Ok(self)
    }

    /// Registers a handler outside any plugin. Runs after plugin handlers.
    pub fn register_handler(&mut self, handler: BoxedHandler) {
        self.handlers.register(CORE_PLUGIN, handler);
    }

    /// Cancelling this token stops the runtime gracefully.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until Ctrl+C, SIGTERM, or the shutdown token.
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(async {
            if let Err(e) = wait_for_signal().await {
                error!(error = %e, "Signal handling unavailable, stop with the shutdown token");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `signal` completes or the shutdown token fires.
    ///
    /// Also returns if the engine gives up reconnecting.
    pub async fn run_until<F>(self, signal: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut engine = self.start().await?;
        info!("Chaskis is running");

        let finished = tokio::select! {
            _ = signal => None,
            result = &mut engine.connection => Some(result),
        };
        engine.stop(finished).await
    }

    async fn start(self) -> RuntimeResult<Engine> {
        let Self {
            config,
            irc,
            plugins: registry,
            handlers: extra,
            shutdown,
        } = self;

        let loaded = registry.load(&config.plugins.enabled)?;
        let bridges = BridgeBots::compile(&irc.bridge_bots)?;

        let mut catalog = PluginCatalog::new(VERSION);
        for plugin in &loaded {
            let version = registry.get(plugin.name()).map(|d| d.version).unwrap_or_default();
            catalog.add(plugin.clone(), version);
        }
        let mut plugins: Vec<BoxedPlugin> = vec![Arc::new(BuiltinPlugin::new(catalog))];
        plugins.extend(loaded);

        let (queue, receiver) = dispatch_channel(config.engine.dispatch_queue_capacity);
        let session = Arc::new(SessionTracker::new(&irc));
        let writer = spawn_writer(
            irc.rate_limit,
            irc.clone(),
            queue.clone(),
            session.subscribe(),
            config.engine.send_events,
        );
        let boxed: BoxedWriter = Arc::new(writer.clone());
        let scheduler = EventScheduler::new(queue.clone());
        let bus = EventBus::new(queue.clone());

        let mut handlers = HandlerRegistry::new();
        handlers.register(CORE_PLUGIN, Arc::new(PingHandler::responder()));
        handlers.register(
            CORE_PLUGIN,
            Arc::new(CtcpHandler::version_responder(format!("chaskis {VERSION}"))),
        );
        handlers.register(CORE_PLUGIN, Arc::new(CtcpHandler::ping_responder()));
        if let Err(e) = PluginRegistry::initialize(
            &plugins,
            irc.clone(),
            boxed.clone(),
            &scheduler,
            &bus,
            &config.plugins.settings,
            &mut handlers,
        )
        .await
        {
            scheduler.shutdown();
            return Err(e.into());
        }
        for entry in extra.iter() {
            handlers.register(&entry.plugin, entry.handler.clone());
        }
        for (plugin, channels) in &config.plugins.blacklist {
            debug!(plugin = %plugin, channels = ?channels, "Blacklisting channels");
            handlers.blacklist(plugin, channels.iter().cloned());
        }
        info!(handlers = handlers.len(), plugins = plugins.len(), "Handlers registered");

        let dispatcher = Arc::new(
            Dispatcher::new(handlers, bridges)
                .with_timeout(config.engine.handler_timeout())
                .with_pool(WorkerPool::new(config.engine.worker_pool_size)),
        );
        let worker_stop = CancellationToken::new();
        let worker_cancel = CancellationToken::new();
        let worker = tokio::spawn(
            DispatchWorker::new(dispatcher.clone(), receiver, boxed, session.subscribe())
                .with_cancellation(worker_cancel.clone())
                .run(worker_stop.clone()),
        );

        let mut transport = TransportConfig::from(irc.as_ref())
            .with_connect_timeout(config.engine.connect_timeout());
        transport.accept_invalid_certs = config.irc.accept_invalid_certs;

        let connection = IrcConnection::new(irc, session, writer, queue)
            .with_transport(transport)
            .with_watchdog(WatchdogConfig::from(&config.engine))
            .with_backoff(Backoff::from_config(&config.engine));
        let connection = tokio::spawn(connection.run(shutdown.clone()));

        Ok(Engine {
            shutdown,
            connection,
            worker,
            worker_stop,
            worker_cancel,
            drain_timeout: config.engine.handler_timeout() + ABORT_GRACE_PERIOD,
            dispatcher,
            scheduler,
            plugins,
        })
    }
}

/// Tasks of a running bot.
struct Engine {
    shutdown: CancellationToken,
    connection: JoinHandle<RuntimeResult<()>>,
    worker: JoinHandle<u64>,
    worker_stop: CancellationToken,
    worker_cancel: CancellationToken,
    drain_timeout: Duration,
    dispatcher: Arc<Dispatcher>,
    scheduler: EventScheduler,
    plugins: Vec<BoxedPlugin>,
}

impl Engine {
    /// Quits, drains the dispatch queue and notifies plugins.
    async fn stop(
        mut self,
        finished: Option<Result<RuntimeResult<()>, JoinError>>,
    ) -> RuntimeResult<()> {
        info!("Shutting down");
        self.scheduler.shutdown();
        self.shutdown.cancel();

        let joined = match finished {
            Some(joined) => joined,
            None => (&mut self.connection).await,
        };
        let result = connection_outcome(joined);

        self.worker_stop.cancel();
        match tokio::time::timeout(self.drain_timeout, &mut self.worker).await {
            Ok(Ok(processed)) => debug!(processed, "Dispatch queue drained"),
            Ok(Err(e)) => error!(error = %e, "Dispatch worker failed"),
            Err(_) => {
                warn!(timeout = ?self.drain_timeout, "Dispatch queue not drained in time");
                self.worker_cancel.cancel();
                self.worker.abort();
            }
        }
        self.dispatcher.pool().shutdown();

        for plugin in &self.plugins {
            plugin.on_shutdown().await;
        }

        info!("Runtime stopped");
        result
    }
}

/// What the connection task's join result means for the run.
fn connection_outcome(joined: Result<RuntimeResult<()>, JoinError>) -> RuntimeResult<()> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Connection engine task failed");
            Err(RuntimeError::EngineTask(e))
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(|e| RuntimeError::Signal(e.to_string()))?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration and assembles a [`ChaskisRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    plugins: Vec<PluginDescriptor>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            plugins: Vec::new(),
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a programmatic configuration below files and environment.
    pub fn merge(mut self, config: ChaskisConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Compiled-in plugins.
    pub fn plugins(mut self, descriptors: &[PluginDescriptor]) -> Self {
        self.plugins.extend_from_slice(descriptors);
        self
    }

    pub fn build(self) -> RuntimeResult<ChaskisRuntime> {
        let config = self.config_loader.load()?;
        ChaskisRuntime::from_config(config)?.with_plugins(&self.plugins)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    fn config() -> ChaskisConfig {
        let mut config = ChaskisConfig::default();
        config.irc.server = "127.0.0.1".into();
        config.irc.channels = vec!["#room".into()];
        config
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.irc.channels.clear();
        assert!(matches!(
            ChaskisRuntime::from_config(config),
            Err(RuntimeError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[tokio::test]
    async fn missing_plugin_fails_before_connecting() {
        let mut config = config();
        // Nothing listens here; a connection attempt would hang or fail later.
        config.irc.port = 1;
        config.plugins.enabled = vec!["karma".into()];
        let runtime = ChaskisRuntime::from_config(config).unwrap();

        let result = runtime.run_until(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Framework(chaskis_framework::FrameworkError::MissingPlugin(name))) if name == "karma"
        ));
    }

    #[test]
    fn builtin_plugin_name_is_reserved() {
        static IMPOSTOR: PluginDescriptor = PluginDescriptor::new("Chaskis", "9.9.9", || {
            Arc::new(BuiltinPlugin::new(PluginCatalog::new("9.9.9")))
        });
        let runtime = ChaskisRuntime::from_config(config()).unwrap();
        assert!(matches!(
            runtime.with_plugins(&[IMPOSTOR]),
            Err(RuntimeError::Framework(FrameworkError::DuplicatePlugin(name))) if name == "Chaskis"
        ));
    }

    #[tokio::test]
    async fn failed_engine_task_is_reported() {
        let joined = tokio::spawn(async {
            if true {
                panic!("engine bug");
            }
            Ok(())
        })
        .await;
        assert!(matches!(
            connection_outcome(joined),
            Err(RuntimeError::EngineTask(e)) if e.is_panic()
        ));

        let task = tokio::spawn(std::future::pending::<RuntimeResult<()>>());
        task.abort();
        assert!(matches!(
            connection_outcome(task.await),
            Err(RuntimeError::EngineTask(e)) if e.is_cancelled()
        ));
        assert!(connection_outcome(Ok(Ok(()))).is_ok());
    }
}
