//! The dispatch queue.
//!
//! Every received line, and every locally published chaskis event, is pushed
//! onto one FIFO queue consumed by a single worker. For each line the worker
//! walks the handler list in registration order and runs each matching action
//! to completion (or timeout) before touching the next handler, so side
//! effects are totally ordered across lines.
//!
//! ```text
//!   reader ──push_line──┐
//!                       ▼
//!   writer loopback ──▶ queue ──▶ DispatchWorker ──▶ Dispatcher
//!                                                    │ handler 1 ─ timeout ─┐
//!                                                    │ handler 2 ─ timeout ─┤
//!                                                    ▼                      ▼
//!                                                 next line         cancel + abort
//! ```
//!
//! An action that exceeds the timeout has its cancellation token fired and
//! dispatch moves on. The task is aborted if it still has not stopped after a
//! short grace period.
//!
//! Scheduled jobs are queued on the same channel and run by the same worker
//! under the same timeout, so they never overlap a handler.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, error, info, span, warn};

use chaskis_core::format::redact;
use chaskis_core::{
    BoxedWriter, ChaskisEvent, HandlerError, HandlerResult, IrcConfig, IrcResponse,
    SessionSnapshot,
};

use crate::bridge::BridgeBots;
use crate::context::HandlerContext;
use crate::error::{FrameworkError, FrameworkResult};
use crate::handler::{DispatchLine, LineOrigin, MatchEnv};
use crate::pool::WorkerPool;
use crate::registry::{HandlerRegistry, RegisteredHandler};
use crate::scheduler::{ScheduleId, ScheduledAction};

/// Default per-invocation timeout.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a timed-out action may take to notice cancellation before it is aborted.
pub const ABORT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// Dispatcher
// ============================================================================

/// Matches lines against the registered handlers and runs their actions.
pub struct Dispatcher {
    handlers: Vec<RegisteredHandler>,
    bridges: BridgeBots,
    timeout: Duration,
    pool: WorkerPool,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: HandlerRegistry, bridges: BridgeBots) -> Self {
        Self {
            handlers: registry.into_handlers(),
            bridges,
            timeout: DEFAULT_HANDLER_TIMEOUT,
            pool: WorkerPool::default(),
        }
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the background pool handed to actions.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// The per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The background pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatches one line and returns how many handlers fired.
    ///
    /// Invocation tokens are children of `cancel`, so cancelling it stops
    /// every running action.
    pub async fn dispatch(
        &self,
        line: &DispatchLine,
        writer: &BoxedWriter,
        config: &IrcConfig,
        session: &SessionSnapshot,
        cancel: &CancellationToken,
    ) -> usize {
        let span = span!(Level::DEBUG, "dispatch", seq = line.seq);
        async {
            let mut fired = 0;
            let channel = line.channel();
            for entry in &self.handlers {
                if let Some(channel) = channel
                    && entry.is_blacklisted(channel)
                {
                    continue;
                }
                let env = MatchEnv {
                    config,
                    session,
                    bridges: &self.bridges,
                    now: Instant::now(),
                };
                match entry.handler.try_match(line, &env) {
                    Ok(None) => {}
                    Ok(Some(response)) => {
                        fired += 1;
                        self.invoke(entry, line, response, writer, cancel).await;
                    }
                    Err(e) => {
                        error!(
                            plugin = %entry.plugin,
                            handler = %entry.handler.name(),
                            line = %redact(&line.raw),
                            error = %e,
                            "Handler failed to match line"
                        );
                    }
                }
            }
            fired
        }
        .instrument(span)
        .await
    }

    /// Runs a scheduled job under the invocation timeout.
    ///
    /// Jobs stopped while they were queued are skipped.
    pub async fn run_job(&self, job: QueuedJob, writer: &BoxedWriter, cancel: &CancellationToken) {
        if job.stopped.is_cancelled() {
            debug!(id = job.id, "Scheduled event stopped before it ran");
            return;
        }
        let span = span!(Level::DEBUG, "scheduled", id = job.id);
        let outcome = self
            .supervise(
                &format!("scheduled:{}", job.id),
                (job.action)(writer.clone()),
                cancel.child_token(),
            )
            .instrument(span)
            .await;

        match outcome {
            Ok(()) => debug!(id = job.id, "Scheduled event completed"),
            Err(HandlerError::Cancelled) if cancel.is_cancelled() => {
                debug!(id = job.id, "Scheduled event cancelled by shutdown");
            }
            Err(e) => error!(id = job.id, error = %e, "Scheduled event failed"),
        }
    }

    async fn invoke(
        &self,
        entry: &RegisteredHandler,
        line: &DispatchLine,
        response: IrcResponse,
        writer: &BoxedWriter,
        cancel: &CancellationToken,
    ) {
        let token = cancel.child_token();
        let ctx = HandlerContext::new(
            writer.clone(),
            response,
            line.event.clone(),
            line.seq,
            token.clone(),
            self.pool.clone(),
        );
        let action = entry.handler.action();
        let outcome = self.supervise(entry.handler.name(), action(ctx), token).await;

        match outcome {
            Ok(()) => {
                debug!(plugin = %entry.plugin, handler = %entry.handler.name(), "Handler completed");
            }
            Err(HandlerError::Cancelled) if cancel.is_cancelled() => {
                debug!(handler = %entry.handler.name(), "Handler cancelled by shutdown");
            }
            Err(e) => {
                error!(
                    plugin = %entry.plugin,
                    handler = %entry.handler.name(),
                    line = %redact(&line.raw),
                    error = %e,
                    "Handler failed"
                );
            }
        }
    }

    /// Runs `work` on its own task until it finishes or the timeout passes.
    ///
    /// On timeout `token` is cancelled and the task is aborted if it is still
    /// running after [`ABORT_GRACE_PERIOD`]. A panic becomes an error.
    async fn supervise(
        &self,
        name: &str,
        work: BoxFuture<'static, HandlerResult>,
        token: CancellationToken,
    ) -> HandlerResult {
        let mut task = tokio::spawn(work.in_current_span());

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(HandlerError::failed(format!(
                "handler panicked: {join_error}"
            ))),
            Err(_) => {
                token.cancel();
                let name = name.to_string();
                tokio::spawn(async move {
                    if tokio::time::timeout(ABORT_GRACE_PERIOD, &mut task)
                        .await
                        .is_err()
                    {
                        warn!(handler = %name, "Handler ignored cancellation, aborting");
                        task.abort();
                    }
                });
                Err(HandlerError::Timeout(self.timeout))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.handlers.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Queue
// ============================================================================

/// A scheduled job waiting for the worker.
pub struct QueuedJob {
    /// Scheduler id.
    pub id: ScheduleId,
    /// The job.
    pub action: ScheduledAction,
    /// Fired when the job is stopped or the scheduler shuts down.
    pub stopped: CancellationToken,
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("stopped", &self.stopped.is_cancelled())
            .finish()
    }
}

/// One entry of the dispatch queue.
#[derive(Debug)]
pub enum QueueItem {
    /// A server line or a local chaskis event.
    Line(DispatchLine),
    /// A due scheduled job.
    Job(QueuedJob),
}

impl QueueItem {
    /// Returns the line, if this entry is one.
    pub fn into_line(self) -> Option<DispatchLine> {
        match self {
            Self::Line(line) => Some(line),
            Self::Job(_) => None,
        }
    }
}

/// Creates the dispatch queue.
pub fn dispatch_channel(capacity: usize) -> (DispatchHandle, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DispatchHandle {
            tx,
            next_seq: Arc::new(Mutex::new(1)),
        },
        DispatchReceiver { rx },
    )
}

/// Producer side of the dispatch queue. Cheap to clone.
///
/// Sequence numbers are assigned in the order lines enter the queue, even
/// with several producers.
#[derive(Clone, Debug)]
pub struct DispatchHandle {
    tx: mpsc::Sender<QueueItem>,
    next_seq: Arc<Mutex<u64>>,
}

impl DispatchHandle {
    /// Numbers and sends a line through a reserved slot.
    fn stamp(&self, permit: mpsc::Permit<'_, QueueItem>, line: impl FnOnce(u64) -> DispatchLine) -> u64 {
        let mut next = self.next_seq.lock();
        let seq = *next;
        *next += 1;
        permit.send(QueueItem::Line(line(seq)));
        seq
    }

    async fn reserve(&self) -> FrameworkResult<mpsc::Permit<'_, QueueItem>> {
        self.tx
            .reserve()
            .await
            .map_err(|_| FrameworkError::QueueClosed("receiver dropped".into()))
    }

    /// Queues a line read from the server, waiting for room.
    pub async fn push_line(&self, raw: String) -> FrameworkResult<u64> {
        let permit = self.reserve().await?;
        Ok(self.stamp(permit, |seq| DispatchLine::server(seq, raw)))
    }

    /// Queues a chaskis event for local delivery, waiting for room.
    pub async fn push_event(&self, event: &ChaskisEvent) -> FrameworkResult<u64> {
        let raw = event.to_xml()?;
        let permit = self.reserve().await?;
        Ok(self.stamp(permit, |seq| DispatchLine::local(seq, raw)))
    }

    /// Queues a chaskis event without waiting.
    ///
    /// Used from synchronous contexts such as handler actions, which must
    /// not wait on the worker that is running them.
    pub fn try_push_event(&self, event: &ChaskisEvent) -> FrameworkResult<u64> {
        let raw = event.to_xml()?;
        let permit = self
            .tx
            .try_reserve()
            .map_err(|e| FrameworkError::QueueClosed(e.to_string()))?;
        Ok(self.stamp(permit, |seq| DispatchLine::local(seq, raw)))
    }

    /// Queues a due scheduled job, waiting for room.
    pub async fn push_job(&self, job: QueuedJob) -> FrameworkResult<()> {
        let permit = self.reserve().await?;
        permit.send(QueueItem::Job(job));
        Ok(())
    }

    /// Returns `true` once the worker is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the dispatch queue.
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<QueueItem>,
}

impl DispatchReceiver {
    /// Takes the next queued entry without running it.
    pub async fn recv(&mut self) -> Option<QueueItem> {
        self.rx.recv().await
    }
}

// ============================================================================
// Worker
// ============================================================================

/// The single consumer of the dispatch queue.
pub struct DispatchWorker {
    dispatcher: Arc<Dispatcher>,
    rx: DispatchReceiver,
    writer: BoxedWriter,
    session: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
}

impl DispatchWorker {
    /// Creates a worker.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        rx: DispatchReceiver,
        writer: BoxedWriter,
        session: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            dispatcher,
            rx,
            writer,
            session,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` as the parent of every invocation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Consumes the queue until `stop` fires or every producer is gone, then
    /// drains what is already queued. Returns the number of entries processed.
    pub async fn run(mut self, stop: CancellationToken) -> u64 {
        info!(handlers = self.dispatcher.handler_count(), "Dispatch worker started");
        let mut processed = 0;

        loop {
            let item = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                item = self.rx.rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            self.process(item).await;
            processed += 1;
        }

        while let Ok(item) = self.rx.rx.try_recv() {
            self.process(item).await;
            processed += 1;
        }

        info!(processed, "Dispatch worker stopped");
        processed
    }

    async fn process(&self, item: QueueItem) {
        let line = match item {
            QueueItem::Line(line) => line,
            QueueItem::Job(job) => {
                self.dispatcher.run_job(job, &self.writer, &self.cancel).await;
                return;
            }
        };
        if line.origin == LineOrigin::Local && line.event.is_none() {
            return;
        }
        let config = self.writer.config();
        let session = self.session.borrow().clone();
        self.dispatcher
            .dispatch(&line, &self.writer, &config, &session, &self.cancel)
            .await;
    }
}

impl std::fmt::Debug for DispatchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorker")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
