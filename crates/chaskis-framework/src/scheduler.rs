//! Delayed and recurring jobs.
//!
//! Timers only decide when a job is due. A due job is queued on the dispatch
//! queue and run by the dispatch worker under the handler timeout.
//!
//! ```rust,ignore
//! let id = scheduler.schedule_recurring_event(Duration::from_secs(3600), |writer| async move {
//!     writer.send_broadcast_message("Hourly reminder")?;
//!     Ok(())
//! });
//! scheduler.stop_event(id);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chaskis_core::{BoxedWriter, HandlerResult};

use crate::dispatch::{DispatchHandle, QueuedJob};

/// A scheduled job. Receives the writer capability.
pub type ScheduledAction = Arc<dyn Fn(BoxedWriter) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Identifies a scheduled job.
pub type ScheduleId = u64;

/// Queues jobs after a delay or on an interval.
///
/// Cloning shares the same job table. [`shutdown`](Self::shutdown) cancels
/// every job, including ones scheduled afterwards.
#[derive(Clone)]
pub struct EventScheduler {
    queue: DispatchHandle,
    jobs: Arc<Mutex<HashMap<ScheduleId, CancellationToken>>>,
    next_id: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl EventScheduler {
    /// Creates a scheduler feeding `queue`.
    pub fn new(queue: DispatchHandle) -> Self {
        Self {
            queue,
            jobs: Arc::default(),
            next_id: Arc::new(AtomicU64::new(1)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs `action` once after `delay`.
    pub fn schedule_event<F, Fut>(&self, delay: Duration, action: F) -> ScheduleId
    where
        F: Fn(BoxedWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.spawn(delay, None, boxed(action))
    }

    /// Runs `action` every `interval`, first after one interval.
    pub fn schedule_recurring_event<F, Fut>(&self, interval: Duration, action: F) -> ScheduleId
    where
        F: Fn(BoxedWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.spawn(interval, Some(interval), boxed(action))
    }

    /// Cancels a job. Returns `false` if it already finished or never existed.
    pub fn stop_event(&self, id: ScheduleId) -> bool {
        match self.jobs.lock().remove(&id) {
            Some(token) => {
                token.cancel();
                debug!(id, "Stopped scheduled event");
                true
            }
            None => false,
        }
    }

    /// Number of live jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Cancels every job.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let jobs: Vec<_> = self.jobs.lock().drain().collect();
        debug!(cancelled = jobs.len(), "Scheduler shut down");
        for (_, token) in jobs {
            token.cancel();
        }
    }

    fn spawn(&self, first: Duration, every: Option<Duration>, action: ScheduledAction) -> ScheduleId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        self.jobs.lock().insert(id, token.clone());

        let jobs = self.jobs.clone();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            match every {
                None => {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(first) => {}
                    }
                    enqueue(&queue, id, &action, &token).await;
                }
                Some(period) => {
                    let mut ticker =
                        tokio::time::interval_at(tokio::time::Instant::now() + first, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => return,
                            _ = ticker.tick() => {}
                        }
                        if !enqueue(&queue, id, &action, &token).await {
                            break;
                        }
                    }
                }
            }
            jobs.lock().remove(&id);
        });
        debug!(id, after = ?first, every = ?every, "Scheduled event");
        id
    }
}

fn boxed<F, Fut>(action: F) -> ScheduledAction
where
    F: Fn(BoxedWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |writer| -> BoxFuture<'static, HandlerResult> { Box::pin(action(writer)) })
}

/// Queues one run of a due job. Returns `false` once it can never run again.
async fn enqueue(
    queue: &DispatchHandle,
    id: ScheduleId,
    action: &ScheduledAction,
    token: &CancellationToken,
) -> bool {
    let job = QueuedJob {
        id,
        action: action.clone(),
        stopped: token.clone(),
    };
    tokio::select! {
        _ = token.cancelled() => false,
        queued = queue.push_job(job) => match queued {
            Ok(()) => true,
            Err(e) => {
                debug!(id, error = %e, "Dropping scheduled event");
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chaskis_core::SessionSnapshot;
    use tokio::sync::watch;

    use super::*;
    use crate::bridge::BridgeBots;
    use crate::dispatch::{DispatchWorker, Dispatcher, dispatch_channel};
    use crate::handler::testing::{RecordingWriter, config};
    use crate::handler::{MessageHandler, MessageHandlerConfig, into_action};
    use crate::registry::HandlerRegistry;

    fn scheduler_with(registry: HandlerRegistry) -> (EventScheduler, DispatchHandle, Arc<RecordingWriter>) {
        let writer = RecordingWriter::new(config());
        let dispatcher = Arc::new(Dispatcher::new(registry, BridgeBots::default()));
        let (queue, rx) = dispatch_channel(16);
        let (_tx, session) = watch::channel(SessionSnapshot::new("chaskis", Vec::new()));
        let worker = DispatchWorker::new(dispatcher, rx, writer.clone(), session);
        tokio::spawn(worker.run(CancellationToken::new()));
        (EventScheduler::new(queue.clone()), queue, writer)
    }

    fn scheduler() -> EventScheduler {
        scheduler_with(HandlerRegistry::new()).0
    }

    fn counter() -> (
        Arc<AtomicUsize>,
        impl Fn(BoxedWriter) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    ) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let action = move |_w: BoxedWriter| -> BoxFuture<'static, HandlerResult> {
            counted.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        };
        (count, action)
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_runs_once() {
        let scheduler = scheduler();
        let (count, action) = counter();
        scheduler.schedule_event(Duration::from_secs(5), action);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_runs_until_stopped() {
        let scheduler = scheduler();
        let (count, action) = counter();
        let id = scheduler.schedule_recurring_event(Duration::from_secs(10), action);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(scheduler.stop_event(id));
        assert!(!scheduler.stop_event(id));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let scheduler = scheduler();
        let (count, action) = counter();
        let action = Arc::new(action);
        for _ in 0..3 {
            let action = action.clone();
            scheduler.schedule_recurring_event(Duration::from_secs(1), move |w| action(w));
        }
        assert_eq!(scheduler.len(), 3);

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn due_jobs_wait_for_the_running_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "test",
            std::sync::Arc::new(
                MessageHandler::new(
                    MessageHandlerConfig::new(
                        "^slow$",
                        into_action(|ctx| async move {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            ctx.reply("handler done")
                        }),
                    ),
                    &config(),
                )
                .unwrap(),
            ),
        );
        let (scheduler, queue, writer) = scheduler_with(registry);
        queue
            .push_line(":alice!a@h PRIVMSG #room :slow".into())
            .await
            .unwrap();
        scheduler.schedule_event(Duration::from_secs(1), |writer| async move {
            writer.send_message("job", "#room")?;
            Ok(())
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(writer.lines.lock().is_empty());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            *writer.lines.lock(),
            ["PRIVMSG #room :handler done", "PRIVMSG #room :job"]
        );
    }
}
