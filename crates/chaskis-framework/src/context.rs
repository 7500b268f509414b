//! Per-invocation context handed to handler actions.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chaskis_core::{BoxedWriter, ChaskisEvent, HandlerError, HandlerResult, IrcResponse};

use crate::pool::WorkerPool;

/// Everything a handler action gets for one invocation.
///
/// The cancellation token fires when the invocation exceeds its timeout or
/// the engine shuts down. Long-running actions should await through
/// [`sleep`](Self::sleep) or select on [`cancelled`](Self::cancelled) so they
/// can stop cleanly.
///
/// # Example
///
/// ```rust,ignore
/// async fn slow_reply(ctx: HandlerContext) -> HandlerResult {
///     ctx.sleep(Duration::from_secs(2)).await?;
///     ctx.reply("done")?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HandlerContext {
    /// Write capability.
    pub writer: BoxedWriter,
    /// Parsed view of the triggering line.
    pub response: IrcResponse,
    /// The decoded event, for chaskis event handlers.
    pub event: Option<ChaskisEvent>,
    /// Sequence number of the triggering line.
    pub seq: u64,
    cancel: CancellationToken,
    pool: WorkerPool,
}

impl HandlerContext {
    /// Creates a context.
    pub fn new(
        writer: BoxedWriter,
        response: IrcResponse,
        event: Option<ChaskisEvent>,
        seq: u64,
        cancel: CancellationToken,
        pool: WorkerPool,
    ) -> Self {
        Self {
            writer,
            response,
            event,
            seq,
            cancel,
            pool,
        }
    }

    /// Sends `message` back to where the triggering line came from.
    pub fn reply(&self, message: &str) -> HandlerResult {
        self.writer
            .send_message(message, &self.response.channel)
            .map_err(HandlerError::from)
    }

    /// Returns `true` once the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the invocation is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Returns a clone of the invocation's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sleeps for `duration`, or returns [`HandlerError::Cancelled`] early.
    pub async fn sleep(&self, duration: Duration) -> HandlerResult {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(HandlerError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Runs `work` on the background pool, off the dispatch path.
    ///
    /// The invocation's timeout no longer covers the job; it keeps running
    /// after the action returns and is only stopped by engine shutdown.
    /// Results should be written back through [`writer`](Self::writer).
    pub fn spawn_background<F>(&self, name: &str, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.spawn(name, work)
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("seq", &self.seq)
            .field("response", &self.response)
            .field("event", &self.event)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
