//! Rate-limited outgoing writer.
//!
//! ```text
//!  handlers ──┐                      ┌──────────────┐
//!  engine   ──┼── WriterHandle ──►   │ writer task  │ ── LineWriter ──► server
//!  scheduler──┘   (unbounded mpsc)   │ one line per │
//!                                    │ rate_limit   │
//!                                    └──────────────┘
//! ```
//!
//! Sends never block the caller. The task owns the transport's write half
//! while a connection is attached; lines queued while detached are dropped.
//! Pacing is global: the interval holds across reconnects.
//!
//! With `send_events` on, every line that reaches the server is also
//! published as a `SEND` core event. Lines carrying credentials never are.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chaskis_core::format::redact;
use chaskis_core::{
    ChaskisEvent, IrcConfig, IrcWriter, SessionSnapshot, TransportError, TransportResult,
};
use chaskis_framework::{DispatchHandle, FrameworkError};
use chaskis_transport::LineWriter;

enum WriterCommand {
    Attach(LineWriter, CancellationToken),
    Detach(oneshot::Sender<()>),
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Spawns the writer task and returns its handle.
pub fn spawn_writer(
    rate_limit: Duration,
    config: Arc<IrcConfig>,
    events: DispatchHandle,
    session: watch::Receiver<SessionSnapshot>,
    send_events: bool,
) -> WriterHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let echo = send_events.then(|| events.clone());
    tokio::spawn(WriterTask::new(rx, rate_limit, echo).run());
    WriterHandle {
        tx,
        events,
        session,
        config,
    }
}

/// Cloneable sending side; implements [`IrcWriter`] for handlers.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<WriterCommand>,
    events: DispatchHandle,
    session: watch::Receiver<SessionSnapshot>,
    config: Arc<IrcConfig>,
}

impl WriterHandle {
    /// Hands a fresh connection's write half to the task.
    ///
    /// `failure` is cancelled if a write fails.
    pub fn attach(&self, writer: LineWriter, failure: CancellationToken) -> TransportResult<()> {
        self.tx
            .send(WriterCommand::Attach(writer, failure))
            .map_err(|_| TransportError::WriterClosed)
    }

    /// Shuts down and drops the attached write half, after every line
    /// queued before this call has been handled.
    pub async fn detach(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterCommand::Detach(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Waits until every line queued before this call has been written
    /// or dropped.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Queues a line that was already validated.
    pub(crate) fn queue(&self, line: String) -> TransportResult<()> {
        self.tx
            .send(WriterCommand::Line(line))
            .map_err(|_| TransportError::WriterClosed)
    }
}

impl IrcWriter for WriterHandle {
    fn send_raw(&self, line: String) -> TransportResult<()> {
        if line.contains(['\r', '\n']) {
            return Err(TransportError::InvalidLine(redact(&line)));
        }
        self.queue(line)
    }

    fn send_chaskis_event(&self, event: ChaskisEvent) -> TransportResult<()> {
        match self.events.try_push_event(&event) {
            Ok(seq) => {
                trace!(seq, source = event.source_plugin(), "Queued chaskis event");
                Ok(())
            }
            Err(FrameworkError::Event(e)) => Err(TransportError::InvalidLine(e.to_string())),
            Err(e) => {
                warn!(error = %e, "Dropping chaskis event");
                Err(TransportError::WriterClosed)
            }
        }
    }

    fn session(&self) -> SessionSnapshot {
        self.session.borrow().clone()
    }

    fn config(&self) -> Arc<IrcConfig> {
        self.config.clone()
    }
}

// =============================================================================
// Task
// =============================================================================

struct WriterTask {
    rx: mpsc::UnboundedReceiver<WriterCommand>,
    rate_limit: Duration,
    sink: Option<(LineWriter, CancellationToken)>,
    last_sent: Option<Instant>,
    echo: Option<DispatchHandle>,
}

impl WriterTask {
    fn new(
        rx: mpsc::UnboundedReceiver<WriterCommand>,
        rate_limit: Duration,
        echo: Option<DispatchHandle>,
    ) -> Self {
        Self {
            rx,
            rate_limit,
            sink: None,
            last_sent: None,
            echo,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                WriterCommand::Attach(writer, failure) => {
                    debug!(peer = writer.peer(), "Writer attached");
                    self.close_sink().await;
                    self.sink = Some((writer, failure));
                }
                WriterCommand::Detach(ack) => {
                    self.close_sink().await;
                    let _ = ack.send(());
                }
                WriterCommand::Line(line) => self.write(line).await,
                WriterCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        self.close_sink().await;
        debug!("Writer task stopped");
    }

    async fn write(&mut self, line: String) {
        if self.sink.is_none() {
            debug!(line = %redact(&line), "Not connected, dropping line");
            return;
        }

        if let Some(last) = self.last_sent {
            tokio::time::sleep_until(last + self.rate_limit).await;
        }

        let Some((writer, failure)) = self.sink.as_mut() else {
            return;
        };
        trace!(line = %redact(&line), "Sending");
        let result = writer.write_line(&line).await;
        self.last_sent = Some(Instant::now());

        if let Err(e) = result {
            warn!(error = %e, "Write failed, dropping connection");
            failure.cancel();
            self.close_sink().await;
            return;
        }
        self.announce(&line);
    }

    fn announce(&self, line: &str) {
        let Some(events) = &self.echo else {
            return;
        };
        let Some(event) = ChaskisEvent::sent(line) else {
            return;
        };
        if let Err(e) = events.try_push_event(&event) {
            debug!(error = %e, "Dropping SEND event");
        }
    }

    async fn close_sink(&mut self) {
        if let Some((mut writer, _)) = self.sink.take() {
            let _ = writer.shutdown().await;
            debug!(peer = writer.peer(), "Writer detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio_test::assert_err;

    use super::*;
    use chaskis_core::core_events;
    use chaskis_framework::{QueueItem, dispatch_channel};
    use chaskis_transport::split_lines;

    fn handle(rate_limit: Duration) -> (WriterHandle, chaskis_framework::DispatchReceiver) {
        spawn(rate_limit, false)
    }

    fn spawn(
        rate_limit: Duration,
        send_events: bool,
    ) -> (WriterHandle, chaskis_framework::DispatchReceiver) {
        let config = Arc::new(IrcConfig::new("irc.example.net", "bot").with_channel("#room"));
        let (events, rx) = dispatch_channel(8);
        let (_, session) = watch::channel(SessionSnapshot::default());
        (spawn_writer(rate_limit, config, events, session, send_events), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn lines_are_paced() {
        let (writer, _rx) = handle(Duration::from_millis(800));
        let (client, server) = tokio::io::duplex(4096);
        let (_reader, line_writer) = split_lines(Box::new(client), "test");
        writer.attach(line_writer, CancellationToken::new()).unwrap();

        let started = Instant::now();
        for n in 0..3 {
            writer.send_message(&format!("line {n}"), "#room").unwrap();
        }

        let mut server = BufReader::new(server).lines();
        let mut arrivals = Vec::new();
        for _ in 0..3 {
            let line = server.next_line().await.unwrap().unwrap();
            arrivals.push((line, started.elapsed()));
        }

        assert_eq!(arrivals[0].0, "PRIVMSG #room :line 0");
        assert_eq!(arrivals[2].0, "PRIVMSG #room :line 2");
        for pair in arrivals.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(800));
        }
    }

    #[tokio::test]
    async fn rejects_embedded_line_breaks() {
        let (writer, _rx) = handle(Duration::ZERO);
        assert_err!(writer.send_raw("PRIVMSG #room :a\r\nQUIT".into()));
    }

    #[tokio::test]
    async fn drops_lines_while_detached() {
        let (writer, _rx) = handle(Duration::ZERO);
        writer.send_raw("PRIVMSG #room :lost".into()).unwrap();
        writer.flush().await;

        let (client, server) = tokio::io::duplex(4096);
        let (_reader, line_writer) = split_lines(Box::new(client), "test");
        writer.attach(line_writer, CancellationToken::new()).unwrap();
        writer.send_raw("PRIVMSG #room :kept".into()).unwrap();
        writer.detach().await;

        let mut server = BufReader::new(server).lines();
        assert_eq!(server.next_line().await.unwrap().unwrap(), "PRIVMSG #room :kept");
        assert_eq!(server.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_failure_cancels_the_connection() {
        let (writer, _rx) = handle(Duration::ZERO);
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (_reader, line_writer) = split_lines(Box::new(client), "test");
        let failure = CancellationToken::new();
        writer.attach(line_writer, failure.clone()).unwrap();

        writer.send_raw("PRIVMSG #room :nobody".into()).unwrap();
        writer.flush().await;
        assert!(failure.is_cancelled());
    }

    #[tokio::test]
    async fn chaskis_events_loop_back() {
        let (writer, mut rx) = handle(Duration::ZERO);
        writer
            .send_chaskis_event(ChaskisEvent::new(
                chaskis_core::EventSource::Plugin,
                "ECHO",
                None,
            ))
            .unwrap();
        let line = rx.recv().await.and_then(QueueItem::into_line).unwrap();
        assert!(line.event.is_some());
    }

    #[tokio::test]
    async fn written_lines_are_announced() {
        let (writer, mut rx) = spawn(Duration::ZERO, true);
        let (client, server) = tokio::io::duplex(4096);
        let (_reader, line_writer) = split_lines(Box::new(client), "test");
        writer.attach(line_writer, CancellationToken::new()).unwrap();

        writer.send_raw("PASS hunter2".into()).unwrap();
        writer.send_raw("JOIN #room".into()).unwrap();
        writer.flush().await;

        let line = rx.recv().await.and_then(QueueItem::into_line).unwrap();
        let event = line.event.unwrap();
        assert_eq!(event.event_id(), Some(core_events::SEND_JOIN));
        assert_eq!(event.args.get("channel"), Some("#room"));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );

        let mut server = BufReader::new(server).lines();
        assert_eq!(server.next_line().await.unwrap().unwrap(), "PASS hunter2");
        assert_eq!(server.next_line().await.unwrap().unwrap(), "JOIN #room");
    }

    #[tokio::test]
    async fn nothing_is_announced_when_disabled() {
        let (writer, mut rx) = handle(Duration::ZERO);
        let (client, _server) = tokio::io::duplex(4096);
        let (_reader, line_writer) = split_lines(Box::new(client), "test");
        writer.attach(line_writer, CancellationToken::new()).unwrap();

        writer.send_raw("JOIN #room".into()).unwrap();
        writer.flush().await;
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }
}
