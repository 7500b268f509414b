//! The connection engine.
//!
//! ```text
//!  Disconnected ─► Connecting ─► Authenticating ─► JoiningChannels ─► Connected
//!                     ▲                                                  │
//!                     │                                   read error, EOF, write
//!                     │                                   failure, watchdog, quit
//!                     │                                                  ▼
//!                 Reconnecting ◄───────────── (not quit) ─────────── Disconnecting
//!                                                                        │ quit
//!                                                                        ▼
//!                                                                  Disconnected
//! ```
//!
//! Network failures in any state end in `Disconnecting` and, unless the
//! shutdown token fired, `Reconnecting`. The engine only returns on
//! shutdown or when a configured reconnect limit is reached.
//!
//! The engine is the only writer of the session snapshot. Every received
//! line is observed by the session tracker, counted as watchdog activity,
//! and pushed into the dispatch queue in receive order. Core events are
//! pushed into the same queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chaskis_core::{
    ChaskisEvent, ConnectionState, IrcConfig, IrcWriter, NickServTrigger, TransportError,
    core_events, format,
};
use chaskis_framework::DispatchHandle;
use chaskis_transport::{LineReader, LineWriter, TransportConfig, connect};

use crate::backoff::Backoff;
use crate::error::{RuntimeError, RuntimeResult};
use crate::session::SessionTracker;
use crate::watchdog::{Activity, WatchdogConfig, run_watchdog};
use crate::writer::WriterHandle;

/// Upper bound on sending `PART`/`QUIT` during a graceful quit.
pub const DEFAULT_QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The shutdown token fired.
    Quit,
    /// The server closed the connection.
    Eof,
    /// Reading failed.
    ReadError(TransportError),
    /// Writing failed.
    WriteFailed,
    /// No traffic after a watchdog ping.
    WatchdogFailed,
    /// The dispatch queue is gone.
    QueueClosed,
}

impl Disconnect {
    /// Returns `true` if the engine should reconnect afterwards.
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, Self::Quit | Self::QueueClosed)
    }
}

/// Owns one server session across reconnects.
pub struct IrcConnection {
    config: Arc<IrcConfig>,
    transport: TransportConfig,
    watchdog: WatchdogConfig,
    backoff: Backoff,
    quit_timeout: Duration,
    session: Arc<SessionTracker>,
    writer: WriterHandle,
    queue: DispatchHandle,
}

impl IrcConnection {
    pub fn new(
        config: Arc<IrcConfig>,
        session: Arc<SessionTracker>,
        writer: WriterHandle,
        queue: DispatchHandle,
    ) -> Self {
        Self {
            transport: TransportConfig::from(config.as_ref()),
            config,
            watchdog: WatchdogConfig::default(),
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0),
            quit_timeout: DEFAULT_QUIT_TIMEOUT,
            session,
            writer,
            queue,
        }
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_quit_timeout(mut self, quit_timeout: Duration) -> Self {
        self.quit_timeout = quit_timeout;
        self
    }

    /// Connects, serves, and reconnects until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) -> RuntimeResult<()> {
        info!(server = %self.transport.address(), nick = %self.config.nick, "Connection engine started");

        loop {
            self.session.set_state(ConnectionState::Connecting);
            self.session.reset_nick(&self.config.nick);

            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = connect(&self.transport) => result,
            };

            match connected {
                Ok((reader, line_writer)) => {
                    let reason = self.serve(reader, line_writer, &shutdown).await;
                    self.disconnect(&reason).await;
                    if !reason.should_reconnect() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(server = %self.transport.address(), error = %e, "Connection attempt failed");
                }
            }

            if !self.wait_to_reconnect(&shutdown).await? {
                break;
            }
        }

        self.session.set_state(ConnectionState::Disconnected);
        info!("Connection engine stopped");
        Ok(())
    }

    /// Registers, joins, and reads until the connection ends.
    async fn serve(
        &mut self,
        mut reader: LineReader,
        line_writer: LineWriter,
        shutdown: &CancellationToken,
    ) -> Disconnect {
        let write_failure = CancellationToken::new();
        if self.writer.attach(line_writer, write_failure.clone()).is_err() {
            return Disconnect::QueueClosed;
        }

        self.session.set_state(ConnectionState::Authenticating);
        if let Err(e) = self.register() {
            warn!(error = %e, "Registration failed");
            return Disconnect::WriteFailed;
        }
        self.emit(core_events::CONNECTED).await;

        self.session.set_state(ConnectionState::JoiningChannels);
        if let Err(e) = self.join_channels() {
            warn!(error = %e, "Joining channels failed");
            return Disconnect::WriteFailed;
        }
        self.emit(core_events::FINISHED_JOINING_CHANNELS).await;

        if self.nickserv_trigger() == Some(NickServTrigger::AfterJoin) {
            self.identify();
        }

        self.session.set_state(ConnectionState::Connected);
        self.backoff.reset();
        self.session.set_reconnect_attempts(0);
        info!(server = %self.transport.address(), channels = ?self.config.channels, "Connected");

        let activity = Activity::new();
        let watchdog_stop = CancellationToken::new();
        let _stop_watchdog = watchdog_stop.clone().drop_guard();
        let watchdog = run_watchdog(
            self.watchdog,
            &self.writer,
            &self.session,
            activity.subscribe(),
            watchdog_stop,
        );
        tokio::pin!(watchdog);
        let mut watchdog_running = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Disconnect::Quit,
                _ = write_failure.cancelled() => return Disconnect::WriteFailed,
                tripped = &mut watchdog, if watchdog_running => {
                    watchdog_running = false;
                    if tripped {
                        return Disconnect::WatchdogFailed;
                    }
                }
                line = reader.read_line() => match line {
                    Ok(Some(line)) => {
                        activity.touch();
                        let parsed = self.session.observe(&line);
                        if parsed.is_some_and(|l| l.command == "001")
                            && self.nickserv_trigger() == Some(NickServTrigger::OnWelcome)
                        {
                            self.identify();
                        }
                        if self.queue.push_line(line).await.is_err() {
                            return Disconnect::QueueClosed;
                        }
                    }
                    Ok(None) => return Disconnect::Eof,
                    Err(e) => return Disconnect::ReadError(e),
                },
            }
        }
    }

    fn register(&self) -> Result<(), TransportError> {
        if let Some(password) = &self.config.server_password {
            self.writer.send_raw(format::pass(password))?;
        }
        self.writer
            .send_raw(format::user(&self.config.user_name, &self.config.real_name))?;
        self.writer.send_raw(format::nick(&self.config.nick))?;
        Ok(())
    }

    fn join_channels(&self) -> Result<(), TransportError> {
        for channel in &self.config.channels {
            self.writer.send_raw(format::join(channel))?;
        }
        Ok(())
    }

    fn nickserv_trigger(&self) -> Option<NickServTrigger> {
        self.config.nickserv.as_ref().map(|n| n.trigger)
    }

    fn identify(&self) {
        let Some(nickserv) = &self.config.nickserv else {
            return;
        };
        debug!(service = %nickserv.nick, "Identifying with NickServ");
        if let Err(e) = self
            .writer
            .send_message(&nickserv.identify_message(), &nickserv.nick)
        {
            warn!(error = %e, "Could not queue NickServ identify");
        }
    }

    /// Emits the disconnect events and tears the transport down.
    async fn disconnect(&mut self, reason: &Disconnect) {
        match reason {
            Disconnect::Quit => info!("Disconnecting on request"),
            Disconnect::Eof => warn!("Server closed the connection"),
            Disconnect::ReadError(e) => warn!(error = %e, "Read failed"),
            Disconnect::WriteFailed => warn!("Write failed"),
            Disconnect::WatchdogFailed => {
                warn!("Watchdog failed");
                self.emit(core_events::WATCHDOG_FAILED).await;
            }
            Disconnect::QueueClosed => error!("Dispatch queue closed"),
        }

        let channels = {
            let snapshot = self.session.snapshot();
            if snapshot.joined_channels.is_empty() {
                self.config.channels.clone()
            } else {
                snapshot.joined_channels
            }
        };

        self.session.set_state(ConnectionState::Disconnecting);
        self.emit(core_events::DISCONNECTING).await;

        if *reason == Disconnect::Quit {
            self.send_quit(&channels).await;
        }
        self.writer.detach().await;

        self.session.set_state(ConnectionState::Disconnected);
        self.emit(core_events::DISCONNECTED).await;
    }

    async fn send_quit(&self, channels: &[String]) {
        let quit_message = format::sanitize(&self.config.quit_message);
        for channel in channels {
            if let Err(e) = self.writer.send_part(&quit_message, channel) {
                debug!(channel = %channel, error = %e, "PART not queued");
            }
        }
        if let Err(e) = self.writer.send_raw(format::quit(&quit_message)) {
            debug!(error = %e, "QUIT not queued");
        }

        if tokio::time::timeout(self.quit_timeout, self.writer.flush())
            .await
            .is_err()
        {
            warn!(timeout = ?self.quit_timeout, "Quit lines not flushed in time");
        }
    }

    /// Waits out the backoff. Returns `Ok(false)` if shutdown fired first.
    async fn wait_to_reconnect(&mut self, shutdown: &CancellationToken) -> RuntimeResult<bool> {
        let Some(delay) = self.backoff.next_delay() else {
            let attempts = self.backoff.attempts();
            error!(attempts, "Reconnect attempts exhausted");
            return Err(RuntimeError::ReconnectExhausted(attempts));
        };

        self.session.set_state(ConnectionState::Reconnecting);
        self.session.set_reconnect_attempts(self.backoff.attempts());
        self.emit_with(
            ChaskisEvent::core(core_events::ATTEMPTING_RECONNECT)
                .with_arg("attempt", self.backoff.attempts().to_string())
                .with_arg("delay_ms", delay.as_millis().to_string()),
        )
        .await;
        info!(attempt = self.backoff.attempts(), delay = ?delay, "Reconnecting");

        tokio::select! {
            _ = shutdown.cancelled() => Ok(false),
            _ = tokio::time::sleep(delay) => Ok(true),
        }
    }

    async fn emit(&self, event_id: &str) {
        self.emit_with(ChaskisEvent::core(event_id)).await;
    }

    async fn emit_with(&self, event: ChaskisEvent) {
        let event = event
            .with_arg("server", self.config.server.clone())
            .with_arg("nick", self.session.snapshot().nick);
        if let Err(e) = self.queue.push_event(&event).await {
            debug!(event = ?event.event_id(), error = %e, "Core event not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_quit_and_closed_queue_stop_the_engine() {
        assert!(!Disconnect::Quit.should_reconnect());
        assert!(!Disconnect::QueueClosed.should_reconnect());
        assert!(Disconnect::Eof.should_reconnect());
        assert!(Disconnect::WatchdogFailed.should_reconnect());
        assert!(Disconnect::ReadError(TransportError::closed("reset")).should_reconnect());
    }
}
