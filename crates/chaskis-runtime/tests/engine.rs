//! End-to-end tests against an in-process fake IRC server.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chaskis_core::{NickServTrigger, core_events};
use chaskis_framework::{
    ChaskisEventHandler, HandlerContext, MessageHandler, MessageHandlerConfig, ResponseOption,
    into_action,
};
use chaskis_runtime::config::PasswordSource;
use chaskis_runtime::{ChaskisConfig, ChaskisRuntime, RuntimeResult, VERSION};

type Events = Arc<Mutex<Vec<String>>>;

fn config(port: u16) -> ChaskisConfig {
    let mut config = ChaskisConfig::default();
    config.irc.server = "127.0.0.1".into();
    config.irc.port = port;
    config.irc.nick = "chaskis".into();
    config.irc.channels = vec!["#room".into()];
    config.irc.rate_limit_ms = 0;
    config.engine.watchdog_period_ms = 200;
    config.engine.watchdog_timeout_ms = 300;
    config.engine.reconnect_initial_delay_ms = 50;
    config.engine.reconnect_max_delay_ms = 100;
    config.engine.handler_timeout_ms = 1_000;
    config
}

/// Records core event ids in arrival order, `SEND` events only if `sends`.
fn record(runtime: &mut ChaskisRuntime, sends: bool) -> Events {
    let events = Events::default();
    let sink = events.clone();
    runtime.register_handler(Arc::new(ChaskisEventHandler::core(
        "recorder",
        into_action(move |ctx: HandlerContext| {
            let sink = sink.clone();
            async move {
                if let Some(id) = ctx.event.as_ref().and_then(|e| e.event_id())
                    && sends == core_events::is_send_event(id)
                {
                    sink.lock().push(id.to_string());
                }
                Ok(())
            }
        }),
    )));
    events
}

/// Records every connection lifecycle event id in arrival order.
fn record_core_events(runtime: &mut ChaskisRuntime) -> Events {
    record(runtime, false)
}

fn with_nickserv(mut config: ChaskisConfig, trigger: NickServTrigger) -> ChaskisConfig {
    config.irc.nickserv_password = Some(PasswordSource::Inline("swordfish".into()));
    config.irc.nickserv_trigger = trigger;
    config.engine.watchdog_enabled = false;
    config
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

fn count(events: &Events, id: &str) -> usize {
    events.lock().iter().filter(|e| *e == id).count()
}

/// Reads one connection to the end. Answers `PING` only if `answer_pings`.
async fn serve(stream: TcpStream, answer_pings: bool, script: &[&str]) -> Vec<String> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut received = Vec::new();
    let mut script = script.iter();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.starts_with("NICK ") {
            let _ = write.write_all(b":irc.test 001 chaskis :Welcome\r\n").await;
        }
        if line.starts_with("JOIN ") {
            let _ = write.write_all(b":chaskis!c@h JOIN #room\r\n").await;
            for scripted in script.by_ref() {
                let _ = write.write_all(format!("{scripted}\r\n").as_bytes()).await;
            }
        }
        if answer_pings && let Some(payload) = line.strip_prefix("PING ") {
            let _ = write
                .write_all(format!(":irc.test PONG irc.test :{payload}\r\n").as_bytes())
                .await;
        }
        received.push(line);
    }
    received
}

fn spawn_runtime(runtime: ChaskisRuntime) -> (CancellationToken, JoinHandle<RuntimeResult<()>>) {
    let shutdown = runtime.shutdown_token();
    let task = tokio::spawn(runtime.run_until(std::future::pending()));
    (shutdown, task)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watchdog_failure_reconnects_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut runtime = ChaskisRuntime::from_config(config(port)).unwrap();
    let events = record_core_events(&mut runtime);
    let (shutdown, task) = spawn_runtime(runtime);

    // First connection never answers the watchdog.
    let (first, _) = listener.accept().await.unwrap();
    let first_lines = serve(first, false, &[]).await;
    assert_eq!(first_lines[0], "USER chaskis 0 * :Chaskis IRC Bot");
    assert_eq!(first_lines[1], "NICK chaskis");
    assert_eq!(first_lines[2], "JOIN #room");
    assert!(first_lines.iter().any(|l| l == "PING watchdog"));
    assert!(!first_lines.iter().any(|l| l.starts_with("QUIT")));

    // Second connection answers, so it stays up across several periods.
    let (second, _) = listener.accept().await.unwrap();
    let server = tokio::spawn(async move { serve(second, true, &[]).await });

    wait_until("second connection", || {
        count(&events, core_events::FINISHED_JOINING_CHANNELS) == 2
    })
    .await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(count(&events, core_events::WATCHDOG_FAILED), 1);
    assert_eq!(count(&events, core_events::ATTEMPTING_RECONNECT), 1);

    shutdown.cancel();
    task.await.unwrap().unwrap();
    let second_lines = server.await.unwrap();

    assert_eq!(
        *events.lock(),
        [
            core_events::CONNECTED,
            core_events::FINISHED_JOINING_CHANNELS,
            core_events::WATCHDOG_FAILED,
            core_events::DISCONNECTING,
            core_events::DISCONNECTED,
            core_events::ATTEMPTING_RECONNECT,
            core_events::CONNECTED,
            core_events::FINISHED_JOINING_CHANNELS,
            core_events::DISCONNECTING,
            core_events::DISCONNECTED,
        ]
    );

    let tail: Vec<_> = second_lines.iter().rev().take(2).rev().cloned().collect();
    assert_eq!(tail, ["PART #room :Chaskis IRC Bot", "QUIT :Chaskis IRC Bot"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connections_back_off_once_per_attempt() {
    // Reserve a port, then close it so connects are refused.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = config(port);
    config.engine.max_reconnect_attempts = Some(3);
    let mut runtime = ChaskisRuntime::from_config(config).unwrap();
    let events = record_core_events(&mut runtime);
    let (_shutdown, task) = spawn_runtime(runtime);

    let result = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(chaskis_runtime::RuntimeError::ReconnectExhausted(3))
    ));
    assert_eq!(
        *events.lock(),
        [core_events::ATTEMPTING_RECONNECT; 3].map(String::from)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handlers_see_server_traffic_and_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = config(port);
    config.engine.watchdog_enabled = false;
    let mut runtime = ChaskisRuntime::from_config(config).unwrap();
    let irc = runtime.irc_config();

    let help = MessageHandlerConfig::new(
        "^!bot help$",
        into_action(|ctx: HandlerContext| async move {
            ctx.reply(&format!("{}: try !bot echo", ctx.response.remote_user))
        }),
    )
    .respond_to(ResponseOption::ChannelOnly);
    runtime.register_handler(Arc::new(MessageHandler::new(help, &irc).unwrap()));
    let (shutdown, task) = spawn_runtime(runtime);

    let (stream, _) = listener.accept().await.unwrap();
    let server = tokio::spawn(async move {
        serve(
            stream,
            false,
            &[
                "PING :irc.test",
                ":alice!~a@h PRIVMSG chaskis :!bot help",
                ":alice!~a@h PRIVMSG #room :!bot help",
            ],
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();
    task.await.unwrap().unwrap();
    let lines = server.await.unwrap();

    assert!(lines.iter().any(|l| l == "PONG :irc.test"));
    let replies: Vec<_> = lines.iter().filter(|l| l.starts_with("PRIVMSG")).collect();
    assert_eq!(replies, ["PRIVMSG #room :alice: try !bot echo"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn password_precedes_registration_and_identify_follows_join() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = with_nickserv(config(port), NickServTrigger::AfterJoin);
    config.irc.server_password = Some(PasswordSource::Inline("letmein".into()));
    let mut runtime = ChaskisRuntime::from_config(config).unwrap();
    let sends = record(&mut runtime, true);
    let (shutdown, task) = spawn_runtime(runtime);

    let (stream, _) = listener.accept().await.unwrap();
    let server = tokio::spawn(async move { serve(stream, false, &[]).await });
    wait_until("JOIN to be announced", || {
        count(&sends, core_events::SEND_JOIN) == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    task.await.unwrap().unwrap();
    let lines = server.await.unwrap();

    assert_eq!(
        lines[..5],
        [
            "PASS letmein",
            "USER chaskis 0 * :Chaskis IRC Bot",
            "NICK chaskis",
            "JOIN #room",
            "PRIVMSG NickServ :IDENTIFY swordfish",
        ]
    );
    // Neither the password nor the identify message is echoed.
    assert_eq!(
        sends.lock()[..3],
        [core_events::SEND, core_events::SEND, core_events::SEND_JOIN]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn welcome_trigger_waits_for_the_welcome_numeric() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = with_nickserv(config(port), NickServTrigger::OnWelcome);
    let runtime = ChaskisRuntime::from_config(config).unwrap();
    let (shutdown, task) = spawn_runtime(runtime);

    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    for expected in ["USER chaskis 0 * :Chaskis IRC Bot", "NICK chaskis", "JOIN #room"] {
        assert_eq!(lines.next_line().await.unwrap().unwrap(), expected);
    }
    assert!(
        tokio::time::timeout(Duration::from_millis(300), lines.next_line())
            .await
            .is_err()
    );

    write
        .write_all(b":irc.test 001 chaskis :Welcome\r\n")
        .await
        .unwrap();
    let identify = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(identify, "PRIVMSG NickServ :IDENTIFY swordfish");

    shutdown.cancel();
    while let Ok(Some(_)) = lines.next_line().await {}
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn builtin_commands_and_ctcp_are_answered() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = config(port);
    config.engine.watchdog_enabled = false;
    config
        .plugins
        .blacklist
        .insert("chaskis".into(), vec!["#quiet".into()]);
    let runtime = ChaskisRuntime::from_config(config).unwrap();
    let (shutdown, task) = spawn_runtime(runtime);

    let (stream, _) = listener.accept().await.unwrap();
    let server = tokio::spawn(async move {
        serve(
            stream,
            false,
            &[
                ":alice!~a@h PRIVMSG #room :!chaskis version",
                ":alice!~a@h PRIVMSG #quiet :!chaskis version",
                ":alice!~a@h PRIVMSG chaskis :\u{1}VERSION\u{1}",
                ":alice!~a@h PRIVMSG chaskis :\u{1}PING 1712\u{1}",
            ],
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();
    task.await.unwrap().unwrap();
    let lines = server.await.unwrap();

    let replies: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("PRIVMSG") || l.starts_with("NOTICE"))
        .cloned()
        .collect();
    assert_eq!(
        replies,
        [
            format!("PRIVMSG #room :Version of 'chaskis': {VERSION}"),
            format!("NOTICE alice :\u{1}VERSION chaskis {VERSION}\u{1}"),
            "NOTICE alice :\u{1}PING 1712\u{1}".to_string(),
        ]
    );
}
