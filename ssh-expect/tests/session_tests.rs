//! Integration tests for the expect session, driven through the in-memory
//! channel.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use regex::bytes::Regex;
use ssh_expect::error::{ConfigError, TransportError};
use ssh_expect::logging::{Direction, parse_hex_dump};
use ssh_expect::transport::{BoxedStream, ConnectionFactory};
use ssh_expect::{
    CommandRequest, Error, ExpectSession, MatchRequest, MemoryChannel, Options, SessionBuilder,
    SessionConfig,
};
use tokio_test::{assert_pending, task};

/// A log sink the test can read back.
#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl SharedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Refuses every connection.
struct RefusingFactory;

impl ConnectionFactory for RefusingFactory {
    fn open<'a>(&'a self, _host: &'a str, _port: u16) -> BoxFuture<'a, io::Result<BoxedStream>> {
        Box::pin(async {
            Err::<BoxedStream, _>(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

/// Never finishes opening a connection.
struct StalledFactory;

impl ConnectionFactory for StalledFactory {
    fn open<'a>(&'a self, _host: &'a str, _port: u16) -> BoxFuture<'a, io::Result<BoxedStream>> {
        Box::pin(std::future::pending::<io::Result<BoxedStream>>())
    }
}

fn session_with(config: SessionConfig) -> (ExpectSession<MemoryChannel>, ssh_expect::MemoryRemote) {
    let (channel, remote) = MemoryChannel::pair();
    (ExpectSession::new(channel, config), remote)
}

#[tokio::test]
async fn test_returns_on_default_prompt() {
    let (mut session, remote) = session_with(SessionConfig::default());

    remote.send("echo hello\r\nhello\r\n$ ");
    let output = session.waitfor(MatchRequest::new()).await.unwrap().unwrap();

    assert_eq!(output, "echo hello\nhello\n$ ");
    assert!(output.as_str_lossy().ends_with("hello\n$ "));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_zero_waittime_without_match_stays_pending() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("still booting...\r\n");

    let mut wait = task::spawn(session.waitfor(MatchRequest::new()));
    assert_pending!(wait.poll());
    assert_pending!(wait.poll());
    drop(wait);
    drop(remote);
}

#[tokio::test(start_paused = true)]
async fn test_zero_waittime_outlasts_external_timeout() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("Password");

    let result = tokio::time::timeout(
        Duration::from_secs(600),
        session.waitfor(MatchRequest::new()),
    )
    .await;

    assert!(result.is_err(), "waitfor returned without a match or EOF");
    drop(remote);
}

#[tokio::test]
async fn test_fail_eof_on_immediate_close() {
    let (mut session, remote) = session_with(SessionConfig {
        fail_eof: true,
        ..SessionConfig::default()
    });
    remote.close();

    let err = session.waitfor(MatchRequest::new()).await.unwrap_err();
    assert!(err.is_eof());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_no_data_sentinel_on_immediate_close() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.close();

    let mut chunks = Vec::new();
    let result = session
        .waitfor_with(MatchRequest::new(), |chunk| {
            chunks.push(chunk.map(<[u8]>::to_vec))
        })
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(chunks, vec![None]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_fail_eof_override_per_call() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("partial");
    remote.close();

    let err = session
        .waitfor(MatchRequest::new().with_fail_eof(true))
        .await
        .unwrap_err();
    assert!(err.is_eof());
}

#[tokio::test]
async fn test_eof_after_data_returns_text() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("logout\r\n");
    remote.close();

    let output = session.waitfor(MatchRequest::new()).await.unwrap().unwrap();
    assert_eq!(output, "logout\n");
    assert!(session.is_eof());

    // End of stream is sticky.
    let again = session.waitfor(MatchRequest::new()).await.unwrap();
    assert!(again.is_none());
}

#[test]
fn test_non_boolean_binmode_rejected_before_connecting() {
    let result = Options::from_json(r#"{"Host": "192.0.2.1", "Username": "ops", "Binmode": "yes"}"#);
    assert!(matches!(result, Err(ConfigError::InvalidBinmode)));
}

#[tokio::test]
async fn test_print_without_newline_matches_write() {
    let (mut printed, printed_remote) = session_with(SessionConfig::default());
    let (mut written, written_remote) = session_with(SessionConfig::default());

    printed.print("show version").await.unwrap();
    written.write(b"show version").await.unwrap();

    assert_eq!(printed_remote.written(), written_remote.written());
    printed.close().await.unwrap();
    written.close().await.unwrap();
}

#[tokio::test]
async fn test_terminator_and_binmode_on_send() {
    let (mut session, remote) = session_with(SessionConfig {
        terminator: b"\r\n".to_vec(),
        ..SessionConfig::default()
    });

    session.puts("enable").await.unwrap();
    session.print("a\nb").await.unwrap();
    session.set_binmode(true);
    session.puts("raw").await.unwrap();

    assert_eq!(remote.written(), b"enable\r\na\r\nbraw\n");
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waittime_gives_up_after_idle_gap() {
    let (mut session, remote) = session_with(SessionConfig {
        waittime: Duration::from_secs(2),
        ..SessionConfig::default()
    });
    remote.send("Last login: today\r\n");

    let started = tokio::time::Instant::now();
    let output = session.waitfor(MatchRequest::new()).await.unwrap().unwrap();

    assert_eq!(output, "Last login: today\n");
    assert!(started.elapsed() >= Duration::from_secs(2));
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waittime_idle_gap_with_nothing_received() {
    let (mut session, remote) = session_with(SessionConfig::default());

    let output = session
        .waitfor(MatchRequest::new().with_waittime(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(output.map(|o| o.is_empty()), Some(true));
    drop(remote);
}

#[tokio::test(start_paused = true)]
async fn test_waittime_lingers_after_match() {
    let (mut session, remote) = session_with(SessionConfig {
        waittime: Duration::from_secs(1),
        ..SessionConfig::default()
    });
    remote.send("first$ ");

    let late = remote.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        late.send("second\r\n$ ");
    });

    let output = session.waitfor(MatchRequest::new()).await.unwrap().unwrap();
    assert_eq!(output, "first$ second\n$ ");
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_read_failure_is_end_of_stream() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("abc");
    remote.fail(io::ErrorKind::ConnectionReset);

    let output = session.waitfor(MatchRequest::new()).await.unwrap().unwrap();
    assert_eq!(output, "abc");
    assert!(session.is_eof());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_cmd_until_string() {
    let (mut session, remote) = session_with(SessionConfig::default());
    remote.send("sudo -k true\r\n[sudo] password for ops: ");

    let output = session
        .cmd(CommandRequest::new("sudo -k true").until_string("password for"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(remote.written(), b"sudo -k true\n");
    assert!(output.contains("[sudo] password for ops: "));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_cmd_waits_for_custom_prompt() {
    let config = SessionConfig {
        prompt: Regex::new(r"(?m)^\S+>\s.*$").unwrap(),
        terminator: b"\r".to_vec(),
        ..SessionConfig::default()
    };
    let (mut session, remote) = session_with(config);
    remote.send("show clock\r\n12:00:01 UTC\r\nswitch1> ");

    let output = session.cmd("show clock").await.unwrap().unwrap();

    assert_eq!(remote.written(), b"show clock\r");
    assert_eq!(output.lines().nth(1).as_deref(), Some("12:00:01 UTC"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_attach_waits_for_greeting() {
    let (channel, remote) = MemoryChannel::pair();
    remote.send("Welcome to router1\r\n");
    remote.send("router1# ");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let session = SessionBuilder::new("router1")
        .on_output(move |chunk| {
            if let Some(chunk) = chunk {
                sink.lock().unwrap().extend_from_slice(chunk);
            }
        })
        .attach(channel)
        .await
        .unwrap();

    let greeting = session.greeting().unwrap();
    assert_eq!(*greeting, "Welcome to router1\nrouter1# ");
    assert_eq!(&seen.lock().unwrap()[..], greeting.as_bytes());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_logs_mirror_both_directions() {
    let (channel, remote) = MemoryChannel::pair();
    let output_log = SharedLog::default();
    let dump_log = SharedLog::default();
    remote.send("motd\r\n$ ");

    let mut session = SessionBuilder::new("localhost")
        .output_log_writer(output_log.clone())
        .dump_log_writer(dump_log.clone())
        .attach(channel)
        .await
        .unwrap();

    session.puts("id").await.unwrap();
    remote.send("uid=0(root)\r\n$ ");
    session.waitfor(MatchRequest::new()).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(output_log.contents(), "motd\n$ uid=0(root)\n$ ");

    let records = parse_hex_dump(&dump_log.contents()).unwrap();
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.direction, r.data.as_slice()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Direction::Inbound, &b"motd\r\n$ "[..]),
            (Direction::Outbound, &b"id\n"[..]),
            (Direction::Inbound, &b"uid=0(root)\r\n$ "[..]),
        ]
    );
}

#[tokio::test]
async fn test_close_closes_channel() {
    let (session, remote) = session_with(SessionConfig::default());
    assert!(!remote.is_closed_locally());

    session.close().await.unwrap();
    assert!(remote.is_closed_locally());
}

#[tokio::test]
async fn test_connect_requires_username() {
    let result = SessionBuilder::new("192.0.2.1").connect().await;
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::MissingUsername))
    ));
}

#[tokio::test]
async fn test_connect_failure_reported_to_progress_and_logs() {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let output_log = SharedLog::default();
    let dump_log = SharedLog::default();

    let result = SessionBuilder::new("h")
        .username("ops")
        .factory(RefusingFactory)
        .on_progress(move |message| seen.lock().unwrap().push(message.to_string()))
        .output_log_writer(output_log.clone())
        .dump_log_writer(dump_log.clone())
        .connect()
        .await;
    let err = match result {
        Ok(_) => panic!("connected through a refusing factory"),
        Err(e) => e,
    };

    assert!(matches!(
        err,
        Error::Transport(TransportError::ConnectionFailed { ref host, port: 22, .. }) if host == "h"
    ));
    assert_eq!(*progress.lock().unwrap(), vec!["Trying h...\n".to_string()]);

    let error_line = format!("{}\n", err);
    assert_eq!(output_log.contents(), format!("Trying h...\n{}", error_line));

    let records = parse_hex_dump(&dump_log.contents()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.direction == Direction::Control));
    assert_eq!(records[0].data, b"Trying h...\n");
    assert_eq!(records[1].data, error_line.as_bytes());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_distinct() {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let output_log = SharedLog::default();

    let result = SessionBuilder::new("h")
        .username("ops")
        .timeout(Duration::from_secs(1))
        .factory(StalledFactory)
        .on_progress(move |message| seen.lock().unwrap().push(message.to_string()))
        .output_log_writer(output_log.clone())
        .connect()
        .await;
    let err = match result {
        Ok(_) => panic!("connected through a stalled factory"),
        Err(e) => e,
    };

    assert!(matches!(
        err,
        Error::Transport(TransportError::ConnectTimeout(limit)) if limit == Duration::from_secs(1)
    ));
    assert_eq!(*progress.lock().unwrap(), vec!["Trying h...\n".to_string()]);
    assert!(output_log.contents().ends_with(&format!("{}\n", err)));
}
