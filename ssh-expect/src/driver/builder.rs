//! Builder for opening expect sessions.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use regex::bytes::Regex;
use secrecy::SecretString;

use super::config::SessionConfig;
use super::request::MatchRequest;
use super::session::ExpectSession;
use crate::channel::ChannelAdapter;
use crate::error::{ConfigError, Result};
use crate::logging::LogSinks;
use crate::transport::{
    AuthMethod, BoxedStream, ConnectionFactory, HostKeyVerification, RusshChannel, SshConfig,
    SshTransport,
};

type ProgressFn = Box<dyn FnMut(&str) + Send>;
type OutputFn = Box<dyn FnMut(Option<&[u8]>) + Send>;

/// Where a log sink writes.
enum LogTarget {
    Path(PathBuf),
    Writer(Box<dyn Write + Send>),
}

/// Builder for opening an [`ExpectSession`].
///
/// The shell channel comes from the first source configured, in this
/// order:
///
/// 1. an existing transport set with [`session`](Self::session); closing
///    the expect session leaves that transport open,
/// 2. a stream set with [`proxy`](Self::proxy),
/// 3. a fresh connection, opened through [`factory`](Self::factory) if one
///    is set and over TCP otherwise.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use ssh_expect::SessionBuilder;
///
/// # async fn example() -> Result<(), ssh_expect::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .waittime(Duration::from_millis(500))
///     .on_progress(|message| print!("{}", message))
///     .connect()
///     .await?;
///
/// let output = session.cmd("uptime").await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    username: Option<String>,
    auth: AuthMethod,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    output_log: Option<LogTarget>,
    dump_log: Option<LogTarget>,
    session: Option<Arc<SshTransport>>,
    proxy: Option<BoxedStream>,
    factory: Option<Box<dyn ConnectionFactory>>,
    on_progress: Option<ProgressFn>,
    on_output: Option<OutputFn>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: SessionConfig::new(host),
            username: None,
            auth: AuthMethod::None,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            output_log: None,
            dump_log: None,
            session: None,
            proxy: None,
            factory: None,
            on_progress: None,
            on_output: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the prompt pattern (default: `[$%#>] \z`).
    pub fn prompt(mut self, prompt: Regex) -> Self {
        self.config.prompt = prompt;
        self
    }

    /// Set the absolute timeout (default: 10 seconds).
    ///
    /// It bounds connection setup; see [`SessionConfig::timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable the absolute timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the idle-gap ceiling (default: zero).
    pub fn waittime(mut self, waittime: Duration) -> Self {
        self.config.waittime = waittime;
        self
    }

    /// Set the bytes sent in place of each `\n` (default: `\n`).
    pub fn terminator(mut self, terminator: impl Into<Vec<u8>>) -> Self {
        self.config.terminator = terminator.into();
        self
    }

    /// Turn binary mode on or off (default: off).
    pub fn binmode(mut self, binmode: bool) -> Self {
        self.config.binmode = binmode;
        self
    }

    /// Fail `waitfor` when the channel closes before a match (default: off).
    pub fn fail_eof(mut self, fail_eof: bool) -> Self {
        self.config.fail_eof = fail_eof;
        self
    }

    /// Append the session transcript to a file.
    pub fn output_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_log = Some(LogTarget::Path(path.into()));
        self
    }

    /// Append hex dumps of all traffic to a file.
    pub fn dump_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_log = Some(LogTarget::Path(path.into()));
        self
    }

    /// Write the session transcript to `writer`.
    pub fn output_log_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.output_log = Some(LogTarget::Writer(Box::new(writer)));
        self
    }

    /// Write hex dumps of all traffic to `writer`.
    pub fn dump_log_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.dump_log = Some(LogTarget::Writer(Box::new(writer)));
        self
    }

    /// Open the shell on an existing, already authenticated transport.
    pub fn session(mut self, transport: Arc<SshTransport>) -> Self {
        self.session = Some(transport);
        self
    }

    /// Run SSH over an already-open stream instead of dialing the host.
    pub fn proxy(mut self, stream: BoxedStream) -> Self {
        self.proxy = Some(stream);
        self
    }

    /// Open the connection's stream through `factory`.
    pub fn factory(mut self, factory: impl ConnectionFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Set terminal dimensions (default: 511x24).
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the host key verification mode (default: accept new keys).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Receive the "Trying" and "Connected" progress messages.
    pub fn on_progress(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Receive the output read while waiting for the first prompt.
    pub fn on_output(mut self, f: impl FnMut(Option<&[u8]>) + Send + 'static) -> Self {
        self.on_output = Some(Box::new(f));
        self
    }

    /// The session defaults configured so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect, start a shell and wait for the first prompt.
    pub async fn connect(mut self) -> Result<ExpectSession<RusshChannel>> {
        let mut logs = self.open_logs()?;

        let channel = if let Some(transport) = self.session.take() {
            debug!("opening shell on shared transport to {}", transport.config().socket_addr());
            RusshChannel::open_shared(transport).await?
        } else {
            let ssh_config = self.ssh_config()?;
            let transport = match self.proxy.take() {
                Some(stream) => SshTransport::connect_stream(ssh_config, stream).await?,
                None => self.dial(ssh_config, &mut logs).await?,
            };
            RusshChannel::open_owned(transport).await?
        };

        self.start(channel, logs).await
    }

    /// Drive an already-open channel and wait for the first prompt.
    ///
    /// No connection is made, so the connection settings are ignored.
    pub async fn attach<C: ChannelAdapter>(mut self, channel: C) -> Result<ExpectSession<C>> {
        let logs = self.open_logs()?;
        self.start(channel, logs).await
    }

    async fn dial(&mut self, config: SshConfig, logs: &mut LogSinks) -> Result<SshTransport> {
        self.progress(logs, &format!("Trying {}...\n", config.host));

        let host = config.host.clone();
        let connected = match self.factory.as_deref() {
            Some(factory) => SshTransport::connect_with(config, factory).await,
            None => SshTransport::connect(config).await,
        };
        let transport = connected.inspect_err(|e| logs.message(&format!("{}\n", e)))?;

        self.progress(logs, &format!("Connected to {}.\n", host));
        Ok(transport)
    }

    async fn start<C: ChannelAdapter>(
        mut self,
        channel: C,
        logs: LogSinks,
    ) -> Result<ExpectSession<C>> {
        let mut session = ExpectSession::with_logs(channel, self.config, logs);
        let greeting = match self.on_output.as_mut() {
            Some(on_output) => {
                session
                    .waitfor_with(MatchRequest::new(), |chunk| on_output(chunk))
                    .await?
            }
            None => session.waitfor(MatchRequest::new()).await?,
        };
        session.set_greeting(greeting);
        Ok(session)
    }

    fn progress(&mut self, logs: &mut LogSinks, message: &str) {
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(message);
        }
        logs.message(message);
    }

    fn ssh_config(&self) -> Result<SshConfig> {
        let username = self.username.clone().ok_or(ConfigError::MissingUsername)?;
        Ok(SshConfig {
            host: self.config.host.clone(),
            port: self.config.port,
            username,
            auth: self.auth.clone(),
            timeout: self.config.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
        })
    }

    fn open_logs(&mut self) -> Result<LogSinks> {
        let mut logs = LogSinks::open(log_path(&self.output_log), log_path(&self.dump_log))?;
        if let Some(LogTarget::Writer(writer)) = self.output_log.take() {
            logs = logs.with_output(writer);
        }
        if let Some(LogTarget::Writer(writer)) = self.dump_log.take() {
            logs = logs.with_dump(writer);
        }
        Ok(logs)
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("username", &self.username)
            .field("terminal_width", &self.terminal_width)
            .field("terminal_height", &self.terminal_height)
            .field("host_key_verification", &self.host_key_verification)
            .field("session", &self.session.is_some())
            .field("proxy", &self.proxy.is_some())
            .field("factory", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

fn log_path(target: &Option<LogTarget>) -> Option<&Path> {
    match target {
        Some(LogTarget::Path(path)) => Some(path),
        _ => None,
    }
}
