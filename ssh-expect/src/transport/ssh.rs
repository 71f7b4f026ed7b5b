//! SSH transport implementation using russh.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::factory::{BoxedStream, ConnectionFactory};
use crate::error::{ChannelError, Error, Result, TransportError};

/// An authenticated SSH connection.
///
/// One transport can carry several shell channels; wrap it in an `Arc` to
/// hand it to more than one session.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server over TCP and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let (handler, host_key_error) = SshHandler::new(&config);
        let addr = (config.host.clone(), config.port);
        debug!("connecting to {}", config.socket_addr());

        let session = within(config.timeout, async {
            client::connect(client_config(), addr, handler)
                .await
                .map_err(|e| connect_error(&config, &host_key_error, e))
        })
        .await?;

        Self::finish(session, config).await
    }

    /// Run the SSH protocol over an already-open stream and authenticate.
    pub async fn connect_stream(config: SshConfig, stream: BoxedStream) -> Result<Self> {
        let (handler, host_key_error) = SshHandler::new(&config);
        debug!("starting SSH over supplied stream for {}", config.socket_addr());

        let session = within(config.timeout, async {
            client::connect_stream(client_config(), stream, handler)
                .await
                .map_err(|e| connect_error(&config, &host_key_error, e))
        })
        .await?;

        Self::finish(session, config).await
    }

    /// Open the underlying stream through `factory`, then connect over it.
    pub async fn connect_with(config: SshConfig, factory: &dyn ConnectionFactory) -> Result<Self> {
        debug!("opening {} through connection factory", config.socket_addr());
        let stream = within(config.timeout, async {
            factory
                .open(&config.host, config.port)
                .await
                .map_err(|source| {
                    Error::from(TransportError::ConnectionFailed {
                        host: config.host.clone(),
                        port: config.port,
                        source,
                    })
                })
        })
        .await?;

        Self::connect_stream(config, stream).await
    }

    async fn finish(mut session: Handle<SshHandler>, config: SshConfig) -> Result<Self> {
        Self::authenticate(&mut session, &config).await?;
        debug!("authenticated to {} as {}", config.socket_addr(), config.username);
        Ok(Self { session, config })
    }

    /// Open a new session channel, allocate a PTY on it and start a shell.
    ///
    /// Returns the channel together with any messages that arrived before
    /// the shell request was acknowledged.
    pub async fn open_shell(&self) -> Result<(Channel<Msg>, Vec<ChannelMsg>)> {
        let mut channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        let mut early = Vec::new();

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(ChannelError::Ssh)?;
        await_reply(&mut channel, &mut early, ChannelError::PtyOpenFailed).await?;

        channel
            .request_shell(true)
            .await
            .map_err(ChannelError::Ssh)?;
        await_reply(&mut channel, &mut early, ChannelError::ShellRequestFailed).await?;

        debug!("shell started on channel {:?}", channel.id());
        Ok((channel, early))
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// The configuration this transport was opened with.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Disconnect the whole connection.
    pub async fn close(&self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

fn client_config() -> Arc<client::Config> {
    // Default config: no inactivity timeout.
    Arc::new(client::Config::default())
}

async fn within<T>(timeout: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::ConnectTimeout(limit))?,
        None => fut.await,
    }
}

fn connect_error(
    config: &SshConfig,
    host_key_error: &Mutex<Option<TransportError>>,
    error: russh::Error,
) -> Error {
    // If check_server_key stored a detailed error, use that instead
    // of the generic russh::Error::UnknownKey
    if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut e| e.take()) {
        return hk_err.into();
    }
    match error {
        russh::Error::IO(source) => TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        }
        .into(),
        other => TransportError::Ssh(other).into(),
    }
}

/// Wait for the reply to a `want_reply` channel request, keeping any
/// session output that arrives first.
async fn await_reply(
    channel: &mut Channel<Msg>,
    early: &mut Vec<ChannelMsg>,
    refused: ChannelError,
) -> Result<()> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err(refused.into()),
            Some(
                msg @ (ChannelMsg::Data { .. }
                | ChannelMsg::ExtendedData { .. }
                | ChannelMsg::Eof
                | ChannelMsg::Close),
            ) => early.push(msg),
            Some(other) => trace!("ignoring {:?} while awaiting reply", other),
            None => return Err(ChannelError::Closed.into()),
        }
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    fn new(config: &SshConfig) -> (Self, Arc<Mutex<Option<TransportError>>>) {
        let host_key_error = Arc::new(Mutex::new(None));
        let handler = Self {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };
        (handler, host_key_error)
    }

    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(
        &self,
        pubkey: &PublicKey,
    ) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
