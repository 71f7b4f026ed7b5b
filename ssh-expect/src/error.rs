//! Error types for ssh-expect.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ssh-expect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns `true` if this error reports the remote end closing the
    /// channel while a match was still pending.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Eof))
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Connecting did not complete in time
    #[error("timed out while opening a connection to the host ({0:?})")]
    ConnectTimeout(Duration),

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server presented a host key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server is not in known_hosts and strict checking is enabled
    #[error("Host {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),
}

/// Channel layer errors (remote shell setup and the expect loop).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The remote end refused the pseudo-terminal request
    #[error("Failed to open ssh pty")]
    PtyOpenFailed,

    /// The remote end refused to start a shell
    #[error("Failed to open ssh shell")]
    ShellRequestFailed,

    /// End of stream reached while waiting for a match with fail-on-EOF set
    #[error("End of file reached while waiting for a match")]
    Eof,

    /// Channel closed before the operation could complete
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Read or write failure on the underlying stream
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Configuration errors, raised before any connection attempt.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Binmode must be exactly `true` or `false`
    #[error("Binmode option must be true or false")]
    InvalidBinmode,

    /// An option had the wrong type or an unusable value
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// The option bag could not be parsed at all
    #[error("Malformed options: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A full connect needs a username
    #[error("Username is required to open a new connection")]
    MissingUsername,

    /// Prompt pattern did not compile
    #[error("Invalid prompt pattern: {0}")]
    InvalidPrompt(#[from] regex::Error),

    /// Log file could not be opened
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using ssh-expect's Error.
pub type Result<T> = std::result::Result<T, Error>;
