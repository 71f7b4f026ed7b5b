//! Session-wide defaults for the expect engine.

use std::time::Duration;

use regex::bytes::Regex;

use crate::channel::default_prompt;

/// Defaults applied to every `waitfor`/`cmd` call unless overridden.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host name, used in progress messages.
    pub host: String,

    /// Remote port.
    pub port: u16,

    /// Prompt that marks the shell as ready for the next command.
    pub prompt: Regex,

    /// Absolute timeout. Best effort: it bounds connection setup and is
    /// carried on each match request, but the wait loop does not enforce
    /// it as a deadline. `None` disables it.
    pub timeout: Option<Duration>,

    /// Idle-gap ceiling. Once the pattern matches, the engine lingers this
    /// long for further output; zero means it only takes what is already
    /// available. Before a match, a non-zero value gives up after this long
    /// without new output; zero waits indefinitely.
    pub waittime: Duration,

    /// Bytes substituted for each `\n` sent through `print`/`puts`.
    pub terminator: Vec<u8>,

    /// Binary mode: no line-ending translation in either direction.
    pub binmode: bool,

    /// Whether `waitfor` fails when the channel closes before a match.
    pub fail_eof: bool,
}

impl SessionConfig {
    /// Defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            prompt: default_prompt(),
            timeout: Some(Duration::from_secs(10)),
            waittime: Duration::ZERO,
            terminator: b"\n".to_vec(),
            binmode: false,
            fail_eof: false,
        }
    }
}
