//! Per-call overrides for `waitfor` and `cmd`.

use std::time::Duration;

use regex::bytes::Regex;

use super::config::SessionConfig;
use crate::channel::Pattern;
use crate::error::ChannelError;

/// What a single `waitfor` call waits for, and how.
///
/// Anything left unset falls back to the session's [`SessionConfig`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ssh_expect::driver::MatchRequest;
///
/// let request = MatchRequest::string("Password:")
///     .with_waittime(Duration::from_secs(2))
///     .with_fail_eof(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    /// Pattern to wait for. `None` means the session prompt.
    pub pattern: Option<Pattern>,

    /// Absolute timeout override. `Some(None)` disables it.
    pub timeout: Option<Option<Duration>>,

    /// Idle-gap override.
    pub waittime: Option<Duration>,

    /// Fail-on-EOF override.
    pub fail_eof: Option<bool>,
}

impl MatchRequest {
    /// Wait for the session prompt with session defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a regular expression.
    pub fn matching(pattern: Regex) -> Self {
        Self {
            pattern: Some(Pattern::Regex(pattern)),
            ..Self::default()
        }
    }

    /// Same as [`matching`](Self::matching).
    pub fn prompt(pattern: Regex) -> Self {
        Self::matching(pattern)
    }

    /// Wait for a literal string.
    pub fn string(text: impl Into<String>) -> Self {
        Self {
            pattern: Some(Pattern::literal(text)),
            ..Self::default()
        }
    }

    /// Override the absolute timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Some(timeout));
        self
    }

    /// Disable the absolute timeout for this call.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = Some(None);
        self
    }

    /// Override the idle-gap ceiling.
    pub fn with_waittime(mut self, waittime: Duration) -> Self {
        self.waittime = Some(waittime);
        self
    }

    /// Override fail-on-EOF.
    pub fn with_fail_eof(mut self, fail_eof: bool) -> Self {
        self.fail_eof = Some(fail_eof);
        self
    }

    /// Merge with the session defaults.
    pub(crate) fn resolve(&self, config: &SessionConfig) -> Result<ResolvedMatch, ChannelError> {
        let pattern = match &self.pattern {
            Some(pattern) => pattern.compile()?,
            None => config.prompt.clone(),
        };
        Ok(ResolvedMatch {
            pattern,
            timeout: self.timeout.unwrap_or(config.timeout),
            waittime: self.waittime.unwrap_or(config.waittime),
            fail_eof: self.fail_eof.unwrap_or(config.fail_eof),
        })
    }
}

impl From<Regex> for MatchRequest {
    fn from(pattern: Regex) -> Self {
        Self::matching(pattern)
    }
}

impl From<Pattern> for MatchRequest {
    fn from(pattern: Pattern) -> Self {
        Self {
            pattern: Some(pattern),
            ..Self::default()
        }
    }
}

/// A bare string is matched literally.
impl From<&str> for MatchRequest {
    fn from(text: &str) -> Self {
        Self::string(text)
    }
}

impl From<String> for MatchRequest {
    fn from(text: String) -> Self {
        Self::string(text)
    }
}

/// A fully resolved match request.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedMatch {
    pub pattern: Regex,
    pub timeout: Option<Duration>,
    pub waittime: Duration,
    pub fail_eof: bool,
}

/// A command line to send, and what to wait for afterwards.
///
/// Without overrides the session prompt is awaited.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Sent through `puts`, so a newline is appended.
    pub command: String,

    /// What to wait for after sending.
    pub expect: MatchRequest,
}

impl CommandRequest {
    /// Send `command` and wait for the session prompt.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            expect: MatchRequest::new(),
        }
    }

    /// Wait for `pattern` instead of the session prompt.
    pub fn matching(mut self, pattern: Regex) -> Self {
        self.expect.pattern = Some(Pattern::Regex(pattern));
        self
    }

    /// Wait for a literal string instead of the session prompt.
    pub fn until_string(mut self, text: impl Into<String>) -> Self {
        self.expect.pattern = Some(Pattern::literal(text));
        self
    }

    /// Override the absolute timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.expect = self.expect.with_timeout(timeout);
        self
    }

    /// Override the idle-gap ceiling.
    pub fn with_waittime(mut self, waittime: Duration) -> Self {
        self.expect = self.expect.with_waittime(waittime);
        self
    }

    /// Override fail-on-EOF.
    pub fn with_fail_eof(mut self, fail_eof: bool) -> Self {
        self.expect = self.expect.with_fail_eof(fail_eof);
        self
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for CommandRequest {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}
