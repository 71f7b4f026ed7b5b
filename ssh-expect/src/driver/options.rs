//! String-keyed option bag.
//!
//! Accepts the classic `Host`/`Port`/`Prompt`/... option names as a JSON
//! object, for callers that keep session settings in configuration files.
//! Unknown keys are ignored.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use regex::bytes::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::builder::SessionBuilder;
use crate::error::ConfigError;

/// Session options keyed by their classic names.
///
/// # Example
///
/// ```rust
/// use ssh_expect::driver::Options;
///
/// let options = Options::from_json(r#"{
///     "Host": "router1",
///     "Username": "admin",
///     "Prompt": "[#>] \\z",
///     "Timeout": false,
///     "Waittime": 0.5
/// }"#).unwrap();
///
/// let builder = options.into_builder().unwrap();
/// assert_eq!(builder.config().host, "router1");
/// assert_eq!(builder.config().timeout, None);
/// ```
#[derive(Clone, Default, Deserialize)]
pub struct Options {
    #[serde(rename = "Host")]
    pub host: Option<String>,

    #[serde(rename = "Port")]
    pub port: Option<u16>,

    /// Regular expression source.
    #[serde(rename = "Prompt")]
    pub prompt: Option<String>,

    /// Seconds, or `false` to disable.
    #[serde(rename = "Timeout")]
    pub timeout: Option<TimeoutOption>,

    /// Seconds.
    #[serde(rename = "Waittime")]
    pub waittime: Option<f64>,

    #[serde(rename = "Terminator")]
    pub terminator: Option<String>,

    #[serde(rename = "Binmode")]
    pub binmode: Option<bool>,

    #[serde(rename = "FailEOF")]
    pub fail_eof: Option<bool>,

    #[serde(rename = "Output_log")]
    pub output_log: Option<PathBuf>,

    #[serde(rename = "Dump_log")]
    pub dump_log: Option<PathBuf>,

    #[serde(rename = "Username")]
    pub username: Option<String>,

    #[serde(rename = "Password")]
    pub password: Option<String>,
}

/// The `Timeout` option: a number of seconds, or a flag.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeoutOption {
    Seconds(f64),
    Enabled(bool),
}

impl Options {
    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Read options from an already parsed JSON value.
    ///
    /// A `Binmode` that is not a boolean is rejected before anything else
    /// is looked at.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if let Some(binmode) = value.get("Binmode") {
            if !binmode.is_boolean() {
                return Err(ConfigError::InvalidBinmode);
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Turn the options into a [`SessionBuilder`].
    pub fn into_builder(self) -> Result<SessionBuilder, ConfigError> {
        let mut builder = SessionBuilder::new(self.host.as_deref().unwrap_or("localhost"));

        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(prompt) = self.prompt {
            builder = builder.prompt(Regex::new(&prompt)?);
        }
        builder = match self.timeout {
            None => builder,
            Some(TimeoutOption::Enabled(false)) => builder.no_timeout(),
            Some(TimeoutOption::Enabled(true)) => {
                return Err(ConfigError::InvalidOption {
                    key: "Timeout".to_string(),
                    message: "expected a number of seconds or false".to_string(),
                });
            }
            Some(TimeoutOption::Seconds(secs)) => builder.timeout(seconds("Timeout", secs)?),
        };
        if let Some(waittime) = self.waittime {
            builder = builder.waittime(seconds("Waittime", waittime)?);
        }
        if let Some(terminator) = self.terminator {
            builder = builder.terminator(terminator.into_bytes());
        }
        if let Some(binmode) = self.binmode {
            builder = builder.binmode(binmode);
        }
        if let Some(fail_eof) = self.fail_eof {
            builder = builder.fail_eof(fail_eof);
        }
        if let Some(path) = self.output_log {
            builder = builder.output_log(path);
        }
        if let Some(path) = self.dump_log {
            builder = builder.dump_log(path);
        }
        if let Some(username) = self.username {
            builder = builder.username(username);
        }
        if let Some(password) = self.password {
            builder = builder.password(password);
        }

        Ok(builder)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("prompt", &self.prompt)
            .field("timeout", &self.timeout)
            .field("waittime", &self.waittime)
            .field("terminator", &self.terminator)
            .field("binmode", &self.binmode)
            .field("fail_eof", &self.fail_eof)
            .field("output_log", &self.output_log)
            .field("dump_log", &self.dump_log)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TryFrom<Options> for SessionBuilder {
    type Error = ConfigError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        options.into_builder()
    }
}

fn seconds(key: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidOption {
        key: key.to_string(),
        message: e.to_string(),
    })
}
