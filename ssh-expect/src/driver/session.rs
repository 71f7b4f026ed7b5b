//! The send/expect engine.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

use super::config::SessionConfig;
use super::output::Output;
use super::request::{CommandRequest, MatchRequest, ResolvedMatch};
use crate::channel::{ChannelAdapter, ChannelEvents, ReceiveBuffer};
use crate::error::{ChannelError, Result};
use crate::logging::{Direction, LogSinks};

/// Longest single pump of the channel, so idle-gap expiry and end of
/// stream are noticed promptly.
const PUMP_SLICE: Duration = Duration::from_millis(100);

/// An expect session driving one shell channel.
///
/// Sends input with [`write`](Self::write), [`print`](Self::print) and
/// [`puts`](Self::puts), and waits for output with
/// [`waitfor`](Self::waitfor). [`cmd`](Self::cmd) combines the two.
///
/// # Example
///
/// ```rust,no_run
/// use ssh_expect::SessionBuilder;
///
/// # async fn example() -> Result<(), ssh_expect::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .connect()
///     .await?;
///
/// if let Some(output) = session.cmd("uname -a").await? {
///     println!("{}", output);
/// }
///
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ExpectSession<C: ChannelAdapter> {
    channel: C,
    config: SessionConfig,
    buffer: ReceiveBuffer,
    logs: LogSinks,

    /// Output received while waiting for the first prompt.
    greeting: Option<Output>,

    closed: bool,
}

impl<C: ChannelAdapter> ExpectSession<C> {
    /// Drive `channel` with the given defaults and no logs.
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self::with_logs(channel, config, LogSinks::none())
    }

    /// Drive `channel` with the given defaults, mirroring to `logs`.
    pub fn with_logs(channel: C, config: SessionConfig, logs: LogSinks) -> Self {
        Self {
            channel,
            config,
            buffer: ReceiveBuffer::new(),
            logs,
            greeting: None,
            closed: false,
        }
    }

    /// The session defaults.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The channel being driven.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Output received before the first prompt, if the session waited for one.
    pub fn greeting(&self) -> Option<&Output> {
        self.greeting.as_ref()
    }

    pub(crate) fn set_greeting(&mut self, greeting: Option<Output>) {
        self.greeting = greeting;
    }

    /// Whether the remote end has closed the channel.
    pub fn is_eof(&self) -> bool {
        self.buffer.is_eof()
    }

    /// Whether binary mode is on.
    pub fn binmode(&self) -> bool {
        self.config.binmode
    }

    /// Turn line-ending translation off (`true`) or on (`false`).
    pub fn set_binmode(&mut self, binmode: bool) {
        self.config.binmode = binmode;
    }

    /// Read until `request` matches.
    ///
    /// Returns the accumulated text, or `None` if the channel closed before
    /// anything at all was received.
    pub async fn waitfor(&mut self, request: impl Into<MatchRequest>) -> Result<Option<Output>> {
        self.waitfor_with(request, |_| {}).await
    }

    /// Like [`waitfor`](Self::waitfor), handing each translated chunk to
    /// `on_chunk` as it arrives.
    ///
    /// If the channel closes before anything was received, `on_chunk` is
    /// called once with `None`.
    pub async fn waitfor_with<F>(
        &mut self,
        request: impl Into<MatchRequest>,
        mut on_chunk: F,
    ) -> Result<Option<Output>>
    where
        F: FnMut(Option<&[u8]>) + Send,
    {
        let request: MatchRequest = request.into();
        let ResolvedMatch {
            pattern,
            timeout,
            waittime,
            fail_eof,
        } = request.resolve(&self.config)?;
        trace!(
            "waitfor {:?} (waittime {:?}, fail_eof {}, timeout {:?} left to transport)",
            pattern.as_str(),
            waittime,
            fail_eof,
            timeout
        );

        let mut line: Vec<u8> = Vec::new();

        loop {
            let matched = pattern.is_match(&line);

            if !self.buffer.has_pending() && !self.buffer.is_eof() {
                let ceiling = if matched || !waittime.is_zero() {
                    Some(waittime)
                } else {
                    None
                };
                if !self.await_activity(ceiling).await {
                    if !matched {
                        debug!("no output for {:?}, giving up on {:?}", waittime, pattern.as_str());
                    }
                    break;
                }
            }

            if self.buffer.has_pending() {
                let (raw, text) = self.buffer.drain(self.config.binmode);
                self.logs.dump(Direction::Inbound, &raw);
                self.accept(&mut line, &text, &mut on_chunk);
            } else if self.buffer.is_eof() {
                if let Some(rest) = self.buffer.flush_carry() {
                    self.accept(&mut line, &rest, &mut on_chunk);
                    continue;
                }
                if matched {
                    break;
                }
                debug!("end of stream before {:?} matched", pattern.as_str());
                if fail_eof {
                    return Err(ChannelError::Eof.into());
                }
                if line.is_empty() {
                    on_chunk(None);
                    return Ok(None);
                }
                break;
            }
        }

        Ok(Some(Output::new(line)))
    }

    /// Send `request`'s command with [`puts`](Self::puts), then wait for the
    /// session prompt (or the request's pattern).
    pub async fn cmd(&mut self, request: impl Into<CommandRequest>) -> Result<Option<Output>> {
        self.cmd_with(request, |_| {}).await
    }

    /// Like [`cmd`](Self::cmd), handing each chunk to `on_chunk`.
    pub async fn cmd_with<F>(
        &mut self,
        request: impl Into<CommandRequest>,
        on_chunk: F,
    ) -> Result<Option<Output>>
    where
        F: FnMut(Option<&[u8]>) + Send,
    {
        let CommandRequest { command, expect } = request.into();
        self.puts(&command).await?;
        self.waitfor_with(expect, on_chunk).await
    }

    /// Send bytes without any conversion.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.logs.dump(Direction::Outbound, data);
        self.channel.send_data(data).await
    }

    /// Send text. Outside binary mode each `\n` becomes the terminator.
    pub async fn print(&mut self, text: &str) -> Result<()> {
        if self.config.binmode {
            return self.write(text.as_bytes()).await;
        }
        let data = replace_newlines(text.as_bytes(), &self.config.terminator);
        self.write(&data).await
    }

    /// Send text followed by a newline.
    pub async fn puts(&mut self, text: &str) -> Result<()> {
        self.print(&format!("{}\n", text)).await
    }

    /// Close the channel (and the transport, if the channel owns it) and
    /// release the logs.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let result = self.channel.close().await;
        self.logs.close();
        debug!(
            "session closed{}",
            if self.channel.owns_transport() {
                " with its transport"
            } else {
                ""
            }
        );
        result
    }

    fn accept<F>(&mut self, line: &mut Vec<u8>, text: &[u8], on_chunk: &mut F)
    where
        F: FnMut(Option<&[u8]>),
    {
        if text.is_empty() {
            return;
        }
        self.logs.transcript(text);
        line.extend_from_slice(text);
        on_chunk(Some(text));
    }

    /// Pump until bytes are pending or the stream ends. With a ceiling,
    /// gives up once it elapses; the channel is always pumped at least once.
    /// A ceiling too far out to represent as an instant means no deadline.
    ///
    /// Returns whether anything happened.
    async fn await_activity(&mut self, ceiling: Option<Duration>) -> bool {
        let deadline = ceiling.and_then(|c| Instant::now().checked_add(c));
        loop {
            let slice = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()).min(PUMP_SLICE),
                None => PUMP_SLICE,
            };
            self.pump(slice).await;

            if self.buffer.has_pending() || self.buffer.is_eof() {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
        }
    }

    async fn pump(&mut self, slice: Duration) {
        if let Err(e) = self.channel.pump(slice, &mut self.buffer).await {
            debug!("read failed, treating as end of stream: {}", e);
            self.buffer.on_close();
        }
    }
}

impl<C: ChannelAdapter> Drop for ExpectSession<C> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("ExpectSession dropped without close(); channel left to the transport");
        }
        self.logs.close();
    }
}

fn replace_newlines(text: &[u8], terminator: &[u8]) -> Vec<u8> {
    if terminator == b"\n" {
        return text.to_vec();
    }
    let mut out = Vec::with_capacity(text.len());
    for &b in text {
        if b == b'\n' {
            out.extend_from_slice(terminator);
        } else {
            out.push(b);
        }
    }
    out
}
