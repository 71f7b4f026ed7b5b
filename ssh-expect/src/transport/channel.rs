//! Channel adapter over a russh shell channel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::ssh::SshTransport;
use crate::channel::{ChannelAdapter, ChannelEvents};
use crate::error::{ChannelError, Result};

/// A shell channel on an SSH transport.
///
/// Whether closing the channel also disconnects the transport is decided
/// when the channel is opened and never changes.
pub struct RusshChannel {
    channel: Channel<Msg>,

    /// Messages received before the shell was acknowledged.
    backlog: VecDeque<ChannelMsg>,

    transport: Arc<SshTransport>,

    owns_transport: bool,
}

impl RusshChannel {
    /// Open a shell on a transport this channel will own.
    pub async fn open_owned(transport: SshTransport) -> Result<Self> {
        Self::open(Arc::new(transport), true).await
    }

    /// Open a shell on a transport shared with other channels.
    pub async fn open_shared(transport: Arc<SshTransport>) -> Result<Self> {
        Self::open(transport, false).await
    }

    async fn open(transport: Arc<SshTransport>, owns_transport: bool) -> Result<Self> {
        let (channel, early) = transport.open_shell().await?;
        Ok(Self {
            channel,
            backlog: early.into(),
            transport,
            owns_transport,
        })
    }

    /// The transport this channel runs on.
    pub fn transport(&self) -> &Arc<SshTransport> {
        &self.transport
    }

    fn deliver(msg: Option<ChannelMsg>, events: &mut dyn ChannelEvents) {
        match msg {
            Some(ChannelMsg::Data { data }) => events.on_data(&data[..]),
            Some(ChannelMsg::ExtendedData { data, ext }) => events.on_extended_data(ext, &data[..]),
            Some(ChannelMsg::Close) | None => events.on_close(),
            Some(ChannelMsg::Eof) => debug!("remote sent EOF"),
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                debug!("remote shell exited with status {}", exit_status)
            }
            Some(other) => trace!("ignoring channel message {:?}", other),
        }
    }
}

impl ChannelAdapter for RusshChannel {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn pump(&mut self, slice: Duration, events: &mut dyn ChannelEvents) -> Result<()> {
        let mut wait = slice;
        // After the first message, take only what is already queued.
        loop {
            let msg = match self.backlog.pop_front() {
                Some(msg) => Some(msg),
                None => match tokio::time::timeout(wait, self.channel.wait()).await {
                    Ok(msg) => msg,
                    Err(_) => return Ok(()),
                },
            };
            let closed = matches!(msg, Some(ChannelMsg::Close) | None);
            Self::deliver(msg, events);
            if closed {
                return Ok(());
            }
            wait = Duration::ZERO;
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close().await {
            debug!("channel already closed: {}", e);
        }
        if self.owns_transport {
            self.transport.close().await?;
        }
        Ok(())
    }

    fn owns_transport(&self) -> bool {
        self.owns_transport
    }
}
