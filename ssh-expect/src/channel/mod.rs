//! Channel layer: the byte-stream abstraction the expect engine drives,
//! plus receive buffering, line-ending translation and prompt patterns.
//!
//! The engine never talks to russh directly. It consumes a
//! [`ChannelAdapter`], pumps it in short slices, and receives inbound
//! notifications through [`ChannelEvents`].

mod buffer;
mod memory;
mod patterns;

use std::future::Future;
use std::time::Duration;

pub use buffer::{ReceiveBuffer, translate};
pub use memory::{MemoryChannel, MemoryRemote};
pub use patterns::{Pattern, default_prompt};

use crate::error::Result;

/// Extended data type code for stderr on an SSH channel.
pub const EXTENDED_DATA_STDERR: u32 = 1;

/// Receiver for inbound channel notifications.
pub trait ChannelEvents: Send {
    /// Regular channel data arrived.
    fn on_data(&mut self, data: &[u8]);

    /// Extended data (e.g. stderr, kind 1) arrived.
    fn on_extended_data(&mut self, kind: u32, data: &[u8]);

    /// The remote end closed the channel.
    fn on_close(&mut self);
}

/// A bidirectional byte stream to a remote shell.
pub trait ChannelAdapter: Send {
    /// Send bytes to the remote shell unmodified.
    fn send_data(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Drive pending I/O for at most `slice`, delivering whatever arrives to
    /// `events`. Once something arrives, everything already queued behind it
    /// is delivered in the same call. Returning early with nothing delivered
    /// is allowed.
    fn pump(
        &mut self,
        slice: Duration,
        events: &mut dyn ChannelEvents,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Close the channel, and the transport too if this adapter owns it.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether closing this channel also tears down the transport.
    fn owns_transport(&self) -> bool;
}
