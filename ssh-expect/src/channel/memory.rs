//! In-memory channel adapter.
//!
//! [`MemoryChannel`] plays the local side of a shell channel. The paired
//! [`MemoryRemote`] plays the remote shell: it pushes output, closes the
//! channel, injects read failures, and inspects what was written.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::trace;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{ChannelAdapter, ChannelEvents, EXTENDED_DATA_STDERR};
use crate::error::{ChannelError, Result};

#[derive(Debug)]
enum RemoteEvent {
    Data(Vec<u8>),
    Extended(u32, Vec<u8>),
    Close,
    Fail(io::ErrorKind),
}

/// Local side of an in-memory channel.
#[derive(Debug)]
pub struct MemoryChannel {
    events: mpsc::UnboundedReceiver<RemoteEvent>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

/// Remote side of an in-memory channel.
///
/// Dropping the remote counts as the remote closing the channel.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    events: mpsc::UnboundedSender<RemoteEvent>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Create a connected channel/remote pair.
    pub fn pair() -> (MemoryChannel, MemoryRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            MemoryChannel {
                events: rx,
                written: written.clone(),
                closed: closed.clone(),
            },
            MemoryRemote {
                events: tx,
                written,
                closed,
            },
        )
    }
}

impl MemoryRemote {
    /// Send output to the local side.
    pub fn send(&self, data: impl AsRef<[u8]>) {
        let _ = self.events.send(RemoteEvent::Data(data.as_ref().to_vec()));
    }

    /// Send output on the stderr stream.
    pub fn send_stderr(&self, data: impl AsRef<[u8]>) {
        let _ = self.events.send(RemoteEvent::Extended(
            EXTENDED_DATA_STDERR,
            data.as_ref().to_vec(),
        ));
    }

    /// Send extended data of an arbitrary type.
    pub fn send_extended(&self, kind: u32, data: impl AsRef<[u8]>) {
        let _ = self
            .events
            .send(RemoteEvent::Extended(kind, data.as_ref().to_vec()));
    }

    /// Close the channel from the remote end.
    pub fn close(&self) {
        let _ = self.events.send(RemoteEvent::Close);
    }

    /// Make the next pump fail with an I/O error.
    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.events.send(RemoteEvent::Fail(kind));
    }

    /// Everything the local side has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Whether the local side has closed the channel.
    pub fn is_closed_locally(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ChannelAdapter for MemoryChannel {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed.into());
        }
        if let Ok(mut written) = self.written.lock() {
            written.extend_from_slice(data);
        }
        Ok(())
    }

    async fn pump(&mut self, slice: Duration, events: &mut dyn ChannelEvents) -> Result<()> {
        let mut event = match tokio::time::timeout(slice, self.events.recv()).await {
            Err(_) => return Ok(()),
            Ok(None) => {
                events.on_close();
                return Ok(());
            }
            Ok(Some(event)) => event,
        };

        loop {
            trace!("memory channel event: {:?}", event);
            match event {
                RemoteEvent::Data(data) => events.on_data(&data),
                RemoteEvent::Extended(kind, data) => events.on_extended_data(kind, &data),
                RemoteEvent::Close => {
                    events.on_close();
                    return Ok(());
                }
                RemoteEvent::Fail(kind) => {
                    return Err(ChannelError::Io(io::Error::new(kind, "injected failure")).into());
                }
            }

            event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    events.on_close();
                    return Ok(());
                }
            };
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.events.close();
        Ok(())
    }

    fn owns_transport(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorded {
        data: Vec<u8>,
        ignored: Vec<u32>,
        closed: bool,
    }

    impl ChannelEvents for Recorded {
        fn on_data(&mut self, data: &[u8]) {
            self.data.extend_from_slice(data);
        }

        fn on_extended_data(&mut self, kind: u32, data: &[u8]) {
            if kind == EXTENDED_DATA_STDERR {
                self.data.extend_from_slice(data);
            } else {
                self.ignored.push(kind);
            }
        }

        fn on_close(&mut self) {
            self.closed = true;
        }
    }

    #[tokio::test]
    async fn test_pump_delivers_everything_queued() {
        let (mut channel, remote) = MemoryChannel::pair();
        remote.send("$ ");
        remote.send_extended(7, "window");
        remote.send("tail");

        let mut events = Recorded::default();
        channel.pump(Duration::ZERO, &mut events).await.unwrap();

        assert_eq!(events.data, b"$ tail");
        assert_eq!(events.ignored, vec![7]);
        assert!(!events.closed);
    }

    #[tokio::test]
    async fn test_pump_stops_at_close() {
        let (mut channel, remote) = MemoryChannel::pair();
        remote.send("bye");
        remote.close();
        remote.send("after close");

        let mut events = Recorded::default();
        channel.pump(Duration::ZERO, &mut events).await.unwrap();

        assert_eq!(events.data, b"bye");
        assert!(events.closed);
    }

    #[tokio::test]
    async fn test_pump_with_nothing_queued() {
        let (mut channel, _remote) = MemoryChannel::pair();

        let mut events = Recorded::default();
        channel.pump(Duration::ZERO, &mut events).await.unwrap();

        assert!(events.data.is_empty());
        assert!(!events.closed);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let (mut channel, remote) = MemoryChannel::pair();
        remote.send("partial");
        remote.fail(io::ErrorKind::ConnectionReset);

        let mut events = Recorded::default();
        let result = channel.pump(Duration::ZERO, &mut events).await;

        assert!(result.is_err());
        assert_eq!(events.data, b"partial");
    }

    #[tokio::test]
    async fn test_local_close_rejects_writes() {
        let (mut channel, remote) = MemoryChannel::pair();
        channel.send_data(b"ls\n").await.unwrap();
        channel.close().await.unwrap();

        assert!(remote.is_closed_locally());
        assert_eq!(remote.written(), b"ls\n");
        assert!(channel.send_data(b"pwd\n").await.is_err());
    }
}
