//! Receive buffer and line-ending translation.
//!
//! Inbound bytes land in `pending` until the engine drains them. Outside
//! binary mode every CRLF is collapsed to LF. A CR at the very end of a read
//! may be the first half of a CRLF split across two reads, so it is held back
//! in the carry and merged into the next translation pass.

use bytes::{Bytes, BytesMut};
use log::trace;
use memchr::memmem;

use super::{ChannelEvents, EXTENDED_DATA_STDERR};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const EOL: &[u8] = b"\r\n";

/// Accumulator for bytes delivered by a channel adapter.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    /// Bytes received but not yet consumed by a match attempt.
    pending: BytesMut,

    /// Trailing CR withheld from the previous translation pass.
    carry: Option<u8>,

    /// Set once the channel has closed. Never reset.
    eof: bool,
}

impl ReceiveBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            pending: BytesMut::with_capacity(4096),
            carry: None,
            eof: false,
        }
    }

    /// Whether any received bytes are waiting to be drained.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the end of the stream has been observed.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Whether a CR is being held back.
    pub fn has_carry(&self) -> bool {
        self.carry.is_some()
    }

    /// Drain all pending bytes and translate them.
    ///
    /// Returns the raw bytes exactly as received together with the
    /// translated bytes.
    pub fn drain(&mut self, binmode: bool) -> (Bytes, Vec<u8>) {
        let raw = self.pending.split().freeze();
        let translated = translate(&mut self.carry, &raw, binmode);
        (raw, translated)
    }

    /// Release a held-back CR. Used at end of stream, where it can no longer
    /// be half of a pair.
    pub fn flush_carry(&mut self) -> Option<Vec<u8>> {
        self.carry.take().map(|b| vec![b])
    }
}

impl ChannelEvents for ReceiveBuffer {
    fn on_data(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    fn on_extended_data(&mut self, kind: u32, data: &[u8]) {
        if kind == EXTENDED_DATA_STDERR {
            self.pending.extend_from_slice(data);
        } else {
            trace!("ignoring {} bytes of extended data type {}", data.len(), kind);
        }
    }

    fn on_close(&mut self) {
        self.eof = true;
    }
}

/// Translate one read's worth of bytes.
///
/// In binary mode the bytes pass through untouched (a carry left over from
/// before binary mode was switched on is still emitted first). Otherwise the
/// carry is prepended, a trailing CR becomes the new carry, and CRLF pairs
/// collapse to LF.
pub fn translate(carry: &mut Option<u8>, data: &[u8], binmode: bool) -> Vec<u8> {
    let mut merged = Vec::with_capacity(data.len() + 1);
    merged.extend(carry.take());
    merged.extend_from_slice(data);

    if binmode {
        return merged;
    }

    if merged.last() == Some(&CR) {
        merged.pop();
        *carry = Some(CR);
    }

    collapse_eol(&merged)
}

fn collapse_eol(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut last = 0;
    for pos in memmem::find_iter(data, EOL) {
        out.extend_from_slice(&data[last..pos]);
        out.push(LF);
        last = pos + EOL.len();
    }
    out.extend_from_slice(&data[last..]);
    out
}
