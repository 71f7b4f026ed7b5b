//! Session log sinks.
//!
//! Two optional append-only sinks mirror the session:
//!
//! - the output log receives the translated text returned to the caller,
//! - the dump log receives raw bytes in both directions as hex dumps.
//!
//! Both are flushed after every write. Write failures are reported through
//! the `log` facade and never interrupt the session.

mod dump;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::warn;

pub use dump::{Direction, DumpRecord, hex_dump, parse_hex_dump};

use crate::error::ConfigError;

type Sink = Box<dyn Write + Send>;

/// The output and dump logs of one session.
#[derive(Default)]
pub struct LogSinks {
    output: Option<Sink>,
    dump: Option<Sink>,
}

impl LogSinks {
    /// Sinks that discard everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Open the given log files in append mode, creating them if needed.
    pub fn open(output: Option<&Path>, dump: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self {
            output: output.map(open_append).transpose()?,
            dump: dump.map(open_append).transpose()?,
        })
    }

    /// Use `writer` as the output log.
    pub fn with_output(mut self, writer: impl Write + Send + 'static) -> Self {
        self.output = Some(Box::new(writer));
        self
    }

    /// Use `writer` as the dump log.
    pub fn with_dump(mut self, writer: impl Write + Send + 'static) -> Self {
        self.dump = Some(Box::new(writer));
        self
    }

    /// Whether an output log is attached.
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Whether a dump log is attached.
    pub fn has_dump(&self) -> bool {
        self.dump.is_some()
    }

    /// Append translated session text to the output log.
    pub fn transcript(&mut self, text: &[u8]) {
        if let Some(sink) = self.output.as_mut() {
            append(sink, text, "output");
        }
    }

    /// Append a hex dump event to the dump log.
    pub fn dump(&mut self, direction: Direction, data: &[u8]) {
        if let Some(sink) = self.dump.as_mut() {
            append(sink, hex_dump(direction, data).as_bytes(), "dump");
        }
    }

    /// Record a local status message in both logs.
    pub fn message(&mut self, message: &str) {
        self.transcript(message.as_bytes());
        self.dump(Direction::Control, message.as_bytes());
    }

    /// Flush and release both sinks.
    pub fn close(&mut self) {
        for (sink, name) in [(self.output.take(), "output"), (self.dump.take(), "dump")] {
            if let Some(mut sink) = sink {
                if let Err(e) = sink.flush() {
                    warn!("Failed to flush {} log: {}", name, e);
                }
            }
        }
    }
}

impl fmt::Debug for LogSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSinks")
            .field("output", &self.output.is_some())
            .field("dump", &self.dump.is_some())
            .finish()
    }
}

fn open_append(path: &Path) -> Result<Sink, ConfigError> {
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ConfigError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Box::new(file))
}

fn append(sink: &mut Sink, data: &[u8], name: &str) {
    if let Err(e) = sink.write_all(data).and_then(|_| sink.flush()) {
        warn!("Failed to write {} log: {}", name, e);
    }
}
