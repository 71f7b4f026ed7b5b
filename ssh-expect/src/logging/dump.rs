//! Hex dump formatting for the session dump log.
//!
//! Each event is rendered as lines of 16 bytes:
//!
//! ```text
//! < 0x00000: 65 63 68 6f  20 68 65 6c  6c 6f 0d 0a  68 65 6c 6c  echo hello..hell
//! < 0x00010: 6f 0d 0a 24  20                                     o..$
//!
//! ```
//!
//! followed by a blank line.

use std::fmt::{self, Write as _};

const BYTES_PER_LINE: usize = 16;
const BYTES_PER_GROUP: usize = 4;

/// Direction tag of a dump event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes received from the remote end.
    Inbound,
    /// Bytes sent to the remote end.
    Outbound,
    /// Local status messages (connecting, connect errors).
    Control,
}

impl Direction {
    /// The single-character tag written at the start of each dump line.
    pub fn tag(self) -> char {
        match self {
            Direction::Inbound => '<',
            Direction::Outbound => '>',
            Direction::Control => '#',
        }
    }

    /// Parse a tag back into a direction.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            '<' => Some(Direction::Inbound),
            '>' => Some(Direction::Outbound),
            '#' => Some(Direction::Control),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(self.tag())
    }
}

/// Render one dump event.
pub fn hex_dump(direction: Direction, data: &[u8]) -> String {
    let lines = data.len().div_ceil(BYTES_PER_LINE);
    let mut out = String::with_capacity(lines * 80 + 1);

    for (index, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{} 0x{:05x}: ", direction, index * BYTES_PER_LINE);

        for slot in 0..BYTES_PER_LINE {
            match line.get(slot) {
                Some(byte) => {
                    let _ = write!(out, "{:02x}", byte);
                }
                None => out.push_str("  "),
            }
            out.push_str(if slot % BYTES_PER_GROUP == BYTES_PER_GROUP - 1 {
                "  "
            } else {
                " "
            });
        }

        out.extend(line.iter().map(|&b| {
            if (0x20..=0x7e).contains(&b) {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }

    out.push('\n');
    out
}

/// One event recovered from a dump log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub direction: Direction,
    pub data: Vec<u8>,
}

/// Recover the raw bytes of every event in a dump log.
///
/// Only the hex columns are read; the text rendering is ignored. Returns
/// `None` if a line is not in dump format.
pub fn parse_hex_dump(text: &str) -> Option<Vec<DumpRecord>> {
    // "xx xx xx xx  " per group
    const HEX_WIDTH: usize = (BYTES_PER_LINE / BYTES_PER_GROUP) * (BYTES_PER_GROUP * 3 + 1);

    let mut records = Vec::new();
    let mut current: Option<DumpRecord> = None;

    for line in text.lines() {
        if line.is_empty() {
            records.extend(current.take());
            continue;
        }

        let direction = Direction::from_tag(line.chars().next()?)?;
        let start = line.find(": ")? + 2;
        let hex = line.get(start..start + HEX_WIDTH)?;

        let record = current.get_or_insert_with(|| DumpRecord {
            direction,
            data: Vec::new(),
        });
        if record.direction != direction {
            return None;
        }
        for pair in hex.split_whitespace() {
            record.data.push(u8::from_str_radix(pair, 16).ok()?);
        }
    }

    records.extend(current);
    Some(records)
}
