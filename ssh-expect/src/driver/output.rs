//! Text accumulated by a `waitfor` or `cmd` call.

use std::borrow::Cow;
use std::fmt;

/// Everything received while waiting, after line-ending translation.
///
/// Kept as bytes because binary-mode sessions may receive data that is not
/// valid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    data: Vec<u8>,
}

impl Output {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The text, with invalid UTF-8 replaced.
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing was received.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        self.data
            .split(|&b| b == b'\n')
            .map(String::from_utf8_lossy)
    }

    /// Check if the text contains a substring.
    pub fn contains(&self, needle: &str) -> bool {
        memchr::memmem::find(&self.data, needle.as_bytes()).is_some()
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl PartialEq<str> for Output {
    fn eq(&self, other: &str) -> bool {
        self.data == other.as_bytes()
    }
}

impl PartialEq<&str> for Output {
    fn eq(&self, other: &&str) -> bool {
        self.data == other.as_bytes()
    }
}

impl AsRef<[u8]> for Output {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_views() {
        let output = Output::new(b"uptime\n 10:00 up 3 days\n$ ".to_vec());
        assert_eq!(output, "uptime\n 10:00 up 3 days\n$ ");
        assert!(output.contains("up 3 days"));
        assert_eq!(output.lines().count(), 3);
        assert_eq!(output.to_string(), "uptime\n 10:00 up 3 days\n$ ");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let output = Output::new(vec![b'o', b'k', 0xff]);
        assert_eq!(output.as_str_lossy(), "ok\u{fffd}");
        assert_eq!(output.as_bytes(), &[b'o', b'k', 0xff]);
    }
}
