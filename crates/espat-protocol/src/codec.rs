//! Line accumulation and command encoding.
//!
//! The modem terminates every reply line with `\r\n`. Replies are collected
//! byte by byte into a bounded [`ReplyBuffer`]; the rules for which bytes are
//! kept and which byte ends a line live here so the driver's timeout loop only
//! has to decide *when* to stop waiting.

use bytes::{BufMut, BytesMut};
use std::borrow::Cow;

/// Maximum number of bytes stored for one reply line.
pub const MAX_LINE_LENGTH: usize = 254;

/// Line terminator appended to every command written to the modem.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// What happened to a byte fed into a [`ReplyBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The byte was stored.
    Stored,
    /// The byte was discarded (`\r`, or a `\n` before any content).
    Skipped,
    /// The buffer is full; the byte was dropped.
    Dropped,
    /// A `\n` ended a single-line read.
    LineEnd,
}

/// A bounded buffer holding the most recent reply line.
///
/// The buffer is cleared at the start of every read attempt and overwritten by
/// it, whether the read succeeds or not, so callers must consume its contents
/// before issuing the next read.
#[derive(Debug)]
pub struct ReplyBuffer {
    /// Stored reply bytes (never more than [`MAX_LINE_LENGTH`]).
    buffer: BytesMut,
    /// Set when at least one byte was dropped since the last clear.
    overflowed: bool,
}

impl Default for ReplyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyBuffer {
    /// Create an empty reply buffer.
    pub fn new() -> Self {
        ReplyBuffer {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
            overflowed: false,
        }
    }

    /// Discard all stored bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed one received byte.
    ///
    /// `\r` is always discarded. A `\n` before any content is a leftover from
    /// the previous line and is ignored. Otherwise a `\n` ends the line in
    /// single-line mode; in multi-line mode it is stored so that several
    /// physical lines fold into one buffer.
    pub fn push(&mut self, byte: u8, multiline: bool) -> Feed {
        match byte {
            b'\r' => return Feed::Skipped,
            b'\n' if self.buffer.is_empty() => return Feed::Skipped,
            b'\n' if !multiline => return Feed::LineEnd,
            _ => {}
        }

        if self.buffer.len() >= MAX_LINE_LENGTH {
            self.overflowed = true;
            return Feed::Dropped;
        }

        self.buffer.put_u8(byte);
        Feed::Stored
    }

    /// Whether the buffer holds [`MAX_LINE_LENGTH`] bytes.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= MAX_LINE_LENGTH
    }

    /// Whether bytes were dropped since the last clear.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Number of stored bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The stored bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The stored bytes as text (lossy for non-UTF-8 input).
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Exact byte-for-byte comparison with `token`.
    pub fn equals(&self, token: &str) -> bool {
        &self.buffer[..] == token.as_bytes()
    }

    /// Substring search for `token`. An empty token is always found.
    pub fn contains(&self, token: &str) -> bool {
        let needle = token.as_bytes();
        if needle.is_empty() {
            return true;
        }
        self.buffer.windows(needle.len()).any(|window| window == needle)
    }
}

/// Encoding helpers for lines written to the modem.
pub struct LineCodec;

impl LineCodec {
    /// Encode a command for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + LINE_TERMINATOR.len());
        buf.extend_from_slice(cmd.as_bytes());
        buf.extend_from_slice(LINE_TERMINATOR);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buffer: &mut ReplyBuffer, data: &[u8], multiline: bool) -> Option<Feed> {
        for &byte in data {
            if buffer.push(byte, multiline) == Feed::LineEnd {
                return Some(Feed::LineEnd);
            }
        }
        None
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(LineCodec::encode_command("AT+RST"), b"AT+RST\r\n");
    }

    #[test]
    fn test_single_line_strips_terminator() {
        let mut buffer = ReplyBuffer::new();
        assert_eq!(feed(&mut buffer, b"OK\r\nrest", false), Some(Feed::LineEnd));
        assert!(buffer.equals("OK"));
    }

    #[test]
    fn test_leading_newline_is_ignored() {
        let mut buffer = ReplyBuffer::new();
        assert_eq!(buffer.push(b'\n', false), Feed::Skipped);
        assert_eq!(buffer.push(b'\r', false), Feed::Skipped);
        assert_eq!(buffer.push(b'\n', false), Feed::Skipped);
        assert!(buffer.is_empty());
        assert_eq!(feed(&mut buffer, b"CONNECT\n", false), Some(Feed::LineEnd));
        assert!(buffer.equals("CONNECT"));
    }

    #[test]
    fn test_multiline_keeps_newlines() {
        let mut buffer = ReplyBuffer::new();
        assert_eq!(feed(&mut buffer, b"\r\nline1\r\nline2\r\n", true), None);
        assert_eq!(buffer.as_bytes(), b"line1\nline2\n");
    }

    #[test]
    fn test_overflow_drops_excess() {
        let mut buffer = ReplyBuffer::new();
        let long = vec![b'x'; MAX_LINE_LENGTH + 20];
        assert_eq!(feed(&mut buffer, &long, false), None);
        assert_eq!(buffer.len(), MAX_LINE_LENGTH);
        assert!(buffer.is_full());
        assert!(buffer.overflowed());
        // Terminator is still recognized once full.
        assert_eq!(buffer.push(b'\n', false), Feed::LineEnd);
    }

    #[test]
    fn test_exactly_full_is_not_overflow() {
        let mut buffer = ReplyBuffer::new();
        let exact = vec![b'y'; MAX_LINE_LENGTH];
        feed(&mut buffer, &exact, false);
        assert!(buffer.is_full());
        assert!(!buffer.overflowed());
    }

    #[test]
    fn test_equals_and_contains() {
        let mut buffer = ReplyBuffer::new();
        feed(&mut buffer, b"+IPD,12:hello\n", false);
        assert!(buffer.equals("+IPD,12:hello"));
        assert!(buffer.contains("+IPD,12:hello"));
        assert!(buffer.contains("+IPD"));
        assert!(!buffer.equals("+IPD"));
        assert!(!buffer.contains("SEND OK"));
        assert!(buffer.contains(""));
    }

    #[test]
    fn test_clear_resets_overflow() {
        let mut buffer = ReplyBuffer::new();
        feed(&mut buffer, &vec![b'z'; MAX_LINE_LENGTH + 1], false);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.overflowed());
    }
}
