//! Transaction engine: timed line reads and reply matching.
//!
//! The engine is the only path to the transport. Every transaction follows
//! the same order: drop stale input, write the command, then read. Each line
//! written or read is mirrored to the debug sink in the order it happened.
//!
//! ```text
//! > HOST:\tAT+CIPSTATUS
//! < DEVICE:\tSTATUS:3
//! ```

use std::borrow::Cow;
use std::time::Duration;

use espat_protocol::{Feed, LineCodec, Outcome, ReplyBuffer, Response};
use tracing::{trace, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use crate::transport::{ByteSink, Delay, Transport};

/// Prefix for mirrored outbound lines.
pub const REQUEST_MARKER: &str = "> HOST:\t";

/// Prefix for mirrored inbound lines.
pub const RESPONSE_MARKER: &str = "< DEVICE:\t";

/// Most bytes taken from the transport in one poll pass.
const POLL_CHUNK: usize = 512;

/// How a line read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A terminated line was read.
    Line,
    /// The line did not fit; the buffer holds the first bytes only.
    Truncated,
    /// The timeout expired before a terminator arrived.
    Timeout,
}

impl ReadStatus {
    /// Whether the read finished before the timeout (possibly truncated).
    pub fn is_complete(&self) -> bool {
        !matches!(self, ReadStatus::Timeout)
    }
}

/// Running counters for one engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Command lines written.
    pub commands_sent: u64,
    /// Raw payloads written.
    pub payloads_sent: u64,
    /// Line reads performed.
    pub reads: u64,
    /// Line reads that timed out.
    pub timeouts: u64,
    /// Line reads that overflowed the buffer.
    pub truncations: u64,
}

/// Sends commands and reads replies over a [`Transport`].
pub struct TransactionEngine<T, D> {
    transport: T,
    delay: D,
    debug: Option<Box<dyn ByteSink>>,
    buffer: ReplyBuffer,
    config: DriverConfig,
    last_status: ReadStatus,
    stats: EngineStats,
}

impl<T: Transport, D: Delay> TransactionEngine<T, D> {
    /// Create an engine over `transport`.
    pub fn new(transport: T, delay: D, config: DriverConfig) -> Self {
        TransactionEngine {
            transport,
            delay,
            debug: None,
            buffer: ReplyBuffer::new(),
            config,
            last_status: ReadStatus::Timeout,
            stats: EngineStats::default(),
        }
    }

    /// Mirror all traffic to `sink`.
    pub fn set_debug_sink(&mut self, sink: Box<dyn ByteSink>) {
        self.debug = Some(sink);
    }

    /// The configuration in use.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: DriverConfig) {
        self.config = config;
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The reply buffer as left by the last read.
    pub fn buffer(&self) -> &ReplyBuffer {
        &self.buffer
    }

    /// The last reply line as text.
    pub fn reply(&self) -> Cow<'_, str> {
        self.buffer.as_str()
    }

    /// How the last read ended.
    pub fn last_status(&self) -> ReadStatus {
        self.last_status
    }

    /// Counters since construction.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    // ========================================================================
    // Line Reader
    // ========================================================================

    /// Read one line into the reply buffer.
    ///
    /// Polls the transport; each pass drains at most [`POLL_CHUNK`] bytes,
    /// then sleeps one tick and spends one unit of `timeout_ticks`, so a peer
    /// that never sends `\n` cannot hold the read past its timeout. In
    /// multi-line mode `\n` is stored instead of ending the read, so only the
    /// timeout ends it.
    ///
    /// The buffer is cleared first and holds whatever arrived even when the
    /// read times out.
    pub fn read_line(&mut self, timeout_ticks: u32, multiline: bool) -> ReadStatus {
        self.buffer.clear();
        self.stats.reads += 1;

        let mut remaining = timeout_ticks;
        let status = 'poll: loop {
            for _ in 0..POLL_CHUNK {
                let byte = match self.transport.read_byte() {
                    Some(byte) => byte,
                    None => break,
                };
                if self.buffer.push(byte, multiline) == Feed::LineEnd {
                    let status = match self.buffer.overflowed() {
                        true => ReadStatus::Truncated,
                        false => ReadStatus::Line,
                    };
                    break 'poll status;
                }
            }

            if remaining == 0 {
                let status = match self.buffer.is_full() {
                    true => ReadStatus::Truncated,
                    false => ReadStatus::Timeout,
                };
                break status;
            }

            self.delay.delay(self.config.tick());
            remaining -= 1;
        };

        match status {
            ReadStatus::Timeout => self.stats.timeouts += 1,
            ReadStatus::Truncated => self.stats.truncations += 1,
            ReadStatus::Line => {}
        }

        trace!(
            "Esp8266[{}]: read {:?} '{}' ({} bytes)",
            self.config.name,
            status,
            self.buffer.as_str(),
            self.buffer.len()
        );

        self.last_status = status;
        status
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Drop any unread input (late replies, unsolicited notifications).
    pub fn flush_input(&mut self) {
        let pending = self.transport.bytes_available();
        if pending > 0 {
            trace!("Esp8266[{}]: discarding {} stale bytes", self.config.name, pending);
        }
        self.transport.discard_input();
    }

    /// Forget the last reply line.
    pub fn clear_reply(&mut self) {
        self.buffer.clear();
    }

    /// Sleep for `duration` using the engine's delay.
    pub fn pause(&mut self, duration: Duration) {
        self.delay.delay(duration);
    }

    /// Write one command line without reading anything back.
    ///
    /// The previous reply is discarded along with any stale input, so a
    /// following scan only sees lines produced after the write.
    pub fn send_command(&mut self, command: &str) -> DriverResult<()> {
        self.flush_input();
        self.buffer.clear();
        self.mirror(REQUEST_MARKER, command);
        trace!("Esp8266[{}]: sending '{}'", self.config.name, command);

        self.transport.write_bytes(&LineCodec::encode_command(command))?;
        self.stats.commands_sent += 1;
        Ok(())
    }

    /// Write raw payload bytes exactly as given (no terminator is added).
    pub fn write_payload(&mut self, payload: &[u8]) -> DriverResult<()> {
        self.flush_input();
        self.buffer.clear();
        self.mirror(REQUEST_MARKER, &String::from_utf8_lossy(payload));
        trace!("Esp8266[{}]: writing {} payload bytes", self.config.name, payload.len());

        self.transport.write_bytes(payload)?;
        self.stats.payloads_sent += 1;
        Ok(())
    }

    /// Write a plain diagnostic line to the debug sink.
    pub fn note(&mut self, message: &str) {
        self.mirror("", message);
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Read one line with the default timeout and mirror it.
    pub fn read_reply(&mut self) -> ReadStatus {
        let status = self.read_line(self.config.read_timeout_ticks, false);
        self.mirror_reply();
        status
    }

    /// Send `command` and read one reply line.
    ///
    /// With echo enabled the modem repeats the command first; that line is
    /// skipped so the buffer holds the actual reply.
    pub fn send_and_read(&mut self, command: &str, timeout_ticks: u32) -> DriverResult<ReadStatus> {
        self.send_command(command)?;
        let mut status = self.read_line(timeout_ticks, false);
        self.mirror_reply();

        if status == ReadStatus::Line && self.buffer.equals(command) {
            status = self.read_line(timeout_ticks, false);
            self.mirror_reply();
        }
        Ok(status)
    }

    /// Send `command` and check that the reply line equals `expected`.
    pub fn send_and_expect(
        &mut self,
        command: &str,
        expected: &str,
        timeout_ticks: u32,
    ) -> DriverResult<bool> {
        self.send_and_read(command, timeout_ticks)?;
        Ok(self.buffer.equals(expected))
    }

    /// Read one line without sending and check that it equals `expected`.
    pub fn expect(&mut self, expected: &str, timeout_ticks: u32) -> bool {
        self.read_line(timeout_ticks, false);
        self.mirror_reply();
        self.buffer.equals(expected)
    }

    /// Scan up to `max_attempts` lines for one that equals or contains `expected`.
    ///
    /// The line already in the buffer is checked before the first read, so a
    /// token that arrived as the reply to the preceding command counts. Every
    /// line read is checked, including the last one.
    pub fn expect_repeating(&mut self, expected: &str, max_attempts: u32) -> bool {
        if self.holds(expected) {
            return true;
        }
        for _ in 0..max_attempts {
            self.read_reply();
            if self.holds(expected) {
                return true;
            }
        }
        false
    }

    fn holds(&self, expected: &str) -> bool {
        self.buffer.equals(expected) || self.buffer.contains(expected)
    }

    /// Read fresh lines until one contains `target` or any of `sentinels`.
    ///
    /// Gives up after twice the default number of tries. The target is checked
    /// before the sentinels, and sentinels in the order given.
    pub fn find_among(&mut self, target: &str, sentinels: &[&str]) -> Outcome {
        for _ in 0..self.config.scan_attempts() {
            self.read_reply();

            if self.buffer.contains(target) {
                return Outcome::Matched(target.to_string());
            }
            if let Some(sentinel) = sentinels.iter().find(|s| self.buffer.contains(s)) {
                return Outcome::MatchedError(sentinel.to_string());
            }
        }

        if self.last_status == ReadStatus::Truncated {
            Outcome::BufferFull
        } else {
            Outcome::Timeout
        }
    }

    /// Describe why the last wait for `expected` failed.
    pub fn failure(&self, expected: &str) -> DriverError {
        match self.last_status {
            ReadStatus::Timeout => DriverError::Timeout {
                expected: expected.to_string(),
            },
            ReadStatus::Truncated => DriverError::BufferOverrun {
                expected: expected.to_string(),
                kept: self.buffer.len(),
            },
            ReadStatus::Line => DriverError::Mismatch {
                expected: expected.to_string(),
                received: self.buffer.as_str().to_string(),
            },
        }
    }

    /// Turn a non-matching [`Outcome`] into an error.
    pub fn outcome_error(&self, expected: &str, outcome: Outcome) -> DriverError {
        match outcome {
            Outcome::MatchedError(sentinel) => DriverError::SentinelMatched { sentinel },
            Outcome::BufferFull => DriverError::BufferOverrun {
                expected: expected.to_string(),
                kept: self.buffer.len(),
            },
            Outcome::Timeout | Outcome::Matched(_) => DriverError::Timeout {
                expected: expected.to_string(),
            },
        }
    }

    // ========================================================================
    // Mirroring
    // ========================================================================

    fn mirror_reply(&mut self) {
        if self.debug.is_some() {
            let line = self.buffer.as_str().to_string();
            self.mirror(RESPONSE_MARKER, &line);
        }
        if !self.buffer.is_empty() {
            trace!(
                "Esp8266[{}]: reply {:?}",
                self.config.name,
                Response::classify(&self.buffer.as_str())
            );
        }
    }

    fn mirror(&mut self, marker: &str, text: &str) {
        if let Some(sink) = self.debug.as_mut() {
            let line = format!("{}{}\r\n", marker, text);
            if let Err(e) = sink.write_bytes(line.as_bytes()) {
                warn!("Esp8266[{}]: debug sink write failed: {}", self.config.name, e);
            }
        }
    }
}
