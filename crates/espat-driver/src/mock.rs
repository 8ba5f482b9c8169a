//! Scripted stand-ins for the platform capabilities.
//!
//! [`MockTransport`] plays the modem: each scripted reply is released into
//! the receive queue once the command that triggers it has been written.
//! Replies are not visible before their trigger, so the engine's
//! flush-before-write does not eat them.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::transport::{ByteSink, ResetPin, Transport};

/// A scripted modem.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Bytes waiting to be read.
    rx: VecDeque<u8>,
    /// Replies still waiting for their trigger, in order.
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Written bytes not yet matched against the next trigger.
    pending: Vec<u8>,
    /// Everything the driver wrote.
    written: Vec<u8>,
    /// Number of pending bytes dropped by `discard_input`.
    discarded: usize,
}

impl MockTransport {
    /// Create a mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `data` readable immediately (unsolicited output such as a boot banner).
    pub fn push_rx(&mut self, data: &[u8]) -> &mut Self {
        self.rx.extend(data.iter().copied());
        self
    }

    /// Release `reply` once the driver has written bytes containing `trigger`.
    ///
    /// Triggers are matched strictly in the order they were scripted.
    pub fn respond_to(&mut self, trigger: &str, reply: &str) -> &mut Self {
        self.script
            .push_back((trigger.as_bytes().to_vec(), reply.as_bytes().to_vec()));
        self
    }

    /// Builder form of [`respond_to`](Self::respond_to).
    pub fn with_reply(mut self, trigger: &str, reply: &str) -> Self {
        self.respond_to(trigger, reply);
        self
    }

    /// Everything the driver wrote, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written).to_string()
    }

    /// Number of scripted replies whose trigger never arrived.
    pub fn unconsumed_replies(&self) -> usize {
        self.script.len()
    }

    /// Number of bytes dropped by the driver's input flushes.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn release_replies(&mut self) {
        while let Some((trigger, _)) = self.script.front() {
            let found = self
                .pending
                .windows(trigger.len().max(1))
                .any(|window| trigger.is_empty() || window == &trigger[..]);
            if !found {
                break;
            }
            if let Some((_, reply)) = self.script.pop_front() {
                self.rx.extend(reply);
            }
            self.pending.clear();
        }
    }
}

impl ByteSink for MockTransport {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(data);
        self.pending.extend_from_slice(data);
        self.release_replies();
        Ok(())
    }
}

impl Transport for MockTransport {
    fn bytes_available(&mut self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn discard_input(&mut self) {
        self.discarded += self.rx.len();
        self.rx.clear();
    }
}

/// A cloneable in-memory [`ByteSink`], for inspecting mirrored traffic.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, as text.
    pub fn contents(&self) -> String {
        match self.data.lock() {
            Ok(data) => String::from_utf8_lossy(&data).to_string(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).to_string(),
        }
    }

    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect()
    }
}

impl ByteSink for MemorySink {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink lock poisoned"))?;
        guard.extend_from_slice(data);
        Ok(())
    }
}

/// A [`ResetPin`] that records reset pulses.
#[derive(Debug, Default, Clone)]
pub struct MockResetPin {
    pulses: Arc<Mutex<u32>>,
    asserted: Arc<Mutex<bool>>,
}

impl MockResetPin {
    /// Create a released pin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed assert/release cycles.
    pub fn pulses(&self) -> u32 {
        self.pulses.lock().map(|p| *p).unwrap_or(0)
    }

    /// Whether the line is currently held low.
    pub fn is_asserted(&self) -> bool {
        self.asserted.lock().map(|a| *a).unwrap_or(false)
    }
}

impl ResetPin for MockResetPin {
    fn assert_reset(&mut self) {
        if let Ok(mut asserted) = self.asserted.lock() {
            *asserted = true;
        }
    }

    fn release_reset(&mut self) {
        if let Ok(mut asserted) = self.asserted.lock() {
            if *asserted {
                if let Ok(mut pulses) = self.pulses.lock() {
                    *pulses += 1;
                }
            }
            *asserted = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_released_on_trigger() {
        let mut mock = MockTransport::new().with_reply("AT+GMR", "1.0\r\nOK\r\n");
        assert_eq!(mock.bytes_available(), 0);
        mock.write_bytes(b"AT+GMR\r\n").unwrap();
        assert_eq!(mock.bytes_available(), 9);
        assert_eq!(mock.read_byte(), Some(b'1'));
        assert_eq!(mock.unconsumed_replies(), 0);
    }

    #[test]
    fn test_triggers_fire_in_order() {
        let mut mock = MockTransport::new()
            .with_reply("AT+B", "second\r\n")
            .with_reply("AT+A", "first\r\n");
        mock.write_bytes(b"AT+A\r\n").unwrap();
        assert_eq!(mock.bytes_available(), 0);
        mock.write_bytes(b"AT+B\r\n").unwrap();
        assert_eq!(mock.bytes_available(), 8);
    }

    #[test]
    fn test_discard_counts_bytes() {
        let mut mock = MockTransport::new();
        mock.push_rx(b"noise");
        mock.discard_input();
        assert_eq!(mock.discarded(), 5);
        assert_eq!(mock.read_byte(), None);
    }

    #[test]
    fn test_memory_sink_lines() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_bytes(b"one\r\ntwo\r\n").unwrap();
        assert_eq!(sink.lines(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_reset_pin_counts_pulses() {
        let pin = MockResetPin::new();
        let mut handle = pin.clone();
        handle.assert_reset();
        assert!(pin.is_asserted());
        handle.release_reset();
        handle.release_reset();
        assert_eq!(pin.pulses(), 1);
        assert!(!pin.is_asserted());
    }
}
