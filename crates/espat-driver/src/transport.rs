//! Platform capabilities consumed by the driver.
//!
//! The driver never touches hardware directly. It is handed:
//! - a [`Transport`]: the duplex byte channel to the modem
//! - a [`Delay`]: how to wait one polling tick
//! - optionally a [`ResetPin`] wired to the modem's RST line
//! - optionally a debug [`ByteSink`] that mirrors all traffic
//!
//! Both the transport and the debug sink implement [`ByteSink`]; the
//! transaction engine composes them instead of one being a subtype of the other.

use std::io;
use std::thread;
use std::time::Duration;

/// Anything bytes can be written to.
pub trait ByteSink {
    /// Write all of `data`.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_bytes(data)
    }
}

/// Duplex byte channel to the modem.
///
/// Reads never block: [`read_byte`](Transport::read_byte) returns `None` when
/// nothing is pending and the caller decides how long to keep polling.
pub trait Transport: ByteSink {
    /// Number of bytes that can be read without waiting.
    fn bytes_available(&mut self) -> usize;

    /// Read one pending byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Drop every pending byte.
    fn discard_input(&mut self) {
        while self.read_byte().is_some() {}
    }
}

/// Blocking sleep used between polls.
pub trait Delay {
    /// Wait for `duration`.
    fn delay(&mut self, duration: Duration);
}

/// Modem reset line (active low, open drain).
pub trait ResetPin {
    /// Pull the reset line low.
    fn assert_reset(&mut self);

    /// Release the reset line back to high impedance.
    fn release_reset(&mut self);
}

/// [`Delay`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// [`Delay`] that returns immediately.
///
/// Timeouts then count polls instead of wall-clock time, which keeps
/// scripted tests deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay(&mut self, _duration: Duration) {}
}

/// [`ByteSink`] over any [`io::Write`] (stderr, a log file, ...).
#[derive(Debug)]
pub struct IoSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> IoSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        IoSink { inner }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> ByteSink for IoSink<W> {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)?;
        self.inner.flush()
    }
}

impl ByteSink for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}
