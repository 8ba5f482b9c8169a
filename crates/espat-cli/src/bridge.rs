//! [`Transport`] over a TCP serial bridge.
//!
//! The modem's UART is exposed on a TCP port by a ser2net-style bridge. Bytes
//! written to the socket go to the modem's RX pin and everything the modem
//! transmits arrives on the socket. The socket is non-blocking so the driver's
//! polling loop stays in charge of timing.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;

use espat_driver::{ByteSink, Transport};
use tracing::{debug, warn};

/// Read chunk size.
const READ_CHUNK: usize = 256;

/// TCP connection to a serial bridge.
pub struct TcpBridge {
    stream: TcpStream,
    rx: VecDeque<u8>,
    closed: bool,
}

impl TcpBridge {
    /// Connect to the bridge at `addr`.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        debug!("TcpBridge: connected to {}", stream.peer_addr()?);
        Ok(TcpBridge {
            stream,
            rx: VecDeque::new(),
            closed: false,
        })
    }

    /// Whether the bridge closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move whatever the socket has pending into the receive queue.
    fn fill(&mut self) {
        if self.closed {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    warn!("TcpBridge: connection closed by bridge");
                    self.closed = true;
                    return;
                }
                Ok(n) => self.rx.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("TcpBridge: read error: {}", e);
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

impl ByteSink for TcpBridge {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            match self.stream.write(rest) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "bridge closed")),
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Transport for TcpBridge {
    fn bytes_available(&mut self) -> usize {
        self.fill();
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.pop_front()
    }

    fn discard_input(&mut self) {
        self.fill();
        self.rx.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    #[test]
    fn test_bridge_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut bridge = TcpBridge::connect(addr).unwrap();
        let (mut modem, _) = listener.accept().unwrap();

        bridge.write_bytes(b"AT\r\n").unwrap();
        let mut line = [0u8; 4];
        modem.read_exact(&mut line).unwrap();
        assert_eq!(&line, b"AT\r\n");

        modem.write_all(b"OK\r\n").unwrap();
        let mut received = Vec::new();
        for _ in 0..500 {
            while let Some(byte) = bridge.read_byte() {
                received.push(byte);
            }
            if received.len() == 4 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(received, b"OK\r\n");
    }

    #[test]
    fn test_bridge_detects_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut bridge = TcpBridge::connect(listener.local_addr().unwrap()).unwrap();
        let (modem, _) = listener.accept().unwrap();
        drop(modem);

        for _ in 0..500 {
            if bridge.read_byte().is_none() && bridge.is_closed() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(bridge.is_closed());
    }
}
