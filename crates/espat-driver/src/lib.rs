//! Driver for ESP8266 WiFi modems speaking the AT command set.
//!
//! The crate turns a polled byte [`Transport`] into a request/reply protocol:
//!
//! - [`TransactionEngine`]: timed line reads, reply matching and the
//!   mirrored debug trace
//! - [`Esp8266`]: the connection state machine (reset, WiFi join, TCP
//!   session, framed HTTP requests, close)
//!
//! Platform services are injected as capabilities ([`Delay`], [`ResetPin`],
//! a debug [`ByteSink`]), so the same driver runs against a serial port, a
//! TCP serial bridge, or the scripted [`mock::MockTransport`].
//!
//! # Example
//!
//! ```
//! use espat_driver::{mock::MockTransport, DriverConfig, Esp8266, NoDelay};
//!
//! let mock = MockTransport::new()
//!     .with_reply("AT+CIPSTATUS", "STATUS:2\r\n")
//!     .with_reply("AT+CIPSTART", "CONNECT\r\n\r\nOK\r\n");
//! let config = DriverConfig::default().with_read_timeout_ticks(5);
//! let mut modem = Esp8266::with_config(mock, NoDelay, config).unwrap();
//!
//! modem.connect_tcp("example.com", 80).unwrap();
//! assert_eq!(modem.host(), Some("example.com"));
//! ```

mod config;
mod engine;
mod error;
pub mod mock;
mod session;
mod transport;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use session::*;
pub use transport::*;
