//! ESP8266 AT Protocol
//!
//! This crate provides the wire vocabulary for talking to an ESP8266 (or any
//! modem running the Espressif AT firmware) over a serial link. It does no I/O
//! of its own; the driver crate owns the transport and the timing loop and
//! uses the types here to decide what to write and how to read what comes back.
//!
//! # Protocol Overview
//!
//! The AT protocol is a line-based text interface:
//!
//! - **Commands** (host → modem): ASCII lines starting with `AT`, terminated with `\r\n`
//! - **Replies** (modem → host): ASCII lines terminated with `\r\n`, usually ending
//!   with a final `OK` or `ERROR`
//! - **Notifications** (modem → host): unsolicited lines such as `WIFI CONNECTED`,
//!   `WIFI GOT IP` or `+IPD,<len>:<data>` that may arrive between command replies
//!
//! Payload data for an open TCP session is framed by a length announcement
//! (`AT+CIPSEND=<n>`); the modem answers with a `> ` prompt and then consumes
//! exactly `n` raw bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use espat_protocol::{Command, HttpRequest, ReplyBuffer, Response};
//!
//! // Build a command line
//! let cmd = Command::TcpStart { host: "example.com".to_string(), port: 80 };
//! let line = cmd.encode();
//!
//! // Frame a GET request for the open session
//! let request = HttpRequest::get("/x", "example.com");
//! let announce = Command::Send { length: request.encoded_len() };
//! ```

mod codec;
mod commands;
mod error;
mod request;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use request::*;
pub use responses::*;
