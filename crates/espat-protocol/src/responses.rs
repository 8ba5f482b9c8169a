//! Reply tokens and line classification.
//!
//! Replies from the modem are single lines such as:
//! - Final results: `OK`, `ERROR`, `SEND OK`
//! - Connection notifications: `CONNECT`, `CLOSED`, `WIFI CONNECTED`, `WIFI GOT IP`
//! - Data notifications: `+IPD,<len>:<data>`
//! - Query results: `STATUS:<n>`, `+CIFSR:STAIP,"<ip>"`

use log::trace;

use crate::error::{ProtocolError, ProtocolResult};

/// Final success result.
pub const TOKEN_OK: &str = "OK";
/// Final error result.
pub const TOKEN_ERROR: &str = "ERROR";
/// TCP connection opened.
pub const TOKEN_CONNECT: &str = "CONNECT";
/// TCP close acknowledgment.
pub const TOKEN_CLOSE: &str = "CLOSE";
/// Station associated with the access point.
pub const TOKEN_WIFI_CONNECTED: &str = "WIFI CONNECTED";
/// Station obtained an IP address.
pub const TOKEN_WIFI_GOT_IP: &str = "WIFI GOT IP";
/// Station lost the access point.
pub const TOKEN_WIFI_DISCONNECT: &str = "WIFI DISCONNECT";
/// Payload accepted by the modem.
pub const TOKEN_SEND_OK: &str = "SEND OK";
/// Payload rejected by the modem.
pub const TOKEN_SEND_FAIL: &str = "SEND FAIL";
/// Incoming network data notification prefix.
pub const TOKEN_IPD: &str = "+IPD";
/// Prompt sent after a length announcement, ready for payload bytes.
pub const TOKEN_PROMPT: &str = "> ";
/// `AT+CIPSTATUS` reply while a TCP connection is open.
pub const TOKEN_STATUS_CONNECTED: &str = "STATUS:3";
/// Marker that Ubidots includes in its POST reply body.
pub const TOKEN_STATUS_CODE: &str = "status_code";
/// Firmware is busy with a previous command.
pub const TOKEN_BUSY: &str = "busy";

/// Boot marker printed by the firmware after a restart.
pub const DEFAULT_BOOT_MARKER: &str = "ready\r\n";

/// Capacity of the boot marker, including the terminating byte.
pub const BOOT_MARKER_CAPACITY: usize = 50;

/// Result of a reply-matching operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The target token was found.
    Matched(String),
    /// One of the sentinel error tokens was found.
    MatchedError(String),
    /// Neither target nor sentinel appeared within the attempt budget.
    Timeout,
    /// The line overflowed the reply buffer without a match.
    BufferFull,
}

impl Outcome {
    /// Whether the target token was found.
    pub fn is_matched(&self) -> bool {
        matches!(self, Outcome::Matched(_))
    }
}

/// Connection status reported by `AT+CIPSTATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Station connected to an AP and has an IP (2).
    GotIp,
    /// A TCP or UDP transmission is open (3).
    Connected,
    /// The transmission was closed (4).
    Disconnected,
    /// Station is not connected to an AP (5).
    NoAp,
    /// Any other code.
    Other(u8),
}

impl From<u8> for LinkStatus {
    fn from(code: u8) -> Self {
        match code {
            2 => LinkStatus::GotIp,
            3 => LinkStatus::Connected,
            4 => LinkStatus::Disconnected,
            5 => LinkStatus::NoAp,
            other => LinkStatus::Other(other),
        }
    }
}

/// Classified reply line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `OK`.
    Ok,
    /// `ERROR` or `FAIL`.
    Error,
    /// `CONNECT` or `ALREADY CONNECTED`.
    Connect,
    /// `CLOSED` or `CLOSE`.
    Closed,
    /// `WIFI CONNECTED`.
    WifiConnected,
    /// `WIFI GOT IP`.
    WifiGotIp,
    /// `WIFI DISCONNECT`.
    WifiDisconnect,
    /// `SEND OK`.
    SendOk,
    /// `SEND FAIL`.
    SendFail,
    /// `busy p...` / `busy s...`.
    Busy,
    /// `> ` payload prompt.
    Prompt,
    /// The firmware finished booting.
    Ready,
    /// `+IPD,<len>` data notification.
    Ipd {
        /// Announced payload length.
        length: usize,
    },
    /// `STATUS:<n>`.
    Status(LinkStatus),
    /// `+CIFSR:STAIP,"<ip>"`.
    StationIp(String),
    /// Unknown/unrecognized line (command echo, version text, ...).
    Unknown(String),
}

impl Response {
    /// Classify a reply line (terminator already stripped).
    pub fn classify(line: &str) -> Response {
        let text = line.trim_end_matches(&['\r', '\n'][..]);

        match text {
            TOKEN_OK => return Response::Ok,
            TOKEN_ERROR | "FAIL" => return Response::Error,
            TOKEN_CONNECT | "ALREADY CONNECTED" => return Response::Connect,
            "CLOSED" | TOKEN_CLOSE => return Response::Closed,
            TOKEN_WIFI_CONNECTED => return Response::WifiConnected,
            TOKEN_WIFI_GOT_IP => return Response::WifiGotIp,
            TOKEN_WIFI_DISCONNECT => return Response::WifiDisconnect,
            TOKEN_SEND_OK => return Response::SendOk,
            TOKEN_SEND_FAIL => return Response::SendFail,
            "ready" => return Response::Ready,
            _ => {}
        }

        if text.starts_with(TOKEN_PROMPT) || text == ">" {
            return Response::Prompt;
        }

        if text.starts_with(TOKEN_BUSY) {
            return Response::Busy;
        }

        if let Ok(length) = parse_ipd_length(text) {
            return Response::Ipd { length };
        }

        if let Some(code) = text.strip_prefix("STATUS:") {
            if let Ok(code) = code.trim().parse::<u8>() {
                return Response::Status(LinkStatus::from(code));
            }
        }

        if let Some(ip) = parse_station_ip(text) {
            return Response::StationIp(ip);
        }

        trace!("Unclassified reply line: {:?}", text);
        Response::Unknown(text.to_string())
    }

    /// Check if this is a successful final result.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok | Response::SendOk)
    }

    /// Check if this is a failure result.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error | Response::SendFail)
    }
}

/// Parse the announced length from a `+IPD,<len>:<data>` notification.
pub fn parse_ipd_length(line: &str) -> ProtocolResult<usize> {
    let rest = line
        .strip_prefix("+IPD,")
        .ok_or_else(|| ProtocolError::ParseError(line.to_string()))?;
    let digits = rest.split(':').next().unwrap_or(rest);
    digits
        .trim()
        .parse()
        .map_err(|_| ProtocolError::ParseError(line.to_string()))
}

/// Extract the station IP from a `+CIFSR:STAIP,"<ip>"` line.
pub fn parse_station_ip(line: &str) -> Option<String> {
    let rest = line.strip_prefix("+CIFSR:STAIP,")?;
    Some(rest.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_final_results() {
        assert_eq!(Response::classify("OK"), Response::Ok);
        assert_eq!(Response::classify("ERROR"), Response::Error);
        assert!(Response::classify("SEND OK").is_ok());
        assert!(Response::classify("SEND FAIL").is_error());
    }

    #[test]
    fn test_classify_notifications() {
        assert_eq!(Response::classify("WIFI CONNECTED"), Response::WifiConnected);
        assert_eq!(Response::classify("WIFI GOT IP"), Response::WifiGotIp);
        assert_eq!(Response::classify("CLOSED"), Response::Closed);
        assert_eq!(Response::classify("ready"), Response::Ready);
    }

    #[test]
    fn test_classify_ipd() {
        assert_eq!(
            Response::classify("+IPD,128:HTTP/1.1 200 OK"),
            Response::Ipd { length: 128 }
        );
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            Response::classify("STATUS:3"),
            Response::Status(LinkStatus::Connected)
        );
        assert_eq!(
            Response::classify("STATUS:5"),
            Response::Status(LinkStatus::NoAp)
        );
    }

    #[test]
    fn test_classify_station_ip() {
        assert_eq!(
            Response::classify("+CIFSR:STAIP,\"192.168.4.7\""),
            Response::StationIp("192.168.4.7".to_string())
        );
    }

    #[test]
    fn test_classify_prompt_and_unknown() {
        assert_eq!(Response::classify("> "), Response::Prompt);
        assert_eq!(Response::classify("busy p..."), Response::Busy);
        assert_eq!(
            Response::classify("AT version:1.2.0.0"),
            Response::Unknown("AT version:1.2.0.0".to_string())
        );
    }

    #[test]
    fn test_parse_ipd_length_rejects_garbage() {
        assert!(parse_ipd_length("+IPD,abc:").is_err());
        assert!(parse_ipd_length("OK").is_err());
    }

    #[test]
    fn test_outcome_is_matched() {
        assert!(Outcome::Matched("OK".to_string()).is_matched());
        assert!(!Outcome::MatchedError("ERROR".to_string()).is_matched());
        assert!(!Outcome::Timeout.is_matched());
    }
}
