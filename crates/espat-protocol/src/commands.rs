//! Commands that can be sent to the ESP8266 AT firmware.
//!
//! The command set covers the profile the driver needs:
//! - Basic commands (reset, echo, version)
//! - WiFi commands (mode, join, query, quit)
//! - TCP/IP commands (connection mode, start, status, send, close)

use crate::codec::LineCodec;

/// WiFi operating mode (`AT+CWMODE_DEF=<mode>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    /// Station mode: join an existing access point.
    Station,
    /// Soft access point mode.
    SoftAp,
    /// Station and soft access point at the same time.
    StationAndSoftAp,
}

impl WifiMode {
    /// Numeric value used on the wire.
    pub fn as_u8(&self) -> u8 {
        match self {
            WifiMode::Station => 1,
            WifiMode::SoftAp => 2,
            WifiMode::StationAndSoftAp => 3,
        }
    }

    /// Parse a mode from its numeric value.
    pub fn from_u8(value: u8) -> Option<WifiMode> {
        match value {
            1 => Some(WifiMode::Station),
            2 => Some(WifiMode::SoftAp),
            3 => Some(WifiMode::StationAndSoftAp),
            _ => None,
        }
    }
}

/// TCP connection multiplexing mode (`AT+CIPMUX=<mode>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// One connection at a time.
    Single,
    /// Up to five concurrent connections.
    Multiple,
}

impl ConnectionMode {
    /// Numeric value used on the wire.
    pub fn as_u8(&self) -> u8 {
        match self {
            ConnectionMode::Single => 0,
            ConnectionMode::Multiple => 1,
        }
    }
}

/// Commands that can be sent to the modem.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ========== Basic Commands ==========
    /// Restart the module (`AT+RST`).
    Reset,

    /// Enable or disable command echo (`ATE1` / `ATE0`).
    Echo {
        /// Whether the modem should echo commands back.
        enable: bool,
    },

    /// Query the firmware version (`AT+GMR`).
    Version,

    // ========== WiFi Commands ==========
    /// Set the WiFi mode and store it in flash.
    SetWifiMode {
        /// The mode to set.
        mode: WifiMode,
    },

    /// Join an access point and store the credentials in flash.
    JoinAp {
        /// Network name.
        ssid: String,
        /// Network password.
        password: String,
    },

    /// Query the access point the module is joined to.
    QueryAp,

    /// Disconnect from the access point (`AT+CWQAP`).
    QuitAp,

    /// Query the local IP and MAC addresses (`AT+CIFSR`).
    QueryIp,

    // ========== TCP/IP Commands ==========
    /// Set single or multiple connection mode.
    SetConnectionMode {
        /// The mode to set.
        mode: ConnectionMode,
    },

    /// Open a TCP connection.
    TcpStart {
        /// Remote host name or IP address.
        host: String,
        /// Remote port.
        port: u16,
    },

    /// Query the connection status (`AT+CIPSTATUS`).
    TcpStatus,

    /// Announce `length` bytes of payload for the open connection.
    Send {
        /// Number of payload bytes that will follow the `> ` prompt.
        length: usize,
    },

    /// Close the TCP connection (`AT+CIPCLOSE`).
    TcpClose,
}

impl Command {
    /// Encode the command as a line to send to the modem.
    /// Returns the bytes to send (including the `\r\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        let cmd_str = self.to_command_string();
        LineCodec::encode_command(&cmd_str)
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            // Basic
            Command::Reset => "AT+RST".to_string(),
            Command::Echo { enable } => {
                if *enable {
                    "ATE1".to_string()
                } else {
                    "ATE0".to_string()
                }
            }
            Command::Version => "AT+GMR".to_string(),

            // WiFi
            Command::SetWifiMode { mode } => format!("AT+CWMODE_DEF={}", mode.as_u8()),
            Command::JoinAp { ssid, password } => format!(
                "AT+CWJAP_DEF=\"{}\",\"{}\"",
                escape_quoted(ssid),
                escape_quoted(password)
            ),
            Command::QueryAp => "AT+CWJAP_DEF?".to_string(),
            Command::QuitAp => "AT+CWQAP".to_string(),
            Command::QueryIp => "AT+CIFSR".to_string(),

            // TCP/IP
            Command::SetConnectionMode { mode } => format!("AT+CIPMUX={}", mode.as_u8()),
            Command::TcpStart { host, port } => {
                format!("AT+CIPSTART=\"TCP\",\"{}\",{}", host, port)
            }
            Command::TcpStatus => "AT+CIPSTATUS".to_string(),
            Command::Send { length } => format!("AT+CIPSEND={}", length),
            Command::TcpClose => "AT+CIPCLOSE".to_string(),
        }
    }
}

/// Escape a value for use inside a quoted AT parameter.
///
/// The firmware expects `"`, `,` and `\` to be prefixed with a backslash.
pub fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | ',' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reset() {
        assert_eq!(Command::Reset.encode(), b"AT+RST\r\n");
    }

    #[test]
    fn test_encode_echo() {
        assert_eq!(Command::Echo { enable: true }.encode(), b"ATE1\r\n");
        assert_eq!(Command::Echo { enable: false }.encode(), b"ATE0\r\n");
    }

    #[test]
    fn test_encode_wifi_mode() {
        let cmd = Command::SetWifiMode { mode: WifiMode::Station };
        assert_eq!(cmd.encode(), b"AT+CWMODE_DEF=1\r\n");
    }

    #[test]
    fn test_encode_join_ap() {
        let cmd = Command::JoinAp {
            ssid: "HomeNet".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.encode(), b"AT+CWJAP_DEF=\"HomeNet\",\"secret\"\r\n");
    }

    #[test]
    fn test_encode_join_ap_escapes_specials() {
        let cmd = Command::JoinAp {
            ssid: "a,b".to_string(),
            password: "p\"w\\".to_string(),
        };
        assert_eq!(
            cmd.to_command_string(),
            "AT+CWJAP_DEF=\"a\\,b\",\"p\\\"w\\\\\""
        );
    }

    #[test]
    fn test_encode_tcp_start() {
        let cmd = Command::TcpStart {
            host: "things.ubidots.com".to_string(),
            port: 80,
        };
        assert_eq!(
            cmd.encode(),
            b"AT+CIPSTART=\"TCP\",\"things.ubidots.com\",80\r\n"
        );
    }

    #[test]
    fn test_encode_send() {
        assert_eq!(Command::Send { length: 42 }.encode(), b"AT+CIPSEND=42\r\n");
    }

    #[test]
    fn test_encode_connection_mode() {
        let cmd = Command::SetConnectionMode { mode: ConnectionMode::Single };
        assert_eq!(cmd.encode(), b"AT+CIPMUX=0\r\n");
    }

    #[test]
    fn test_wifi_mode_from_u8() {
        assert_eq!(WifiMode::from_u8(3), Some(WifiMode::StationAndSoftAp));
        assert_eq!(WifiMode::from_u8(0), None);
    }
}
