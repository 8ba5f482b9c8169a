//! Connection state machine for an ESP8266 running the AT firmware.
//!
//! [`Esp8266`] sequences engine transactions to move the modem through its
//! lifecycle:
//!
//! ```text
//! Reset -> WifiAssociating -> IpAcquired -> TcpConnecting -> TcpOpen
//!                                                 TcpOpen -> Sending -> AwaitingResponse -> TcpOpen
//!                                                 TcpOpen -> Closed
//! ```
//!
//! Every operation is synchronous and bounded by the configured attempt
//! budgets. Failures are returned to the caller and written to the debug sink
//! as a plain diagnostic line; nothing is retried automatically.

use espat_protocol::{
    parse_station_ip, ubidots_body, ubidots_post_path, Command, ConnectionMode, HttpRequest,
    Outcome, WifiMode, CONTENT_TYPE_JSON, DEFAULT_BOOT_MARKER, MAX_UBIDOTS_VARIABLES,
    TOKEN_CLOSE, TOKEN_CONNECT, TOKEN_ERROR, TOKEN_IPD, TOKEN_OK, TOKEN_PROMPT, TOKEN_SEND_OK,
    TOKEN_STATUS_CODE, TOKEN_STATUS_CONNECTED, TOKEN_WIFI_CONNECTED, TOKEN_WIFI_GOT_IP,
    BOOT_MARKER_CAPACITY,
};
use tracing::{debug, warn};

use crate::config::{DriverConfig, UbidotsConfig};
use crate::engine::TransactionEngine;
use crate::error::{DriverError, DriverResult};
use crate::transport::{ByteSink, Delay, ResetPin, Transport};

/// Prefix of the `AT+CWJAP_DEF?` reply naming the joined access point.
const JOINED_AP_PREFIX: &str = "+CWJAP_DEF:";

/// Lifecycle state of the modem as the driver believes it to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Just reset (or reset attempted); nothing is configured.
    Reset,
    /// Association with an access point is in progress.
    WifiAssociating,
    /// Associated and holding an IP address.
    IpAcquired,
    /// A TCP open command is outstanding.
    TcpConnecting,
    /// A TCP session is open.
    TcpOpen,
    /// A request is being framed and written.
    Sending,
    /// Waiting for the remote end to answer.
    AwaitingResponse,
    /// The TCP session (or the AP association) was torn down.
    Closed,
}

/// Driver for an ESP8266 modem behind a byte [`Transport`].
pub struct Esp8266<T, D> {
    engine: TransactionEngine<T, D>,
    reset_pin: Option<Box<dyn ResetPin>>,
    state: ConnectionState,
    /// Host of the open TCP session.
    host: Option<String>,
    boot_marker: String,
    ubidots: UbidotsConfig,
}

impl<T: Transport, D: Delay> Esp8266<T, D> {
    /// Create a driver with the default configuration.
    pub fn new(transport: T, delay: D) -> Self {
        let config = DriverConfig::default();
        let boot_marker = config.boot_marker.clone();
        Esp8266 {
            engine: TransactionEngine::new(transport, delay, config),
            reset_pin: None,
            state: ConnectionState::Reset,
            host: None,
            boot_marker,
            ubidots: UbidotsConfig::default(),
        }
    }

    /// Create a driver with `config`, rejecting unusable settings.
    pub fn with_config(transport: T, delay: D, config: DriverConfig) -> DriverResult<Self> {
        config.validate()?;
        let mut driver = Self::new(transport, delay);
        driver.boot_marker = config.boot_marker.clone();
        driver.engine.set_config(config);
        Ok(driver)
    }

    /// Mirror all traffic and diagnostics to `sink`.
    pub fn with_debug_sink<S: ByteSink + 'static>(mut self, sink: S) -> Self {
        self.engine.set_debug_sink(Box::new(sink));
        self
    }

    /// Use `pin` for hardware resets.
    pub fn with_reset_pin<P: ResetPin + 'static>(mut self, pin: P) -> Self {
        self.reset_pin = Some(Box::new(pin));
        self
    }

    /// Use `ubidots` for the Ubidots request helpers.
    pub fn with_ubidots(mut self, ubidots: UbidotsConfig) -> Self {
        self.ubidots = ubidots;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Host of the open TCP session, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Boot marker waited for after a reset.
    pub fn boot_marker(&self) -> &str {
        &self.boot_marker
    }

    /// Ubidots settings.
    pub fn ubidots(&self) -> &UbidotsConfig {
        &self.ubidots
    }

    /// The transaction engine.
    pub fn engine(&self) -> &TransactionEngine<T, D> {
        &self.engine
    }

    /// The transaction engine, mutably.
    pub fn engine_mut(&mut self) -> &mut TransactionEngine<T, D> {
        &mut self.engine
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    fn name(&self) -> &str {
        &self.engine.config().name
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("Esp8266[{}]: {:?} -> {:?}", self.name(), self.state, next);
            self.state = next;
        }
    }

    fn timeout(&self) -> u32 {
        self.engine.config().read_timeout_ticks
    }

    fn tries(&self) -> u32 {
        self.engine.config().default_tries
    }

    /// Log and mirror a failed step, then hand the error back.
    fn fail(&mut self, message: &str, error: DriverError) -> DriverError {
        warn!("Esp8266[{}]: {}: {}", self.name(), message, error);
        self.engine.note(message);
        error
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Replace the boot marker. `None` or an empty marker restores the default.
    pub fn set_boot_marker(&mut self, marker: Option<&str>) -> DriverResult<()> {
        let marker = match marker {
            Some(m) if !m.is_empty() => m,
            _ => DEFAULT_BOOT_MARKER,
        };
        if marker.len() >= BOOT_MARKER_CAPACITY {
            return Err(DriverError::BootMarkerTooLong {
                max: BOOT_MARKER_CAPACITY - 1,
                actual: marker.len(),
            });
        }
        self.boot_marker = marker.to_string();
        Ok(())
    }

    /// The boot marker as it appears in the reply buffer (terminator stripped).
    fn boot_token(&self) -> String {
        self.boot_marker.trim_end_matches(&['\r', '\n'][..]).to_string()
    }

    fn await_boot(&mut self) -> DriverResult<()> {
        let token = self.boot_token();
        if self.engine.expect_repeating(&token, self.tries()) {
            debug!("Esp8266[{}]: boot marker seen", self.name());
            Ok(())
        } else {
            let error = self.engine.failure(&token);
            Err(self.fail("Boot marker not found", error))
        }
    }

    /// Pulse the reset line (when one is attached) and wait for the boot marker.
    pub fn hard_reset(&mut self) -> DriverResult<()> {
        self.engine.note("Hard reset...");
        self.set_state(ConnectionState::Reset);
        self.host = None;

        self.engine.flush_input();
        self.engine.clear_reply();

        let hold = self.engine.config().reset_hold();
        if let Some(pin) = self.reset_pin.as_mut() {
            pin.assert_reset();
            self.engine.pause(hold);
            pin.release_reset();
        } else {
            debug!("Esp8266[{}]: no reset pin, waiting for boot marker only", self.name());
        }

        self.await_boot()
    }

    /// Restart the firmware with `AT+RST` and wait for the boot marker.
    pub fn soft_reset(&mut self) -> DriverResult<()> {
        self.engine.note("Soft reset...");
        self.set_state(ConnectionState::Reset);
        self.host = None;

        self.engine
            .send_and_read(&Command::Reset.to_command_string(), self.timeout())?;
        self.await_boot()
    }

    /// Send `command` and require `expected` as the reply line.
    fn check_reply(&mut self, command: &Command, expected: &str) -> DriverResult<()> {
        let text = command.to_command_string();
        if self.engine.send_and_expect(&text, expected, self.timeout())? {
            Ok(())
        } else {
            Err(self.engine.failure(expected))
        }
    }

    /// Send `command`, then read lines until `OK`, keeping the first line
    /// `pick` accepts.
    fn collect_until_ok<F>(&mut self, command: &Command, mut pick: F) -> DriverResult<Option<String>>
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.engine
            .send_and_read(&command.to_command_string(), self.timeout())?;

        let mut found = None;
        for _ in 0..self.tries() {
            if self.engine.buffer().equals(TOKEN_OK) {
                return Ok(found);
            }
            if self.engine.buffer().equals(TOKEN_ERROR) {
                return Err(DriverError::SentinelMatched {
                    sentinel: TOKEN_ERROR.to_string(),
                });
            }
            if found.is_none() && !self.engine.buffer().is_empty() {
                let line = self.engine.reply().into_owned();
                found = pick(&line);
            }
            self.engine.read_reply();
        }
        Err(self.engine.failure(TOKEN_OK))
    }

    /// Turn command echo on or off.
    pub fn set_module_echo(&mut self, enable: bool) -> DriverResult<()> {
        self.engine.note("Set module echo");
        self.check_reply(&Command::Echo { enable }, TOKEN_OK)
    }

    /// Query the firmware version; returns the first line of the reply.
    pub fn get_version(&mut self) -> DriverResult<String> {
        self.engine.note("Checking firmware version...");
        match self.collect_until_ok(&Command::Version, |line| Some(line.to_string())) {
            Ok(version) => Ok(version.unwrap_or_default()),
            Err(e) => Err(self.fail("Error getting version", e)),
        }
    }

    // ========================================================================
    // WiFi
    // ========================================================================

    /// Set the WiFi mode (stored in flash).
    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> DriverResult<()> {
        self.engine.note("Set WiFi mode");
        match self.check_reply(&Command::SetWifiMode { mode }, TOKEN_OK) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail("No response", e)),
        }
    }

    /// Select single or multiple connection mode. Only single mode is supported.
    pub fn set_connection_mode(&mut self, mode: ConnectionMode) -> DriverResult<()> {
        self.engine.note("Set connection mode");
        if mode != ConnectionMode::Single {
            return Err(DriverError::Unsupported(
                "multiple connection mode".to_string(),
            ));
        }
        self.check_reply(&Command::SetConnectionMode { mode }, TOKEN_OK)
    }

    /// Join an access point and wait until an IP address is assigned.
    ///
    /// On success the session is in [`ConnectionState::IpAcquired`]. On
    /// failure it returns to the state it was in before the call.
    pub fn connect_to_ap(&mut self, ssid: &str, password: &str) -> DriverResult<()> {
        self.engine.note("Connecting to WiFi AP");
        let previous = self.state;
        self.set_state(ConnectionState::WifiAssociating);

        let command = Command::JoinAp {
            ssid: ssid.to_string(),
            password: password.to_string(),
        };
        self.engine.send_command(&command.to_command_string())?;

        let tries = self.engine.config().connect_tries;
        if !self.engine.expect_repeating(TOKEN_WIFI_CONNECTED, tries) {
            let error = self.engine.failure(TOKEN_WIFI_CONNECTED);
            self.set_state(previous);
            return Err(self.fail("Wifi connect error", error));
        }

        match self.wait_for_ip() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(previous);
                Err(e)
            }
        }
    }

    /// Wait for `WIFI GOT IP`, consume the trailing `OK` and query the address.
    pub fn wait_for_ip(&mut self) -> DriverResult<()> {
        if !self.engine.expect_repeating(TOKEN_WIFI_GOT_IP, self.tries()) {
            let error = self.engine.failure(TOKEN_WIFI_GOT_IP);
            return Err(self.fail("Wifi connect error", error));
        }
        self.set_state(ConnectionState::IpAcquired);

        if !self.engine.expect_repeating(TOKEN_OK, self.tries()) {
            debug!("Esp8266[{}]: no OK after WIFI GOT IP", self.name());
        }

        match self.get_ip() {
            Ok(Some(ip)) => debug!("Esp8266[{}]: station IP {}", self.name(), ip),
            Ok(None) => debug!("Esp8266[{}]: station IP not reported", self.name()),
            Err(e) => debug!("Esp8266[{}]: IP query failed: {}", self.name(), e),
        }
        Ok(())
    }

    /// Query the station IP address (`AT+CIFSR`).
    pub fn get_ip(&mut self) -> DriverResult<Option<String>> {
        self.collect_until_ok(&Command::QueryIp, parse_station_ip)
    }

    /// Query the joined access point (`AT+CWJAP_DEF?`).
    ///
    /// Returns the `+CWJAP_DEF:` line, or `None` when no AP is joined.
    pub fn query_ap(&mut self) -> DriverResult<Option<String>> {
        self.collect_until_ok(&Command::QueryAp, |line| {
            line.starts_with(JOINED_AP_PREFIX).then(|| line.to_string())
        })
    }

    /// Leave the access point.
    pub fn close_ap(&mut self) -> DriverResult<()> {
        self.engine.note("Disconnect from AP");
        self.engine
            .send_and_read(&Command::QuitAp.to_command_string(), self.timeout())?;

        if self.engine.expect_repeating(TOKEN_OK, self.tries()) {
            self.host = None;
            self.set_state(ConnectionState::Closed);
            Ok(())
        } else {
            Err(self.engine.failure(TOKEN_OK))
        }
    }

    // ========================================================================
    // TCP
    // ========================================================================

    /// Open a TCP session to `host:port`.
    ///
    /// Succeeds without sending anything when the modem already reports an
    /// open session.
    pub fn connect_tcp(&mut self, host: &str, port: u16) -> DriverResult<()> {
        if self.tcp_connected()? {
            if self.host.is_none() {
                self.host = Some(host.to_string());
            }
            debug!(
                "Esp8266[{}]: TCP session to {:?} already open",
                self.name(),
                self.host
            );
            return Ok(());
        }

        self.engine.note("Starting TCP connection");
        let previous = self.state;
        self.set_state(ConnectionState::TcpConnecting);

        let command = Command::TcpStart {
            host: host.to_string(),
            port,
        };
        self.engine.send_command(&command.to_command_string())?;

        if !self.engine.expect_repeating(TOKEN_CONNECT, self.tries()) {
            let error = self.engine.failure(TOKEN_CONNECT);
            self.set_state(previous);
            return Err(self.fail("TCP connect error", error));
        }

        self.host = Some(host.to_string());
        self.set_state(ConnectionState::TcpOpen);
        Ok(())
    }

    /// Ask the modem whether a TCP session is open and resynchronize the state.
    pub fn tcp_connected(&mut self) -> DriverResult<bool> {
        self.engine.note("Checking TCP status...");
        let connected = self.engine.send_and_expect(
            &Command::TcpStatus.to_command_string(),
            TOKEN_STATUS_CONNECTED,
            self.timeout(),
        )?;

        if connected {
            self.engine.note("Connected");
            if !self.is_session_open() {
                self.set_state(ConnectionState::TcpOpen);
            }
        } else {
            self.engine.note("Not connected");
            if self.is_session_open() {
                self.host = None;
                self.set_state(ConnectionState::Closed);
            }
        }
        Ok(connected)
    }

    fn is_session_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::TcpOpen | ConnectionState::Sending | ConnectionState::AwaitingResponse
        )
    }

    /// Announce `length` payload bytes and wait for the `> ` prompt.
    ///
    /// Requires an open TCP session. On success the session stays in
    /// [`ConnectionState::Sending`] until the payload is written. On failure
    /// nothing may be written, since the modem is not expecting payload, and
    /// the state is left as it was before the call.
    pub fn tcp_send_request(&mut self, length: usize) -> DriverResult<()> {
        if !self.is_session_open() {
            return Err(DriverError::NotConnected);
        }
        let previous = self.state;
        self.set_state(ConnectionState::Sending);
        let announcement = Command::Send { length }.to_command_string();
        self.engine.send_and_read(&announcement, self.timeout())?;

        let prompted = if self.engine.buffer().contains(TOKEN_PROMPT) {
            true
        } else if self.engine.buffer().equals(TOKEN_ERROR) {
            false
        } else {
            self.engine.find_among(TOKEN_PROMPT, &[TOKEN_ERROR]).is_matched()
        };

        if prompted {
            Ok(())
        } else {
            self.set_state(previous);
            Err(self.fail("ERROR! CIPSEND failed", DriverError::FramingFailure { length }))
        }
    }

    /// Frame and write `request` on the open session.
    fn send_request(&mut self, request: &HttpRequest) -> DriverResult<()> {
        let payload = request.render();
        self.tcp_send_request(request.encoded_len())?;
        self.engine.write_payload(&payload)?;
        self.set_state(ConnectionState::AwaitingResponse);
        Ok(())
    }

    /// Wait for `SEND OK`, then for two `+IPD` notifications.
    ///
    /// The modem usually splits the HTTP answer into at least two packets;
    /// both waits have to succeed.
    fn await_response(&mut self) -> DriverResult<()> {
        let result = self.scan_response();
        self.set_state(ConnectionState::TcpOpen);
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail("ERROR! TCP send failed", e)),
        }
    }

    fn scan_response(&mut self) -> DriverResult<()> {
        if !self.engine.expect_repeating(TOKEN_SEND_OK, self.tries()) {
            return Err(self.engine.failure(TOKEN_SEND_OK));
        }
        for phase in 1..=2 {
            match self.engine.find_among(TOKEN_IPD, &[]) {
                Outcome::Matched(_) => {
                    debug!("Esp8266[{}]: response data ({}/2)", self.name(), phase)
                }
                outcome => return Err(self.engine.outcome_error(TOKEN_IPD, outcome)),
            }
        }
        Ok(())
    }

    fn require_host(&self) -> DriverResult<String> {
        self.host.clone().ok_or(DriverError::NotConnected)
    }

    /// Send `GET <url>` on the open session and wait for the response.
    pub fn request_url(&mut self, url: &str) -> DriverResult<()> {
        let host = self.require_host()?;
        let request = HttpRequest::get(url, &host);
        self.send_request(&request)?;
        self.await_response()
    }

    /// Close the TCP session: `CLOSE` must be acknowledged and followed by `OK`.
    ///
    /// Any failure leaves the session considered open.
    pub fn close_tcp(&mut self) -> DriverResult<()> {
        self.engine.note("Closing TCP connection");
        if let Err(e) = self.check_reply(&Command::TcpClose, TOKEN_CLOSE) {
            return Err(self.fail("TCP close error", e));
        }

        match self.engine.find_among(TOKEN_OK, &[TOKEN_ERROR]) {
            Outcome::Matched(_) => {
                self.host = None;
                self.set_state(ConnectionState::Closed);
                Ok(())
            }
            outcome => {
                let error = self.engine.outcome_error(TOKEN_OK, outcome);
                Err(self.fail("TCP close error", error))
            }
        }
    }

    // ========================================================================
    // Ubidots
    // ========================================================================

    /// Set the Ubidots API token.
    pub fn set_ubidots_token(&mut self, token: &str) {
        self.ubidots.token = token.to_string();
    }

    /// Set the Ubidots device API prefix.
    pub fn set_ubidots_url(&mut self, url: &str) {
        self.ubidots.url = url.to_string();
    }

    /// Set the Ubidots device label.
    pub fn set_device_name(&mut self, device: &str) {
        self.ubidots.device = device.to_string();
    }

    /// Set the Ubidots variable labels (at most four).
    pub fn set_variable_names(&mut self, names: &[&str]) -> DriverResult<()> {
        if names.len() > MAX_UBIDOTS_VARIABLES {
            return Err(DriverError::Config(format!(
                "at most {} ubidots variables, got {}",
                MAX_UBIDOTS_VARIABLES,
                names.len()
            )));
        }
        self.ubidots.variables = names.iter().map(|n| n.to_string()).collect();
        Ok(())
    }

    /// Send `GET <url><auth>` on the open session and wait for the response.
    pub fn ubidots_get_request(&mut self, url: &str, auth: &str) -> DriverResult<()> {
        let path = format!("{}{}", url, auth);
        self.request_url(&path)
    }

    /// POST one value per configured variable to the Ubidots device endpoint.
    pub fn ubidots_post_request<V: AsRef<str>>(&mut self, values: &[V]) -> DriverResult<()> {
        self.ubidots.validate()?;
        let host = self.require_host()?;

        let body = ubidots_body(&self.ubidots.variables, values)?;
        let path = ubidots_post_path(&self.ubidots.url, &self.ubidots.device, &self.ubidots.token);
        let request = HttpRequest::post(&path, &host, CONTENT_TYPE_JSON, &body);

        self.send_request(&request)?;
        self.ubidots_post_response()
    }

    /// Wait for `SEND OK` and then for the `status_code` line of the answer.
    pub fn ubidots_post_response(&mut self) -> DriverResult<()> {
        let result = if !self.engine.expect_repeating(TOKEN_SEND_OK, self.tries()) {
            Err(self.engine.failure(TOKEN_SEND_OK))
        } else if !self
            .engine
            .expect_repeating(TOKEN_STATUS_CODE, self.engine.config().post_status_tries)
        {
            Err(self.engine.failure(TOKEN_STATUS_CODE))
        } else {
            Ok(())
        };

        self.set_state(ConnectionState::TcpOpen);
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail("ERROR! TCP send failed", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemorySink, MockResetPin, MockTransport};
    use crate::transport::NoDelay;

    fn driver(mock: MockTransport) -> Esp8266<MockTransport, NoDelay> {
        let config = DriverConfig::default().with_read_timeout_ticks(3);
        match Esp8266::with_config(mock, NoDelay, config) {
            Ok(driver) => driver,
            Err(e) => panic!("config rejected: {}", e),
        }
    }

    #[test]
    fn test_initial_state() {
        let driver = driver(MockTransport::new());
        assert_eq!(driver.state(), ConnectionState::Reset);
        assert_eq!(driver.host(), None);
        assert_eq!(driver.boot_marker(), "ready\r\n");
    }

    #[test]
    fn test_set_boot_marker() {
        let mut driver = driver(MockTransport::new());
        driver.set_boot_marker(Some("boot ok")).unwrap();
        assert_eq!(driver.boot_marker(), "boot ok");
        driver.set_boot_marker(None).unwrap();
        assert_eq!(driver.boot_marker(), DEFAULT_BOOT_MARKER);
        driver.set_boot_marker(Some("boot ok")).unwrap();
        driver.set_boot_marker(Some("")).unwrap();
        assert_eq!(driver.boot_marker(), DEFAULT_BOOT_MARKER);

        let long = "x".repeat(BOOT_MARKER_CAPACITY);
        assert!(matches!(
            driver.set_boot_marker(Some(long.as_str())),
            Err(DriverError::BootMarkerTooLong { .. })
        ));
        assert_eq!(driver.boot_marker(), DEFAULT_BOOT_MARKER);
    }

    #[test]
    fn test_soft_reset_waits_for_marker() {
        let mock = MockTransport::new().with_reply("AT+RST", "OK\r\n\r\n ets Jan  8 2013\r\nready\r\n");
        let mut driver = driver(mock);
        driver.soft_reset().unwrap();
        assert_eq!(driver.state(), ConnectionState::Reset);
    }

    #[test]
    fn test_soft_reset_custom_marker() {
        let mock = MockTransport::new().with_reply("AT+RST", "OK\r\nbooted v2\r\n");
        let mut driver = driver(mock);
        driver.set_boot_marker(Some("booted")).unwrap();
        driver.soft_reset().unwrap();
    }

    #[test]
    fn test_soft_reset_without_marker_fails() {
        let mock = MockTransport::new().with_reply("AT+RST", "OK\r\n");
        let mut driver = driver(mock);
        assert!(matches!(driver.soft_reset(), Err(DriverError::Timeout { .. })));
        assert_eq!(driver.state(), ConnectionState::Reset);
    }

    #[test]
    fn test_hard_reset_pulses_pin() {
        let pin = MockResetPin::new();
        let mut mock = MockTransport::new();
        mock.push_rx(b"stale\r\n");
        let mut driver = driver(mock).with_reset_pin(pin.clone());

        // Stale bytes are flushed before the pulse, so no marker arrives.
        assert!(driver.hard_reset().is_err());
        assert_eq!(pin.pulses(), 1);
        assert!(!pin.is_asserted());
    }

    #[test]
    fn test_set_module_echo() {
        let mock = MockTransport::new()
            .with_reply("ATE0", "ATE0\r\nOK\r\n")
            .with_reply("ATE1", "ERROR\r\n");
        let mut driver = driver(mock);
        driver.set_module_echo(false).unwrap();
        assert!(matches!(
            driver.set_module_echo(true),
            Err(DriverError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_get_version_returns_first_line() {
        let mock = MockTransport::new().with_reply(
            "AT+GMR",
            "AT version:1.2.0.0(Jul  1 2016 20:04:45)\r\nSDK version:1.5.4.1\r\nOK\r\n",
        );
        let mut driver = driver(mock);
        assert_eq!(
            driver.get_version().unwrap(),
            "AT version:1.2.0.0(Jul  1 2016 20:04:45)"
        );
    }

    #[test]
    fn test_set_connection_mode_multiple_unsupported() {
        let mut driver = driver(MockTransport::new());
        assert!(matches!(
            driver.set_connection_mode(ConnectionMode::Multiple),
            Err(DriverError::Unsupported(_))
        ));
        assert_eq!(driver.transport().written(), "");
    }

    #[test]
    fn test_get_ip_parses_station_address() {
        let mock = MockTransport::new().with_reply(
            "AT+CIFSR",
            "+CIFSR:STAIP,\"192.168.1.42\"\r\n+CIFSR:STAMAC,\"18:fe:34:00:00:01\"\r\nOK\r\n",
        );
        let mut driver = driver(mock);
        assert_eq!(driver.get_ip().unwrap(), Some("192.168.1.42".to_string()));
    }

    #[test]
    fn test_query_ap() {
        let mock = MockTransport::new()
            .with_reply("AT+CWJAP_DEF?", "+CWJAP_DEF:\"lab\",\"aa:bb:cc:dd:ee:ff\",6,-60\r\nOK\r\n")
            .with_reply("AT+CWJAP_DEF?", "No AP\r\nOK\r\n");
        let mut driver = driver(mock);
        assert_eq!(
            driver.query_ap().unwrap(),
            Some("+CWJAP_DEF:\"lab\",\"aa:bb:cc:dd:ee:ff\",6,-60".to_string())
        );
        assert_eq!(driver.query_ap().unwrap(), None);
    }

    #[test]
    fn test_tcp_connected_resyncs_state() {
        let mock = MockTransport::new()
            .with_reply("AT+CIPSTATUS", "STATUS:3\r\nOK\r\n")
            .with_reply("AT+CIPSTATUS", "STATUS:4\r\nOK\r\n");
        let mut driver = driver(mock);
        assert!(driver.tcp_connected().unwrap());
        assert_eq!(driver.state(), ConnectionState::TcpOpen);
        assert!(!driver.tcp_connected().unwrap());
        assert_eq!(driver.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_request_without_host_is_rejected() {
        let mut driver = driver(MockTransport::new());
        assert!(matches!(driver.request_url("/x"), Err(DriverError::NotConnected)));
        assert_eq!(driver.transport().written(), "");
    }

    /// Driver that believes a TCP session is open (`STATUS:3`) and answers
    /// the next length announcement with `send_reply`.
    fn open_driver(send_reply: &str) -> Esp8266<MockTransport, NoDelay> {
        let mock = MockTransport::new()
            .with_reply("AT+CIPSTATUS", "STATUS:3\r\nOK\r\n")
            .with_reply("AT+CIPSEND", send_reply);
        let mut driver = driver(mock);
        assert!(driver.tcp_connected().unwrap());
        assert_eq!(driver.state(), ConnectionState::TcpOpen);
        driver
    }

    #[test]
    fn test_tcp_send_request_error_writes_no_payload() {
        let mut driver = open_driver("link is not valid\r\nERROR\r\n");
        assert!(matches!(
            driver.tcp_send_request(12),
            Err(DriverError::FramingFailure { length: 12 })
        ));
        assert!(driver.transport().written().ends_with("AT+CIPSTATUS\r\nAT+CIPSEND=12\r\n"));
        assert_eq!(driver.state(), ConnectionState::TcpOpen);
    }

    #[test]
    fn test_tcp_send_request_prompt_enters_sending() {
        let mut driver = open_driver("OK\r\n> ");
        driver.tcp_send_request(5).unwrap();
        assert_eq!(driver.state(), ConnectionState::Sending);
    }

    #[test]
    fn test_tcp_send_request_requires_session() {
        for state in [
            ConnectionState::Reset,
            ConnectionState::IpAcquired,
            ConnectionState::Closed,
        ] {
            let mock = MockTransport::new().with_reply("AT+CIPSEND=5", "ERROR\r\n");
            let mut driver = driver(mock);
            driver.state = state;
            assert!(matches!(driver.tcp_send_request(5), Err(DriverError::NotConnected)));
            assert_eq!(driver.state(), state);
            assert_eq!(driver.transport().written(), "");
        }
    }

    #[test]
    fn test_failures_are_mirrored() {
        let sink = MemorySink::new();
        let mut driver = driver(MockTransport::new()).with_debug_sink(sink.clone());
        assert!(driver.connect_to_ap("lab", "secret").is_err());
        let lines = sink.lines();
        assert_eq!(lines.first().map(String::as_str), Some("Connecting to WiFi AP"));
        assert_eq!(lines.last().map(String::as_str), Some("Wifi connect error"));
    }

    #[test]
    fn test_set_variable_names_limit() {
        let mut driver = driver(MockTransport::new());
        driver.set_variable_names(&["a", "b", "c", "d"]).unwrap();
        assert!(driver.set_variable_names(&["a", "b", "c", "d", "e"]).is_err());
        assert_eq!(driver.ubidots().variables.len(), 4);
    }
}
