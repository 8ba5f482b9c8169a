//! YAML run profile for the `espat` binary.
//!
//! ```yaml
//! bridge: 192.168.1.50:2000
//! wifi:
//!   ssid: lab
//!   password: secret
//! target:
//!   host: things.ubidots.com
//!   port: 80
//! driver:
//!   read_timeout_ticks: 2500
//! ubidots:
//!   token: BBFF-...
//!   device: weather
//!   variables: [temperature, humidity]
//! ```

use std::fs;
use std::path::Path;

use espat_driver::{DriverConfig, UbidotsConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The file could not be read.
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid profile.
    #[error("failed to parse profile: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Access point credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiProfile {
    /// Network name.
    pub ssid: String,
    /// Network password.
    pub password: String,
}

/// Remote TCP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for TargetProfile {
    fn default() -> Self {
        TargetProfile {
            host: "things.ubidots.com".to_string(),
            port: 80,
        }
    }
}

/// Everything one `espat` run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Address of the TCP serial bridge the modem is attached to.
    pub bridge: String,
    /// Access point to join.
    pub wifi: WifiProfile,
    /// Server for `get` and `post`.
    pub target: TargetProfile,
    /// Driver timing and retry budgets.
    pub driver: DriverConfig,
    /// Ubidots endpoint settings.
    pub ubidots: UbidotsConfig,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            bridge: "127.0.0.1:2000".to_string(),
            wifi: WifiProfile::default(),
            target: TargetProfile::default(),
            driver: DriverConfig::default(),
            ubidots: UbidotsConfig::default(),
        }
    }
}

impl Profile {
    /// Load a profile from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse a profile from YAML text. Missing fields take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_default() {
        let profile = Profile::default();
        assert_eq!(profile.bridge, "127.0.0.1:2000");
        assert_eq!(profile.target.port, 80);
        assert_eq!(profile.driver, DriverConfig::default());
    }

    #[test]
    fn test_profile_from_yaml() {
        let yaml = r#"
bridge: 10.0.0.5:4000
wifi:
  ssid: lab
  password: secret
target:
  host: example.com
driver:
  name: bench
  read_timeout_ticks: 2500
ubidots:
  token: T
  device: weather
  variables: [temperature, humidity]
"#;
        let profile = Profile::from_yaml(yaml).unwrap();
        assert_eq!(profile.bridge, "10.0.0.5:4000");
        assert_eq!(profile.wifi.ssid, "lab");
        assert_eq!(profile.target.host, "example.com");
        assert_eq!(profile.target.port, 80);
        assert_eq!(profile.driver.name, "bench");
        assert_eq!(profile.driver.read_timeout_ticks, 2500);
        assert_eq!(profile.driver.default_tries, 5);
        assert_eq!(profile.ubidots.url, "/api/v1.6/devices/");
        assert_eq!(profile.ubidots.variables.len(), 2);
    }

    #[test]
    fn test_profile_rejects_bad_yaml() {
        assert!(matches!(
            Profile::from_yaml("target: [1, 2"),
            Err(ProfileError::Yaml(_))
        ));
    }
}
