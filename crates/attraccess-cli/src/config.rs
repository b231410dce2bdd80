//! TOML configuration for the reader binary.
//!
//! ```toml
//! [resource]
//! api_url = "http://attraccess.local:3000"
//! resource_id = "7"
//! refresh_interval_ms = 5000
//! username = "reader"
//! password = "secret"
//!
//! [reader]
//! api_key = "..."
//! timeout_ms = 30000
//! driver = "pn532-serial"
//! serial_port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [tick]
//! interval_ms = 10
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use attraccess_core::constants::{
    API_REQUEST_TIMEOUT_MS, DEFAULT_CARD_TIMEOUT_MS, DEFAULT_REFRESH_INTERVAL_MS,
    DEFAULT_TICK_INTERVAL_MS,
};
use attraccess_core::{Error, ResourceId, Result};
use attraccess_engine::GatewayConfig;
use attraccess_network::Credentials;
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CARD_TIMEOUT_MS
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resource: ResourceSection,
    #[serde(default)]
    pub reader: ReaderSection,
    #[serde(default)]
    pub tick: TickSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSection {
    pub api_url: Option<String>,
    pub resource_id: Option<String>,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ResourceSection {
    fn default() -> Self {
        Self {
            api_url: None,
            resource_id: None,
            refresh_interval_ms: default_refresh_interval_ms(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReaderDriver {
    /// Cards come from the console simulator.
    #[default]
    Mock,
    /// PN532 over a UART.
    Pn532Serial,
}

impl std::fmt::Display for ReaderDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Pn532Serial => write!(f, "pn532-serial"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSection {
    pub endpoint: Option<String>,
    pub device_id: Option<String>,
    pub api_key: Option<String>,
    /// Card operation timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub driver: ReaderDriver,
    pub serial_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            device_id: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            driver: ReaderDriver::default(),
            serial_port: None,
            baud_rate: default_baud_rate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickSection {
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TickSection {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Treat blank strings like absent keys.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read and [`Error::Config`] if it
    /// is not valid TOML for this layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Settings for the gateway.
    ///
    /// # Errors
    ///
    /// [`Error::MissingConfig`] without `resource.api_url` or
    /// `resource.resource_id`, [`Error::Config`] for an unusable resource id.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let api_url = present(&self.resource.api_url)
            .ok_or_else(|| Error::MissingConfig("resource.api_url".to_string()))?;
        let resource_id: ResourceId = present(&self.resource.resource_id)
            .ok_or_else(|| Error::MissingConfig("resource.resource_id".to_string()))?
            .parse()?;

        let mut config = GatewayConfig::new(api_url, resource_id);
        config.refresh_interval = Duration::from_millis(self.resource.refresh_interval_ms);
        let username = present(&self.resource.username);
        let password = present(&self.resource.password);
        config.credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        };
        config.endpoint = present(&self.reader.endpoint).map(str::to_string);
        config.device_id = present(&self.reader.device_id).map(str::to_string);
        config.api_key = present(&self.reader.api_key).map(str::to_string);
        config.card_timeout = Duration::from_millis(self.reader.timeout_ms);
        config.request_timeout = Duration::from_millis(API_REQUEST_TIMEOUT_MS);
        Ok(config)
    }

    /// Serial device for the PN532 driver.
    ///
    /// # Errors
    ///
    /// [`Error::MissingConfig`] when `reader.serial_port` is not set.
    pub fn serial_port(&self) -> Result<&str> {
        present(&self.reader.serial_port)
            .ok_or_else(|| Error::MissingConfig("reader.serial_port".to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick.interval_ms.max(1))
    }

    /// Log the device side of the configuration.
    pub fn log_summary(&self) {
        info!(
            driver = %self.reader.driver,
            serial_port = self.reader.serial_port.as_deref().unwrap_or("<none>"),
            baud_rate = self.reader.baud_rate,
            tick_interval_ms = self.tick_interval().as_millis() as u64,
            "Reader device configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    const FULL: &str = r#"
[resource]
api_url = "http://attraccess.local:3000"
resource_id = "7"
refresh_interval_ms = 2000
username = "reader"
password = "secret"

[reader]
endpoint = "http://proxy.local/desfire"
device_id = "bench-reader"
api_key = "k-123"
timeout_ms = 10000
driver = "pn532-serial"
serial_port = "/dev/ttyUSB0"
baud_rate = 57600

[tick]
interval_ms = 20
"#;

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml_str(FULL).unwrap();
        let gateway = config.gateway_config().unwrap();

        assert_eq!(gateway.api_url, "http://attraccess.local:3000");
        assert_eq!(gateway.resource_id.as_str(), "7");
        assert_eq!(gateway.refresh_interval, Duration::from_secs(2));
        assert_eq!(gateway.credentials, Some(Credentials::new("reader", "secret")));
        assert_eq!(gateway.endpoint.as_deref(), Some("http://proxy.local/desfire"));
        assert_eq!(gateway.device_id.as_deref(), Some("bench-reader"));
        assert_eq!(gateway.api_key.as_deref(), Some("k-123"));
        assert_eq!(gateway.card_timeout, Duration::from_secs(10));

        assert_eq!(config.reader.driver, ReaderDriver::Pn532Serial);
        assert_eq!(config.serial_port().unwrap(), "/dev/ttyUSB0");
        assert_eq!(config.reader.baud_rate, 57600);
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str(
            "[resource]\napi_url = \"http://a\"\nresource_id = \"1\"\n",
        )
        .unwrap();
        let gateway = config.gateway_config().unwrap();

        assert_eq!(gateway.card_timeout, Duration::from_millis(30_000));
        assert_eq!(gateway.refresh_interval, Duration::from_millis(5_000));
        assert_eq!(gateway.request_timeout, Duration::from_millis(5_000));
        assert!(gateway.credentials.is_none());
        assert!(gateway.endpoint.is_none());
        assert_eq!(config.reader.driver, ReaderDriver::Mock);
        assert_eq!(config.reader.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_missing_api_url() {
        let config = AppConfig::from_toml_str("[resource]\nresource_id = \"1\"\n").unwrap();
        assert!(matches!(
            config.gateway_config(),
            Err(Error::MissingConfig(key)) if key == "resource.api_url"
        ));
    }

    #[test]
    fn test_blank_resource_id_is_missing() {
        let config =
            AppConfig::from_toml_str("[resource]\napi_url = \"http://a\"\nresource_id = \"  \"\n")
                .unwrap();
        assert!(matches!(
            config.gateway_config(),
            Err(Error::MissingConfig(key)) if key == "resource.resource_id"
        ));
    }

    #[test]
    fn test_invalid_resource_id() {
        let config =
            AppConfig::from_toml_str("[resource]\napi_url = \"http://a\"\nresource_id = \"a/b\"\n")
                .unwrap();
        assert!(matches!(config.gateway_config(), Err(Error::Config(_))));
    }

    #[rstest]
    #[case("username = \"u\"\n")]
    #[case("password = \"p\"\n")]
    #[case("username = \"u\"\npassword = \"\"\n")]
    #[case("username = \"\"\npassword = \"p\"\n")]
    #[case("username = \"u\"\npassword = \"  \"\n")]
    fn test_credentials_need_both_halves(#[case] auth: &str) {
        let text = format!("[resource]\napi_url = \"http://a\"\nresource_id = \"1\"\n{auth}");
        let config = AppConfig::from_toml_str(&text).unwrap();
        assert!(config.gateway_config().unwrap().credentials.is_none());
    }

    #[test]
    fn test_serial_port_required_for_pn532() {
        let config = AppConfig::from_toml_str("[reader]\ndriver = \"pn532-serial\"\n").unwrap();
        assert!(matches!(config.serial_port(), Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[reader]\ndriver = \"acr122\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_zero_tick_interval_clamped() {
        let config = AppConfig::from_toml_str("[tick]\ninterval_ms = 0\n").unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.resource.resource_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path().join("absent.toml")),
            Err(Error::Io(_))
        ));
    }
}
