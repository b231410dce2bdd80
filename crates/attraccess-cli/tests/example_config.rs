//! The shipped example configuration stays loadable.

use std::time::Duration;

use attraccess_cli::{AppConfig, ReaderDriver};

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/attraccess.example.toml");
    let config = AppConfig::load(path).unwrap();
    let gateway = config.gateway_config().unwrap();

    assert_eq!(config.reader.driver, ReaderDriver::Mock);
    assert_eq!(gateway.resource_id.as_str(), "1");
    assert_eq!(gateway.card_timeout, Duration::from_secs(30));
    assert!(gateway.credentials.is_none());
    assert!(gateway.api_key.is_none());

    let channel = gateway.channel_config();
    assert_eq!(
        channel.endpoint.as_deref(),
        Some("http://attraccess.local:3000/desfire/proxy")
    );
    assert_eq!(channel.device_id.as_deref(), Some("resource-1-desfire-reader"));
}
