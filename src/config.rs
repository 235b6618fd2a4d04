use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError};
use serde::Deserialize;

/// Client configuration. The defaults match a stock camera hotspot, where
/// the backpack always lives at `10.5.5.9`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoProConfig {
    /// Network address of the camera on its WiFi hotspot.
    pub address: String,

    /// Delay between the completion of one status poll round and the start
    /// of the next. Measured from completion, not wall-clock ticks, so a
    /// congested link backs off naturally.
    #[serde(with = "serde_millis")]
    pub poll_interval: Duration,

    /// Per-request timeout on the control channel.
    #[serde(with = "serde_millis")]
    pub request_timeout: Duration,
}

impl Default for GoProConfig {
    fn default() -> Self {
        GoProConfig {
            address: "10.5.5.9".to_owned(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl GoProConfig {
    pub fn read() -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::with_name("gopro-control").required(false))?;
        c.merge(config::Environment::with_prefix("GOPRO"))?;

        c.try_into()
    }

    pub fn read_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::from(path))?;
        c.merge(config::Environment::with_prefix("GOPRO"))?;

        c.try_into()
    }
}
