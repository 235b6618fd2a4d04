use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

/// Wire endpoints understood by the camera's WiFi backpack. Uppercase paths
/// write a setting; their lowercase counterparts read it back.
pub mod endpoints {
    pub const WIFI_NAME: &str = "/bacpac/cv";
    pub const WIFI_PASSWORD: &str = "/bacpac/sd";
    pub const BACPAC_STATUS: &str = "/bacpac/se";
    pub const SHUTTER: &str = "/bacpac/SH";
    pub const POWER: &str = "/bacpac/PW";

    pub const CAMERA_INFO: &str = "/camera/cv";
    pub const CAMERA_STATUS: &str = "/camera/se";
    pub const CAMERA_MODE: &str = "/camera/CM";
    pub const DEFAULT_CAMERA_MODE: &str = "/camera/DM";
    pub const VIDEO_MODE: &str = "/camera/VV";
    pub const VIDEO_MODE_GET: &str = "/camera/vv";
    pub const VIDEO_FPS: &str = "/camera/FS";
    pub const VIDEO_FPS_GET: &str = "/camera/fs";
    pub const BURST_RATE: &str = "/camera/BU";
    pub const BURST_RATE_GET: &str = "/camera/bu";
    pub const VIDEO_STANDARD: &str = "/camera/VM";
    pub const VIDEO_FOV: &str = "/camera/FV";
    pub const PHOTO_MODE: &str = "/camera/PR";
    pub const TIMELAPSE_INTERVAL: &str = "/camera/TI";
    pub const ORIENTATION: &str = "/camera/UP";
    pub const PROTUNE: &str = "/camera/PT";
    pub const OSD: &str = "/camera/OS";
    pub const SPOT_METER: &str = "/camera/EX";
    pub const LEDS: &str = "/camera/LB";
    pub const AUTO_POWER_OFF: &str = "/camera/AO";
    pub const BEEP_VOLUME: &str = "/camera/BS";
    pub const LOCATE: &str = "/camera/LL";
}

/// One request to the camera: an endpoint, the session password if the
/// endpoint requires it, and an optional single parameter byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub endpoint: &'static str,
    pub auth: Option<String>,
    pub param: Option<u8>,
}

impl Request {
    /// Unauthenticated read; only the handshake endpoints allow this.
    pub fn get(endpoint: &'static str) -> Self {
        Request {
            endpoint,
            auth: None,
            param: None,
        }
    }

    /// Authenticated read.
    pub fn with_auth(endpoint: &'static str, password: &str) -> Self {
        Request {
            endpoint,
            auth: Some(password.to_owned()),
            param: None,
        }
    }

    /// Authenticated write carrying a parameter byte.
    pub fn command(endpoint: &'static str, password: &str, param: u8) -> Self {
        Request {
            endpoint,
            auth: Some(password.to_owned()),
            param: Some(param),
        }
    }
}

/// Failures at the wire level, before any interpretation by the session
/// layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response from the device at all (socket error or timeout).
    #[error("camera unreachable: {0}")]
    Unreachable(String),

    /// The device answered, but with a non-success status code.
    #[error("camera refused request (http {status})")]
    Refused { status: u16 },
}

/// Abstract request/response channel to the camera.
///
/// The device documents no concurrency guarantees, so the control task
/// serializes callers; implementations may assume at most one `send` is in
/// flight at a time.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request) -> Result<Bytes, TransportError>;
}

/// HTTP transport speaking to the backpack at a fixed address.
pub struct HttpTransport {
    http: reqwest::Client,
    address: String,
}

impl HttpTransport {
    pub fn new(address: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create http client")?;

        Ok(HttpTransport {
            http,
            address: address.to_owned(),
        })
    }

    fn url_for(&self, request: &Request) -> String {
        let mut url = format!("http://{}{}", self.address, request.endpoint);
        let mut sep = '?';

        if let Some(password) = &request.auth {
            url.push(sep);
            sep = '&';
            url.push_str("t=");
            url.push_str(password);
        }

        if let Some(param) = request.param {
            url.push(sep);
            // single percent-encoded parameter byte, e.g. `p=%01`
            url.push_str(&format!("p=%{:02x}", param));
        }

        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Bytes, TransportError> {
        let url = self.url_for(&request);

        trace!(%url, "sending request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Refused {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new("10.5.5.9", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_without_auth() {
        let url = transport().url_for(&Request::get(endpoints::WIFI_NAME));
        assert_eq!(url, "http://10.5.5.9/bacpac/cv");
    }

    #[test]
    fn url_with_auth() {
        let url = transport().url_for(&Request::with_auth(endpoints::CAMERA_STATUS, "gopro123"));
        assert_eq!(url, "http://10.5.5.9/camera/se?t=gopro123");
    }

    #[test]
    fn url_with_param() {
        let url = transport().url_for(&Request::command(endpoints::SHUTTER, "gopro123", 0x01));
        assert_eq!(url, "http://10.5.5.9/bacpac/SH?t=gopro123&p=%01");
    }
}
