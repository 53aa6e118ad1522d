//! Application gateway connection configuration.

use url::Url;

/// Application gateway connection settings.
///
/// Both `http(s)://` and `ws(s)://` endpoints are supported.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway endpoint.
    pub url: Url,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Start-up connection attempts before running detached.
    pub connect_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("ws://127.0.0.1:9090/dvote").expect("static url is valid"),
            request_timeout: 20,
            connect_attempts: 10,
        }
    }
}
