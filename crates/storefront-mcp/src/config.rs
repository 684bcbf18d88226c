use storefront_common::api::ApiClientConfig;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiClientConfig,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Optional:
    /// - `STOREFRONT_API_URL` (default: "http://localhost:5000/api")
    /// - `STOREFRONT_TIMEOUT_SECS`
    /// - `STOREFRONT_MAX_ERROR_BODY_BYTES` (default: 8192)
    /// - `MCP_TCP_LISTEN_ADDR`
    pub fn from_env() -> Result<Self, AppError> {
        let api = ApiClientConfig::from_env();
        validate_base_url(&api.base_url)?;

        Ok(Self {
            api,
            tcp_listen_addr: std::env::var("MCP_TCP_LISTEN_ADDR").ok(),
        })
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("STOREFRONT_API_URL is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::Config(format!(
            "STOREFRONT_API_URL must use http or https, got {other}"
        ))),
    }
}
