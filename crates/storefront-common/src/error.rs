/// Error type for every call made against the storefront backend.
///
/// Each variant renders as a "request failed" message. Callers decide whether the
/// failure is fatal (bootstrap), blocking (shown to the user) or silent (logged only).
/// Application-specific errors should be defined in each binary crate and wrap
/// `ApiError` via `#[from]`.
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request failed: invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("request failed: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("request failed: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("request failed: invalid base url {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// HTTP status of the failed response, if the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Upstream { status, .. } | ApiError::UpstreamBody { status, .. } => {
                Some(*status)
            }
            ApiError::Request(e) => e.status(),
            ApiError::InvalidJson(_) | ApiError::InvalidBaseUrl(_) => None,
        }
    }
}
