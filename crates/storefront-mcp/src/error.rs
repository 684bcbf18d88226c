use storefront_common::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to load data, reload to try again: {0}")]
    Bootstrap(ApiError),

    #[error("storefront is not ready (phase: {0})")]
    NotReady(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
