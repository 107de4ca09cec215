//! Application-level error type for the `otl` binary.

use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error(transparent)]
    Client(#[from] otl_client::OtlError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
