//! Application-wide error types.
//!
//! User-facing validation failures live in [`crate::settings::SettingsError`];
//! this enum covers infrastructure failures (config, logging, storage and
//! the remote catalog).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// A command handler ran without state its guards should have supplied.
    #[error("command error: {0}")]
    Command(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
