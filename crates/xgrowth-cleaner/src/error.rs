use thiserror::Error;
use xgrowth_db::DbError;
use xgrowth_x::XError;

#[derive(Debug, Error)]
pub enum CleanerError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("X API error: {0}")]
    Gateway(#[from] XError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid whitelist import: {0}")]
    InvalidImport(String),
}
