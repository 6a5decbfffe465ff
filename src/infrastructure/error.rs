use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Remote error: {0}")]
    Remote(String),
    #[error("Remote temporarily unavailable: {0}")]
    RemoteUnavailable(String),
}
