use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("topology error: {0}")]
    Topology(String),
}

pub type DataResult<T> = Result<T, DataError>;
