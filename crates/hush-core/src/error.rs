use thiserror::Error;

pub type HushResult<T> = Result<T, HushError>;

#[derive(Debug, Error)]
pub enum HushError {
    /// The request could not be decoded into a secret (empty payload,
    /// malformed base64, oversized body). Nothing was stored.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HushError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, HushError::InvalidRequest(_))
    }
}
