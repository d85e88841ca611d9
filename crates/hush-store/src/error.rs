use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A claimed record has no ciphertext. It is still destroyed.
    #[error("record {0} is incomplete")]
    Incomplete(String),

    /// The identifier space is so full that allocation keeps colliding.
    #[error("no free identifier after {0} attempts")]
    NamespaceExhausted(u32),

    #[error("data directory unhealthy: {0}")]
    Unhealthy(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for hush_core::HushError {
    fn from(e: StoreError) -> Self {
        hush_core::HushError::Storage(e.to_string())
    }
}
