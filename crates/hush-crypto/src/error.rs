use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Tag mismatch: wrong key, wrong domain, or tampered bytes
    #[error("authentication failed: wrong key or corrupted data")]
    Authentication,

    #[error("sealed value too short: {actual} bytes (minimum {minimum})")]
    Truncated { actual: usize, minimum: usize },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed")]
    Seal,
}

impl CryptoError {
    /// True when the failure means "this credential does not open this
    /// value", as opposed to a local fault.
    pub fn is_credential_mismatch(&self) -> bool {
        matches!(
            self,
            CryptoError::Authentication | CryptoError::Truncated { .. }
        )
    }
}
