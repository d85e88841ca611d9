//! Secret keys: generation, link encoding, server key parsing

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::KEY_SIZE;

/// Length of an encoded link key: 32 bytes → 44 base64 chars minus one `=`.
pub const LINK_KEY_LEN: usize = 43;

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    fn from_slice(raw: &[u8]) -> Result<Self, CryptoError> {
        if raw.len() != KEY_SIZE {
            return Err(CryptoError::MalformedKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encode a key for embedding in a share link.
///
/// Uses the URL-safe base64 alphabet with the trailing `=` stripped; a lone
/// `=` at the end of a link tends to get lost when users copy it.
pub fn encode_link_key(key: &SecretKey) -> String {
    let mut encoded = URL_SAFE.encode(key.as_bytes());
    while encoded.ends_with('=') {
        encoded.pop();
    }
    encoded
}

/// Decode a link key produced by [`encode_link_key`].
///
/// The exact length is checked first, then padding is restored and the
/// standard URL-safe decoder runs.
pub fn decode_link_key(encoded: &str) -> Result<SecretKey, CryptoError> {
    if encoded.len() != LINK_KEY_LEN {
        return Err(CryptoError::MalformedKey(format!(
            "link key must be {LINK_KEY_LEN} characters, got {}",
            encoded.len()
        )));
    }

    let mut padded = Zeroizing::new(String::with_capacity(encoded.len() + 3));
    padded.push_str(encoded);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let raw = Zeroizing::new(
        URL_SAFE
            .decode(padded.as_bytes())
            .map_err(|e| CryptoError::MalformedKey(format!("base64: {e}")))?,
    );
    SecretKey::from_slice(&raw)
}

/// Parse the server key from its configured form: standard or URL-safe
/// base64 of exactly 32 bytes, padded or not, surrounding whitespace ignored.
pub fn parse_server_key(encoded: &str) -> Result<SecretKey, CryptoError> {
    let trimmed = encoded.trim().trim_end_matches('=');
    let raw = STANDARD_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::MalformedKey(format!("server key is not base64: {e}")))?;
    SecretKey::from_slice(&raw)
}
