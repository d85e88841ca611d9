//! Secret identifiers
//!
//! An identifier is a fixed-length string over `[A-Za-z0-9]` and doubles as
//! the record's directory name, so it must be a single safe path segment.
//! Identifiers are drawn from the thread-local CSPRNG; the store retries on
//! collision, which is never fatal.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Shortest identifier accepted anywhere (62^4 ≈ 1.4e7 slots).
pub const MIN_SID_LEN: usize = 4;

/// Longest identifier accepted anywhere (62^64 ≈ 2^381 slots).
pub const MAX_SID_LEN: usize = 64;

/// Suffix appended to an identifier while its record is claimed.
pub const LOCK_SUFFIX: &str = "_locked";

/// Size of the identifier alphabet.
pub const ALPHABET_SIZE: u32 = 62;

/// A validated secret identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretId(String);

impl SecretId {
    /// Draw a fresh identifier of `len` characters.
    ///
    /// `len` is clamped to `MIN_SID_LEN..=MAX_SID_LEN`.
    pub fn generate(len: usize) -> Self {
        let len = len.clamp(MIN_SID_LEN, MAX_SID_LEN);
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        SecretId(id)
    }

    /// Accept `candidate` only if it has exactly `len` alphanumeric ASCII
    /// characters. Anything else (wrong length, `/`, `..`, a `_locked`
    /// suffix) is rejected.
    pub fn parse(candidate: &str, len: usize) -> Option<Self> {
        if candidate.len() != len || !candidate.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(SecretId(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name of this record while it is claimed.
    pub fn locked_name(&self) -> String {
        format!("{}{LOCK_SUFFIX}", self.0)
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Approximate brute-force resistance of an identifier of `len` characters,
/// in bits (log2 of 62^len).
pub fn id_entropy_bits(len: usize) -> f64 {
    len as f64 * f64::from(ALPHABET_SIZE).log2()
}
