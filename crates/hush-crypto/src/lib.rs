//! hush-crypto: encryption at rest for hushlink secrets
//!
//! Every value written to disk goes through one envelope:
//! ```text
//! XChaCha20-Poly1305, key = 256-bit, nonce = random 192-bit per call
//! sealed = [24 bytes: nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD    = domain tag ("hushlink/payload/v1", "hushlink/filename/v1", ...)
//! ```
//!
//! Key sourcing:
//! ```text
//! link mode    fresh key per secret ─► URL-safe base64 (no padding) in the link, never stored
//! server mode  one key loaded at startup ─► used for every record
//! password     Argon2id(password, salt) ─► seals the password itself as a check value
//! ```

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;

pub use envelope::{open, seal, Domain};
pub use error::CryptoError;
pub use kdf::{seal_password_check, verify_password_check, KdfParams};
pub use keys::{decode_link_key, encode_link_key, parse_server_key, SecretKey};

/// Size of a secret key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Bytes the envelope adds to every plaintext
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;
