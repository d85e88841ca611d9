//! Authenticated sealing of record files
//!
//! Sealed format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = domain tag
//! ```
//!
//! The domain tag binds each sealed value to the file it belongs in, so the
//! `filename` file of a record can never be opened as its payload.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::SecretKey;
use crate::{NONCE_SIZE, SEAL_OVERHEAD};

/// Which record file a sealed value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Payload,
    Filename,
    Password,
}

impl Domain {
    fn aad(self) -> &'static [u8] {
        match self {
            Domain::Payload => b"hushlink/payload/v1",
            Domain::Filename => b"hushlink/filename/v1",
            Domain::Password => b"hushlink/password/v1",
        }
    }
}

/// Seal `plaintext` under `key`.
///
/// A fresh random nonce is drawn for every call; 192-bit nonces make random
/// reuse under one key negligible.
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn seal(key: &SecretKey, domain: Domain, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: domain.aad(),
            },
        )
        .map_err(|_| CryptoError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a value produced by [`seal`].
///
/// Any tampering, a wrong key, or a wrong `domain` yields
/// [`CryptoError::Authentication`]; input shorter than nonce + tag yields
/// [`CryptoError::Truncated`].
pub fn open(
    key: &SecretKey,
    domain: Domain,
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CryptoError::Truncated {
            actual: sealed.len(),
            minimum: SEAL_OVERHEAD,
        });
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: domain.aad(),
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)
}
