//! Password checks: Argon2id passphrase → key that seals the password itself
//!
//! Check value format (binary):
//! ```text
//! [1 byte: version = 1][4 bytes: mem KiB][4 bytes: time][4 bytes: lanes]
//! [16 bytes: salt][sealed password (envelope, domain "password")]
//! ```
//!
//! The Argon2id parameters travel with the check value, so retuning the
//! daemon never invalidates secrets that are already stored.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::envelope::{self, Domain};
use crate::error::CryptoError;
use crate::keys::SecretKey;
use crate::{KEY_SIZE, SEAL_OVERHEAD};

const CHECK_VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const HEADER_SIZE: usize = 1 + 4 * 3 + SALT_SIZE;

/// Argon2id parameters for password checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

fn derive_password_key(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> Result<SecretKey, CryptoError> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id: {e}")))?;

    Ok(SecretKey::from_bytes(key))
}

/// Build the check value stored alongside a password-protected secret.
pub fn seal_password_check(
    password: &SecretString,
    params: &KdfParams,
) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_password_key(password, &salt, params)?;
    let sealed = envelope::seal(&key, Domain::Password, password.expose_secret().as_bytes())?;

    let mut check = Vec::with_capacity(HEADER_SIZE + sealed.len());
    check.push(CHECK_VERSION);
    check.extend_from_slice(&params.mem_cost_kib.to_be_bytes());
    check.extend_from_slice(&params.time_cost.to_be_bytes());
    check.extend_from_slice(&params.parallelism.to_be_bytes());
    check.extend_from_slice(&salt);
    check.extend_from_slice(&sealed);
    Ok(check)
}

/// Verify `candidate` against a check value from [`seal_password_check`].
///
/// Fails with [`CryptoError::Authentication`] when the candidate's key does
/// not open the check value or the recovered reference differs from the
/// candidate.
pub fn verify_password_check(check: &[u8], candidate: &SecretString) -> Result<(), CryptoError> {
    if check.len() < HEADER_SIZE + SEAL_OVERHEAD {
        return Err(CryptoError::Truncated {
            actual: check.len(),
            minimum: HEADER_SIZE + SEAL_OVERHEAD,
        });
    }
    if check[0] != CHECK_VERSION {
        return Err(CryptoError::Authentication);
    }

    let params = KdfParams {
        mem_cost_kib: read_u32(&check[1..5]),
        time_cost: read_u32(&check[5..9]),
        parallelism: read_u32(&check[9..13]),
    };
    let (salt, sealed) = check[13..].split_at(SALT_SIZE);

    let key = derive_password_key(candidate, salt, &params)?;
    let reference = envelope::open(&key, Domain::Password, sealed)?;

    if bool::from(reference.ct_eq(candidate.expose_secret().as_bytes())) {
        Ok(())
    } else {
        Err(CryptoError::Authentication)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}
