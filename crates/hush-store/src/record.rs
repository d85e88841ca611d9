//! On-disk record layout and the values that cross the store boundary

use hush_core::SecretId;

/// Sealed payload file
pub const SECRET_FILE: &str = "secret";
/// Sealed original filename (file secrets only)
pub const FILENAME_FILE: &str = "filename";
/// Password check value (password-protected secrets only)
pub const PASSWORD_FILE: &str = "password";
/// Staging name of the payload while it is being written
pub(crate) const SECRET_TMP_FILE: &str = "secret.tmp";

/// Everything needed to persist a new record. All fields are already sealed.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub ciphertext: Vec<u8>,
    pub filename: Option<Vec<u8>>,
    pub password_check: Option<Vec<u8>>,
}

/// A record as read back from a claimed slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    pub ciphertext: Vec<u8>,
    pub filename: Option<Vec<u8>>,
    pub password_check: Option<Vec<u8>>,
}

impl From<&RecordDraft> for SealedRecord {
    fn from(draft: &RecordDraft) -> Self {
        Self {
            ciphertext: draft.ciphertext.clone(),
            filename: draft.filename.clone(),
            password_check: draft.password_check.clone(),
        }
    }
}

/// Proof that the caller won the claim on a record.
///
/// Consumed by `destroy`, so a claimed record is destroyed at most once per
/// handle.
#[derive(Debug)]
#[must_use = "a claimed record must be destroyed"]
pub struct ClaimHandle {
    id: SecretId,
}

impl ClaimHandle {
    pub fn new(id: SecretId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &SecretId {
        &self.id
    }
}
