use std::time::SystemTime;

use hush_core::{SecretId, SecretKind};

use crate::error::StoreError;
use crate::record::{ClaimHandle, RecordDraft, SealedRecord};
use crate::sweep::{SweepPolicy, SweepReport};

/// A backing store able to allocate exclusively and claim atomically.
///
/// Implementations must guarantee:
/// - `create` never hands out an id that is live or claimed, and a record is
///   never observable without its ciphertext;
/// - of any number of concurrent `claim`s on one id, at most one returns a
///   handle;
/// - `claim` answers `None` alike for absent, claimed, and malformed ids;
/// - `destroy` removes the record even when overwriting its bytes fails.
pub trait AtomicRecordStore: Send + Sync {
    /// Length of the identifiers this store allocates and accepts
    fn sid_len(&self) -> usize;

    fn create(&self, draft: &RecordDraft) -> Result<SecretId, StoreError>;

    fn claim(&self, id: &str) -> Result<Option<ClaimHandle>, StoreError>;

    fn read(&self, handle: &ClaimHandle) -> Result<SealedRecord, StoreError>;

    fn destroy(&self, handle: ClaimHandle) -> Result<(), StoreError>;

    /// Describe an unclaimed record without claiming it.
    fn probe(&self, id: &str) -> Result<Option<SecretKind>, StoreError>;

    /// Reap expired records and orphaned claims as of `now`.
    fn sweep(&self, now: SystemTime, policy: &SweepPolicy) -> Result<SweepReport, StoreError>;

    fn check_health(&self) -> Result<(), StoreError>;
}

impl<T: AtomicRecordStore + ?Sized> AtomicRecordStore for std::sync::Arc<T> {
    fn sid_len(&self) -> usize {
        (**self).sid_len()
    }

    fn create(&self, draft: &RecordDraft) -> Result<SecretId, StoreError> {
        (**self).create(draft)
    }

    fn claim(&self, id: &str) -> Result<Option<ClaimHandle>, StoreError> {
        (**self).claim(id)
    }

    fn read(&self, handle: &ClaimHandle) -> Result<SealedRecord, StoreError> {
        (**self).read(handle)
    }

    fn destroy(&self, handle: ClaimHandle) -> Result<(), StoreError> {
        (**self).destroy(handle)
    }

    fn probe(&self, id: &str) -> Result<Option<SecretKind>, StoreError> {
        (**self).probe(id)
    }

    fn sweep(&self, now: SystemTime, policy: &SweepPolicy) -> Result<SweepReport, StoreError> {
        (**self).sweep(now, policy)
    }

    fn check_health(&self) -> Result<(), StoreError> {
        (**self).check_health()
    }
}
