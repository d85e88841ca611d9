//! In-memory record store with the same atomicity contracts as the
//! filesystem store. The map lock stands in for the filesystem's atomic
//! `mkdir` and `rename`; each primitive takes it exactly once.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use hush_core::{SecretId, SecretKind};

use crate::error::StoreError;
use crate::record::{ClaimHandle, RecordDraft, SealedRecord};
use crate::store::AtomicRecordStore;
use crate::sweep::{age, SweepPolicy, SweepReport};

#[derive(Debug)]
enum SlotState {
    Live,
    Claimed,
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    record: SealedRecord,
    /// Creation time while live, claim time once claimed
    stamped: SystemTime,
}

#[derive(Debug)]
pub struct MemoryRecordStore {
    sid_len: usize,
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryRecordStore {
    pub fn new(sid_len: usize) -> Self {
        Self {
            sid_len,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of records in any state
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Insert a live record created at `at`, for expiry tests.
    pub fn create_at(&self, draft: &RecordDraft, at: SystemTime) -> SecretId {
        let mut slots = self.slots();
        loop {
            let id = SecretId::generate(self.sid_len);
            if slots.contains_key(id.as_str()) {
                continue;
            }
            slots.insert(
                id.to_string(),
                Slot {
                    state: SlotState::Live,
                    record: SealedRecord::from(draft),
                    stamped: at,
                },
            );
            return id;
        }
    }
}

impl AtomicRecordStore for MemoryRecordStore {
    fn sid_len(&self) -> usize {
        self.sid_len
    }

    fn create(&self, draft: &RecordDraft) -> Result<SecretId, StoreError> {
        Ok(self.create_at(draft, SystemTime::now()))
    }

    fn claim(&self, id: &str) -> Result<Option<ClaimHandle>, StoreError> {
        let Some(id) = SecretId::parse(id, self.sid_len) else {
            return Ok(None);
        };
        let mut slots = self.slots();
        match slots.get_mut(id.as_str()) {
            Some(slot) if matches!(slot.state, SlotState::Live) => {
                slot.state = SlotState::Claimed;
                slot.stamped = SystemTime::now();
                Ok(Some(ClaimHandle::new(id)))
            }
            _ => Ok(None),
        }
    }

    fn read(&self, handle: &ClaimHandle) -> Result<SealedRecord, StoreError> {
        match self.slots().get(handle.id().as_str()) {
            Some(slot) if matches!(slot.state, SlotState::Claimed) => Ok(slot.record.clone()),
            _ => Err(StoreError::Incomplete(handle.id().to_string())),
        }
    }

    fn destroy(&self, handle: ClaimHandle) -> Result<(), StoreError> {
        self.slots().remove(handle.id().as_str());
        Ok(())
    }

    fn probe(&self, id: &str) -> Result<Option<SecretKind>, StoreError> {
        let Some(id) = SecretId::parse(id, self.sid_len) else {
            return Ok(None);
        };
        Ok(self.slots().get(id.as_str()).and_then(|slot| match slot.state {
            SlotState::Live => Some(SecretKind {
                is_file: slot.record.filename.is_some(),
                password: slot.record.password_check.is_some(),
            }),
            SlotState::Claimed => None,
        }))
    }

    fn sweep(&self, now: SystemTime, policy: &SweepPolicy) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();
        self.slots().retain(|_, slot| {
            let slot_age = age(now, slot.stamped);
            let reap = match slot.state {
                SlotState::Live => slot_age >= policy.max_age,
                SlotState::Claimed => slot_age >= policy.lock_grace,
            };
            if reap {
                match slot.state {
                    SlotState::Live => report.expired += 1,
                    SlotState::Claimed => report.orphaned += 1,
                }
            }
            !reap
        });
        Ok(report)
    }

    fn check_health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
