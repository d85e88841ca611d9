//! Filesystem-backed record store
//!
//! Layout under the data directory:
//! ```text
//! <root>/<id>/secret             sealed payload (written last, via secret.tmp + rename)
//! <root>/<id>/filename           sealed original filename (optional)
//! <root>/<id>/password           password check value (optional)
//! <root>/<id>_locked/...         same directory while a reveal is in flight
//! ```
//!
//! Correctness rests on two POSIX guarantees: `mkdir` fails if the name
//! exists, and `rename` of one source succeeds for exactly one caller.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use hush_core::sid::LOCK_SUFFIX;
use hush_core::{SecretId, SecretKind};
use tracing::{debug, trace, warn};

use crate::error::StoreError;
use crate::record::{
    ClaimHandle, RecordDraft, SealedRecord, FILENAME_FILE, PASSWORD_FILE, SECRET_FILE,
    SECRET_TMP_FILE,
};
use crate::shred;
use crate::store::AtomicRecordStore;
use crate::sweep::{age, SweepPolicy, SweepReport};

/// Allocation attempts before the namespace is considered full
const MAX_ALLOCATION_ATTEMPTS: u32 = 10_000;

/// Scratch files written by the health check; never a valid identifier
const HEALTH_PROBE_PREFIX: &str = ".health-";

#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
    sid_len: usize,
    shred_passes: u32,
}

impl FsRecordStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(
        root: impl Into<PathBuf>,
        sid_len: usize,
        shred_passes: u32,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self {
            root,
            sid_len,
            shred_passes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn live_dir(&self, id: &SecretId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn locked_dir(&self, id: &SecretId) -> PathBuf {
        self.root.join(id.locked_name())
    }

    /// Reserve a fresh id with an exclusive `mkdir`.
    fn allocate(&self) -> Result<(SecretId, PathBuf), StoreError> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let id = SecretId::generate(self.sid_len);
            let dir = self.live_dir(&id);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    // The id must also be free of a claim still being destroyed.
                    if self.locked_dir(&id).exists() {
                        trace!(attempt, "identifier still locked, retrying");
                        if let Err(e) = fs::remove_dir(&dir) {
                            warn!(error = %e, "failed to release reserved directory");
                        }
                        continue;
                    }
                    return Ok((id, dir));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    trace!(attempt, "identifier collision, retrying");
                }
                Err(e) => return Err(StoreError::io(&dir, e)),
            }
        }
        Err(StoreError::NamespaceExhausted(MAX_ALLOCATION_ATTEMPTS))
    }

    /// Metadata first, payload last: a directory without `secret` is never
    /// a complete record.
    fn write_record(&self, dir: &Path, draft: &RecordDraft) -> Result<(), StoreError> {
        if let Some(filename) = &draft.filename {
            write_synced(&dir.join(FILENAME_FILE), filename)?;
        }
        if let Some(check) = &draft.password_check {
            write_synced(&dir.join(PASSWORD_FILE), check)?;
        }
        let tmp = dir.join(SECRET_TMP_FILE);
        let secret = dir.join(SECRET_FILE);
        write_synced(&tmp, &draft.ciphertext)?;
        fs::rename(&tmp, &secret).map_err(|e| StoreError::io(&secret, e))
    }

    /// Fill a freshly allocated directory, removing it again on any error so
    /// a half-written record is never left behind.
    fn populate(&self, id: &SecretId, dir: &Path, draft: &RecordDraft) -> Result<(), StoreError> {
        let written = self.write_record(dir, draft);
        if written.is_err() {
            if let Err(cleanup) = self.shred_dir(dir) {
                warn!(id = %id, error = %cleanup, "failed to remove partial record");
            }
        }
        written
    }

    /// Overwrite every file in `dir`, then remove it. Overwrite failures are
    /// logged and never stop the removal.
    fn shred_dir(&self, dir: &Path) -> Result<(), StoreError> {
        match fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    if let Err(e) = shred::overwrite(&path, self.shred_passes) {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "overwrite failed, removing anyway"
                        );
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot list record for overwrite"),
        }

        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(dir, e)),
        }
    }
}

impl AtomicRecordStore for FsRecordStore {
    fn sid_len(&self) -> usize {
        self.sid_len
    }

    fn create(&self, draft: &RecordDraft) -> Result<SecretId, StoreError> {
        let (id, dir) = self.allocate()?;
        self.populate(&id, &dir, draft)?;
        debug!(id = %id, bytes = draft.ciphertext.len(), "record stored");
        Ok(id)
    }

    fn claim(&self, id: &str) -> Result<Option<ClaimHandle>, StoreError> {
        let Some(id) = SecretId::parse(id, self.sid_len) else {
            return Ok(None);
        };

        let from = self.live_dir(&id);
        let to = self.locked_dir(&id);
        match fs::rename(&from, &to) {
            Ok(()) => {
                // Restart the age clock so the reaper's grace period counts
                // from the claim, not from creation.
                if let Err(e) = File::open(&to).and_then(|f| f.set_modified(SystemTime::now())) {
                    debug!(id = %id, error = %e, "could not stamp claim time");
                }
                debug!(id = %id, "record claimed");
                Ok(Some(ClaimHandle::new(id)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty
                ) =>
            {
                warn!(id = %id, "stale claimed directory blocks claim");
                Ok(None)
            }
            Err(e) => Err(StoreError::io(&from, e)),
        }
    }

    fn read(&self, handle: &ClaimHandle) -> Result<SealedRecord, StoreError> {
        let dir = self.locked_dir(handle.id());

        let ciphertext = match fs::read(dir.join(SECRET_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Incomplete(handle.id().to_string()))
            }
            Err(e) => return Err(StoreError::io(dir.join(SECRET_FILE), e)),
        };

        Ok(SealedRecord {
            ciphertext,
            filename: read_optional(&dir.join(FILENAME_FILE))?,
            password_check: read_optional(&dir.join(PASSWORD_FILE))?,
        })
    }

    fn destroy(&self, handle: ClaimHandle) -> Result<(), StoreError> {
        let dir = self.locked_dir(handle.id());
        self.shred_dir(&dir)?;
        debug!(id = %handle.id(), "record destroyed");
        Ok(())
    }

    fn probe(&self, id: &str) -> Result<Option<SecretKind>, StoreError> {
        let Some(id) = SecretId::parse(id, self.sid_len) else {
            return Ok(None);
        };
        let dir = self.live_dir(&id);
        if !dir.join(SECRET_FILE).is_file() {
            return Ok(None);
        }
        Ok(Some(SecretKind {
            is_file: dir.join(FILENAME_FILE).is_file(),
            password: dir.join(PASSWORD_FILE).is_file(),
        }))
    }

    fn sweep(&self, now: SystemTime, policy: &SweepPolicy) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();
        // Snapshot the listing first; claims below rename entries.
        let entries: Vec<_> = fs::read_dir(&self.root)
            .map_err(|e| StoreError::io(&self.root, e))?
            .flatten()
            .collect();

        for entry in entries {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!(entry = %name, error = %e, "cannot stat entry, skipping");
                    continue;
                }
            };
            let entry_age = age(now, modified);

            // A bad entry is logged and counted; it never stops the pass.
            if let Some(base) = name.strip_suffix(LOCK_SUFFIX) {
                let Some(id) = SecretId::parse(base, self.sid_len) else {
                    continue;
                };
                if entry_age < policy.lock_grace {
                    continue;
                }
                warn!(id = %id, age_secs = entry_age.as_secs(), "removing orphaned claim");
                match self.destroy(ClaimHandle::new(id)) {
                    Ok(()) => report.orphaned += 1,
                    Err(e) => {
                        warn!(entry = %name, error = %e, "failed to remove orphaned claim");
                        report.failed += 1;
                    }
                }
            } else if entry_age >= policy.max_age {
                let handle = match self.claim(name) {
                    Ok(Some(handle)) => handle,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(entry = %name, error = %e, "failed to claim expired record");
                        report.failed += 1;
                        continue;
                    }
                };
                debug!(
                    id = %handle.id(),
                    age_secs = entry_age.as_secs(),
                    "reaping expired record"
                );
                match self.destroy(handle) {
                    Ok(()) => report.expired += 1,
                    Err(e) => {
                        warn!(entry = %name, error = %e, "failed to destroy expired record");
                        report.failed += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    fn check_health(&self) -> Result<(), StoreError> {
        let meta = fs::metadata(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        if !meta.is_dir() {
            return Err(StoreError::Unhealthy(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        // Permission bits say nothing about who may write; try it.
        tempfile::Builder::new()
            .prefix(HEALTH_PROBE_PREFIX)
            .tempfile_in(&self.root)
            .map(drop)
            .map_err(|e| {
                StoreError::Unhealthy(format!("{} is not writable: {e}", self.root.display()))
            })
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::io(path, e))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
