//! hush-store: persistence for sealed secrets
//!
//! The store owns the only cross-request shared state in hushlink: the
//! namespace of record identifiers. Every mutation of that namespace is one
//! atomic primitive:
//!
//! ```text
//! create   mkdir <id>                      exclusive allocation, retried on collision
//! claim    rename <id> -> <id>_locked      linearization point of a reveal
//! destroy  shred files, rm -r <id>_locked  always runs once a claim succeeded
//! ```
//!
//! `FsRecordStore` implements this on a POSIX filesystem; `MemoryRecordStore`
//! provides the same contracts in memory for tests.

pub mod error;
pub mod fs;
pub mod memory;
pub mod record;
pub mod shred;
pub mod store;
pub mod sweep;

pub use error::StoreError;
pub use fs::FsRecordStore;
pub use memory::MemoryRecordStore;
pub use record::{ClaimHandle, RecordDraft, SealedRecord};
pub use store::AtomicRecordStore;
pub use sweep::{SweepPolicy, SweepReport};
