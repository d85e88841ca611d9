//! hush-core: shared types for hushlink
//!
//! Holds the pieces every other crate agrees on: the secret identifier
//! format, the create/reveal request and outcome types, the daemon config
//! schema, and the top-level error type.

pub mod config;
pub mod error;
pub mod sid;
pub mod types;

pub use error::{HushError, HushResult};
pub use sid::SecretId;
pub use types::{Created, KeyMode, NewSecret, Outcome, RevealRequest, Revealed, SecretKind};
