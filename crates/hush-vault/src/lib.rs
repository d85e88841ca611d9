//! hush-vault: the secret lifecycle controller
//!
//! Create:  validate → seal payload (+ filename, password check) → store.create
//! Reveal:  decode key → store.claim → read → password check → open → destroy
//!
//! Once a claim succeeds, every path ends in `store.destroy`: a secret is
//! delivered at most once, and a wrong key or password burns it.

pub mod settings;
pub mod vault;

pub use settings::VaultSettings;
pub use vault::Vault;
