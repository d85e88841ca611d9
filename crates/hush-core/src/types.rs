use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::sid::SecretId;

/// Where the decryption key of a secret lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Fresh random key per secret, carried only in the link.
    #[default]
    Link,
    /// One long-lived server key for every record; the id is the capability.
    Server,
}

/// A secret submitted for storage
pub struct NewSecret {
    pub payload: Zeroizing<Vec<u8>>,
    /// Original file name; `None` for text secrets
    pub filename: Option<String>,
    pub password: Option<SecretString>,
}

impl NewSecret {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Zeroizing::new(text.into().into_bytes()),
            filename: None,
            password: None,
        }
    }

    pub fn file(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            payload: Zeroizing::new(bytes),
            filename: Some(filename.into()),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }
}

impl std::fmt::Debug for NewSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewSecret")
            .field("payload", &format_args!("[{} bytes]", self.payload.len()))
            .field("filename", &self.filename)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Handle returned to the sender after a secret has been stored
#[derive(Debug, Clone)]
pub struct Created {
    pub id: SecretId,
    /// URL-safe encoded key (link mode only)
    pub key: Option<String>,
}

impl Created {
    /// Path component of the share link: `<id>` or `<id>/<key>`.
    pub fn link_path(&self) -> String {
        match &self.key {
            Some(key) => format!("{}/{key}", self.id),
            None => self.id.to_string(),
        }
    }
}

/// A reveal attempt, as extracted from an inbound request
pub struct RevealRequest {
    pub id: String,
    pub key: Option<String>,
    pub password: Option<SecretString>,
}

impl RevealRequest {
    pub fn new(id: impl Into<String>, key: Option<String>) -> Self {
        Self {
            id: id.into(),
            key,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }
}

/// Plaintext handed out exactly once
pub struct Revealed {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub filename: Option<String>,
}

impl std::fmt::Debug for Revealed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revealed")
            .field("plaintext", &"[REDACTED]")
            .field("filename", &self.filename)
            .finish()
    }
}

/// Result of a reveal attempt. Storage faults are reported separately as
/// errors; these are the only three answers a visitor can ever observe.
#[derive(Debug)]
pub enum Outcome {
    Delivered(Revealed),
    /// Absent, already claimed, or malformed: deliberately indistinguishable
    AlreadyRevealedOrInvalid,
    /// Wrong key or password. The record has been destroyed.
    WrongCredential,
}

impl Outcome {
    /// Stable label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Delivered(_) => "delivered",
            Outcome::AlreadyRevealedOrInvalid => "already_revealed",
            Outcome::WrongCredential => "wrong_credential",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }
}

/// What a visitor is about to reveal, learned without claiming the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecretKind {
    pub is_file: bool,
    pub password: bool,
}
