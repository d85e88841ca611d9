//! Lifecycle controller: create and reveal on top of an `AtomicRecordStore`

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use hush_core::{
    Created, HushError, HushResult, KeyMode, NewSecret, Outcome, RevealRequest, Revealed,
    SecretKind,
};
use hush_crypto::{
    decode_link_key, encode_link_key, open, seal, seal_password_check, verify_password_check,
    CryptoError, Domain, SecretKey,
};
use hush_store::{AtomicRecordStore, ClaimHandle, RecordDraft, StoreError};

use crate::settings::VaultSettings;

pub struct Vault<S> {
    store: S,
    settings: VaultSettings,
}

impl<S: AtomicRecordStore> Vault<S> {
    pub fn new(store: S, settings: VaultSettings) -> HushResult<Self> {
        settings.validate()?;
        Ok(Self { store, settings })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Seal and persist a new secret.
    ///
    /// Text secrets must contain something other than whitespace; file
    /// secrets may be empty. Nothing is written when validation fails.
    pub fn create(&self, secret: NewSecret) -> HushResult<Created> {
        if secret.filename.is_none() && secret.payload.trim_ascii().is_empty() {
            return Err(HushError::InvalidRequest("empty secret".into()));
        }
        if secret.payload.len() > self.settings.max_payload_bytes {
            return Err(HushError::InvalidRequest(format!(
                "secret is {} bytes, limit is {}",
                secret.payload.len(),
                self.settings.max_payload_bytes
            )));
        }

        let (key, link_key) = match self.settings.mode {
            KeyMode::Link => {
                let key = SecretKey::generate();
                let encoded = encode_link_key(&key);
                (key, Some(encoded))
            }
            KeyMode::Server => (self.server_key()?.clone(), None),
        };

        let ciphertext = seal(&key, Domain::Payload, &secret.payload).map_err(crypto_fault)?;
        let filename = secret
            .filename
            .as_ref()
            .map(|name| seal(&key, Domain::Filename, name.as_bytes()))
            .transpose()
            .map_err(crypto_fault)?;
        let password_check = secret
            .password
            .as_ref()
            .filter(|pw| !pw.expose_secret().is_empty())
            .map(|pw| seal_password_check(pw, &self.settings.kdf))
            .transpose()
            .map_err(crypto_fault)?;

        let draft = RecordDraft {
            ciphertext,
            filename,
            password_check,
        };
        let id = self.store.create(&draft)?;

        info!(
            id = %id,
            file = draft.filename.is_some(),
            password = draft.password_check.is_some(),
            bytes = secret.payload.len(),
            "secret stored"
        );
        Ok(Created { id, key: link_key })
    }

    /// Describe an unrevealed secret without consuming it.
    pub fn probe(&self, id: &str) -> HushResult<Option<SecretKind>> {
        Ok(self.store.probe(id)?)
    }

    /// Attempt the single reveal of a secret.
    ///
    /// Storage faults are the only errors; every credential problem is an
    /// [`Outcome`]. Once the claim succeeds the record is destroyed on every
    /// path, including faults.
    pub fn reveal(&self, request: RevealRequest) -> HushResult<Outcome> {
        let key = match self.settings.mode {
            KeyMode::Link => match request.key.as_deref().map(decode_link_key) {
                Some(Ok(key)) => key,
                // A malformed key can never open anything; leave the record be.
                _ => {
                    debug!("missing or malformed link key");
                    return Ok(Outcome::AlreadyRevealedOrInvalid);
                }
            },
            KeyMode::Server => self.server_key()?.clone(),
        };

        let Some(handle) = self.store.claim(&request.id)? else {
            debug!("record not claimable");
            return Ok(Outcome::AlreadyRevealedOrInvalid);
        };
        let id = handle.id().clone();

        let outcome = self.open_claimed(&handle, &key, request.password.as_ref());
        self.burn(handle);

        match &outcome {
            Ok(outcome) => info!(id = %id, outcome = outcome.label(), "reveal finished"),
            Err(e) => error!(id = %id, error = %e, "reveal failed, record destroyed"),
        }
        outcome
    }

    fn open_claimed(
        &self,
        handle: &ClaimHandle,
        key: &SecretKey,
        password: Option<&SecretString>,
    ) -> HushResult<Outcome> {
        let record = match self.store.read(handle) {
            Ok(record) => record,
            Err(StoreError::Incomplete(id)) => {
                warn!(id = %id, "claimed record has no ciphertext");
                return Ok(Outcome::AlreadyRevealedOrInvalid);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(check) = &record.password_check {
            let Some(candidate) = password else {
                debug!(id = %handle.id(), "password required but not supplied");
                return Ok(Outcome::WrongCredential);
            };
            if let Err(e) = verify_password_check(check, candidate) {
                return Ok(credential_mismatch(handle, "password", &e));
            }
        }

        let plaintext = match open(key, Domain::Payload, &record.ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => return Ok(credential_mismatch(handle, "payload", &e)),
        };

        let filename = match record.filename.as_deref() {
            None => None,
            Some(sealed) => match open(key, Domain::Filename, sealed) {
                Ok(name) => Some(decode_filename(name)),
                Err(e) => return Ok(credential_mismatch(handle, "filename", &e)),
            },
        };

        Ok(Outcome::Delivered(Revealed {
            plaintext,
            filename,
        }))
    }

    /// Destroy a claimed record. A failure here cannot un-claim the record,
    /// so it is logged for operators and the reaper removes the remains.
    fn burn(&self, handle: ClaimHandle) {
        let id = handle.id().clone();
        if let Err(e) = self.store.destroy(handle) {
            error!(id = %id, error = %e, "failed to destroy claimed record");
        }
    }

    fn server_key(&self) -> HushResult<&SecretKey> {
        self.settings
            .server_key
            .as_ref()
            .ok_or_else(|| HushError::Config("server key not loaded".into()))
    }
}

fn credential_mismatch(handle: &ClaimHandle, what: &str, e: &CryptoError) -> Outcome {
    if e.is_credential_mismatch() {
        debug!(id = %handle.id(), what, "credential mismatch");
    } else {
        warn!(id = %handle.id(), what, error = %e, "stored value unusable");
    }
    Outcome::WrongCredential
}

fn decode_filename(name: Zeroizing<Vec<u8>>) -> String {
    String::from_utf8_lossy(&name).into_owned()
}

fn crypto_fault(e: CryptoError) -> HushError {
    HushError::Crypto(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_crypto::KdfParams;
    use hush_store::MemoryRecordStore;

    fn fast_kdf() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn link_vault() -> Vault<MemoryRecordStore> {
        Vault::new(
            MemoryRecordStore::new(8),
            VaultSettings::link().with_kdf(fast_kdf()),
        )
        .unwrap()
    }

    fn delivered(outcome: Outcome) -> Revealed {
        match outcome {
            Outcome::Delivered(revealed) => revealed,
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn test_hello_reveals_once() {
        let vault = link_vault();
        let created = vault.create(NewSecret::text("hello")).unwrap();
        let key = created.key.clone();
        assert!(key.is_some());

        let first = vault
            .reveal(RevealRequest::new(created.id.as_str(), key.clone()))
            .unwrap();
        let revealed = delivered(first);
        assert_eq!(revealed.plaintext.as_slice(), b"hello");
        assert_eq!(revealed.filename, None);

        let second = vault
            .reveal(RevealRequest::new(created.id.as_str(), key))
            .unwrap();
        assert!(matches!(second, Outcome::AlreadyRevealedOrInvalid));
        assert!(vault.store().is_empty());
    }

    #[test]
    fn test_wrong_password_destroys() {
        let vault = link_vault();
        let created = vault
            .create(NewSecret::text("secret").with_password("pw"))
            .unwrap();

        let bad = vault
            .reveal(
                RevealRequest::new(created.id.as_str(), created.key.clone())
                    .with_password("bad"),
            )
            .unwrap();
        assert!(matches!(bad, Outcome::WrongCredential));

        let good = vault
            .reveal(
                RevealRequest::new(created.id.as_str(), created.key.clone())
                    .with_password("pw"),
            )
            .unwrap();
        assert!(matches!(good, Outcome::AlreadyRevealedOrInvalid));
    }

    #[test]
    fn test_missing_password_destroys() {
        let vault = link_vault();
        let created = vault
            .create(NewSecret::text("secret").with_password("pw"))
            .unwrap();

        let outcome = vault
            .reveal(RevealRequest::new(created.id.as_str(), created.key.clone()))
            .unwrap();
        assert!(matches!(outcome, Outcome::WrongCredential));
        assert!(vault.store().is_empty());
    }

    #[test]
    fn test_correct_password_delivers() {
        let vault = link_vault();
        let created = vault
            .create(NewSecret::text("secret").with_password("pw"))
            .unwrap();
        let outcome = vault
            .reveal(
                RevealRequest::new(created.id.as_str(), created.key.clone())
                    .with_password("pw"),
            )
            .unwrap();
        assert_eq!(delivered(outcome).plaintext.as_slice(), b"secret");
    }

    #[test]
    fn test_empty_password_means_none() {
        let vault = link_vault();
        let created = vault
            .create(NewSecret::text("secret").with_password(""))
            .unwrap();
        assert_eq!(
            vault.probe(created.id.as_str()).unwrap(),
            Some(SecretKind {
                is_file: false,
                password: false
            })
        );
    }

    #[test]
    fn test_wrong_key_destroys() {
        let vault = link_vault();
        let created = vault.create(NewSecret::text("hello")).unwrap();
        let wrong = encode_link_key(&SecretKey::generate());

        let outcome = vault
            .reveal(RevealRequest::new(created.id.as_str(), Some(wrong)))
            .unwrap();
        assert!(matches!(outcome, Outcome::WrongCredential));

        let retry = vault
            .reveal(RevealRequest::new(created.id.as_str(), created.key.clone()))
            .unwrap();
        assert!(matches!(retry, Outcome::AlreadyRevealedOrInvalid));
    }

    #[test]
    fn test_malformed_key_leaves_record() {
        let vault = link_vault();
        let created = vault.create(NewSecret::text("hello")).unwrap();

        for key in [None, Some("short".to_string()), Some("!".repeat(43))] {
            let outcome = vault
                .reveal(RevealRequest::new(created.id.as_str(), key))
                .unwrap();
            assert!(matches!(outcome, Outcome::AlreadyRevealedOrInvalid));
        }

        let outcome = vault
            .reveal(RevealRequest::new(created.id.as_str(), created.key.clone()))
            .unwrap();
        assert!(outcome.is_delivered());
    }

    #[test]
    fn test_file_secret_keeps_filename() {
        let vault = link_vault();
        let created = vault
            .create(NewSecret::file(vec![0, 1, 2, 255], "Bericht für Müller.pdf"))
            .unwrap();
        assert_eq!(
            vault.probe(created.id.as_str()).unwrap(),
            Some(SecretKind {
                is_file: true,
                password: false
            })
        );

        let revealed = delivered(
            vault
                .reveal(RevealRequest::new(created.id.as_str(), created.key.clone()))
                .unwrap(),
        );
        assert_eq!(revealed.plaintext.as_slice(), &[0, 1, 2, 255]);
        assert_eq!(revealed.filename.as_deref(), Some("Bericht für Müller.pdf"));
    }

    #[test]
    fn test_empty_file_is_allowed_but_empty_text_is_not() {
        let vault = link_vault();
        assert!(vault.create(NewSecret::file(Vec::new(), "empty.txt")).is_ok());

        let err = vault.create(NewSecret::text("  \n\t ")).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(vault.store().len(), 1);
    }

    #[test]
    fn test_payload_limit() {
        let vault = Vault::new(
            MemoryRecordStore::new(8),
            VaultSettings::link().with_max_payload_bytes(4),
        )
        .unwrap();
        assert!(vault.create(NewSecret::text("1234")).is_ok());
        let err = vault.create(NewSecret::text("12345")).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_server_mode_roundtrip() {
        let vault = Vault::new(
            MemoryRecordStore::new(64),
            VaultSettings::server(SecretKey::generate()).with_kdf(fast_kdf()),
        )
        .unwrap();
        let created = vault.create(NewSecret::text("server held")).unwrap();
        assert!(created.key.is_none());
        assert_eq!(created.id.as_str().len(), 64);

        let revealed = delivered(
            vault
                .reveal(RevealRequest::new(created.id.as_str(), None))
                .unwrap(),
        );
        assert_eq!(revealed.plaintext.as_slice(), b"server held");
    }

    #[test]
    fn test_server_mode_without_key_is_rejected() {
        let mut settings = VaultSettings::link();
        settings.mode = KeyMode::Server;
        assert!(Vault::new(MemoryRecordStore::new(64), settings).is_err());
    }

    #[test]
    fn test_unknown_ids_look_alike() {
        let vault = link_vault();
        let key = Some(encode_link_key(&SecretKey::generate()));
        for id in ["AAAAAAAA", "x", "AAAAAAAA_locked", "../../../"] {
            let outcome = vault.reveal(RevealRequest::new(id, key.clone())).unwrap();
            assert!(matches!(outcome, Outcome::AlreadyRevealedOrInvalid), "{id}");
        }
    }
}
