use hush_core::config::HushConfig;
use hush_core::{HushError, HushResult, KeyMode};
use hush_crypto::{KdfParams, SecretKey};

/// Immutable controller settings, built once at startup
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub mode: KeyMode,
    /// Required in server mode, ignored in link mode
    pub server_key: Option<SecretKey>,
    pub kdf: KdfParams,
    pub max_payload_bytes: usize,
}

impl VaultSettings {
    /// Per-secret keys carried in the link.
    pub fn link() -> Self {
        Self {
            mode: KeyMode::Link,
            server_key: None,
            kdf: KdfParams::default(),
            max_payload_bytes: 10_000_000,
        }
    }

    /// One server-held key for every record.
    pub fn server(key: SecretKey) -> Self {
        Self {
            mode: KeyMode::Server,
            server_key: Some(key),
            ..Self::link()
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    pub fn from_config(config: &HushConfig, server_key: Option<SecretKey>) -> HushResult<Self> {
        let settings = Self {
            mode: config.crypto.mode,
            server_key,
            kdf: KdfParams {
                mem_cost_kib: config.crypto.argon2_mem_cost_kib,
                time_cost: config.crypto.argon2_time_cost,
                parallelism: config.crypto.argon2_parallelism,
            },
            max_payload_bytes: config.store.max_payload_bytes,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> HushResult<()> {
        if self.mode == KeyMode::Server && self.server_key.is_none() {
            return Err(HushError::Config(
                "server key mode requires a server key (crypto.server_key_file or HUSH_SERVER_KEY)"
                    .into(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(HushError::Config("max_payload_bytes must be positive".into()));
        }
        Ok(())
    }
}
