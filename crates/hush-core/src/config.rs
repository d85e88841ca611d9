use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{HushError, HushResult};
use crate::sid::{id_entropy_bits, MAX_SID_LEN, MIN_SID_LEN};
use crate::types::KeyMode;

/// Default identifier length when the key travels in the link.
pub const DEFAULT_LINK_SID_LEN: usize = 8;

/// Default identifier length when the identifier alone is the capability.
pub const DEFAULT_SERVER_SID_LEN: usize = 64;

/// Server-mode identifiers below this length are too guessable to stand
/// alone (62^32 ≈ 2^190).
pub const MIN_SERVER_SID_LEN: usize = 32;

/// Top-level daemon configuration (loaded from hushlink.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HushConfig {
    pub daemon: DaemonConfig,
    pub store: StoreConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address (default: [::]:8080)
    pub listen: String,
    /// Base URL used when building share links. When unset, links are built
    /// from X-Forwarded-Proto / X-Forwarded-Host / Host.
    pub public_url: Option<String>,
    /// Prometheus metrics endpoint (default: 127.0.0.1:9100)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per live secret
    pub data_dir: PathBuf,
    /// Identifier length; defaults depend on `crypto.mode`
    pub sid_len: Option<usize>,
    /// Largest accepted payload in bytes (default: 10 MB)
    pub max_payload_bytes: usize,
    /// Unrevealed secrets older than this are reaped (default: 7 days)
    pub max_age_secs: u64,
    /// Interval between reaper passes (0 disables the in-process reaper)
    pub sweep_interval_secs: u64,
    /// Claimed directories older than this are treated as crash leftovers
    pub lock_grace_secs: u64,
    /// Overwrite passes before a record file is unlinked
    pub shred_passes: u32,
}

/// Envelope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Key sourcing mode: "link" (default) or "server"
    pub mode: KeyMode,
    /// File holding the base64 server key (server mode). `HUSH_SERVER_KEY`
    /// takes precedence when set.
    pub server_key_file: Option<PathBuf>,
    /// Argon2id memory cost in KiB for password checks (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "[::]:8080".into(),
            public_url: None,
            metrics_addr: Some("127.0.0.1:9100".into()),
            log_level: "info".into(),
            log_format: "json".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/hushlink"),
            sid_len: None,
            max_payload_bytes: 10_000_000,
            max_age_secs: 7 * 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            lock_grace_secs: 60 * 60,
            shred_passes: 3,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            mode: KeyMode::Link,
            server_key_file: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl HushConfig {
    pub fn from_toml_str(content: &str) -> HushResult<Self> {
        let config: HushConfig =
            toml::from_str(content).map_err(|e| HushError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Identifier length in effect for the configured key mode.
    pub fn sid_len(&self) -> usize {
        self.store.sid_len.unwrap_or(match self.crypto.mode {
            KeyMode::Link => DEFAULT_LINK_SID_LEN,
            KeyMode::Server => DEFAULT_SERVER_SID_LEN,
        })
    }

    /// Reject configurations that mix guessing-resistance assumptions.
    ///
    /// Link mode pairs a short id with a 256-bit key, so any id length in
    /// range is acceptable. Server mode has no companion key, so the id must
    /// be long enough to stand alone.
    pub fn validate(&self) -> HushResult<()> {
        let len = self.sid_len();
        if !(MIN_SID_LEN..=MAX_SID_LEN).contains(&len) {
            return Err(HushError::Config(format!(
                "store.sid_len must be between {MIN_SID_LEN} and {MAX_SID_LEN}, got {len}"
            )));
        }
        if self.crypto.mode == KeyMode::Server && len < MIN_SERVER_SID_LEN {
            return Err(HushError::Config(format!(
                "server key mode needs store.sid_len >= {MIN_SERVER_SID_LEN} \
                 (got {len}, {:.0} bits of guessing resistance)",
                id_entropy_bits(len)
            )));
        }
        if self.store.max_payload_bytes == 0 {
            return Err(HushError::Config(
                "store.max_payload_bytes must be positive".into(),
            ));
        }
        if self.daemon.log_format != "json" && self.daemon.log_format != "text" {
            return Err(HushError::Config(format!(
                "daemon.log_format must be \"json\" or \"text\", got {:?}",
                self.daemon.log_format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[daemon]
listen = "127.0.0.1:3000"
public_url = "https://hush.example.com"
log_level = "debug"
log_format = "text"

[store]
data_dir = "/srv/hush"
sid_len = 12
max_payload_bytes = 1000000
max_age_secs = 86400
sweep_interval_secs = 600
shred_passes = 1

[crypto]
mode = "link"
argon2_mem_cost_kib = 19456
argon2_time_cost = 2
argon2_parallelism = 1
"#;
        let config = HushConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.daemon.listen, "127.0.0.1:3000");
        assert_eq!(
            config.daemon.public_url.as_deref(),
            Some("https://hush.example.com")
        );
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/hush"));
        assert_eq!(config.sid_len(), 12);
        assert_eq!(config.store.max_age_secs, 86400);
        assert_eq!(config.store.shred_passes, 1);
        assert_eq!(config.crypto.mode, KeyMode::Link);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 19456);
    }

    #[test]
    fn test_parse_defaults() {
        let config = HushConfig::from_toml_str("").unwrap();

        assert_eq!(config.daemon.listen, "[::]:8080");
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/hushlink"));
        assert_eq!(config.store.max_age_secs, 604800);
        assert_eq!(config.crypto.mode, KeyMode::Link);
        assert_eq!(config.sid_len(), DEFAULT_LINK_SID_LEN);
    }

    #[test]
    fn test_server_mode_defaults_to_long_ids() {
        let config = HushConfig::from_toml_str("[crypto]\nmode = \"server\"\n").unwrap();
        assert_eq!(config.sid_len(), DEFAULT_SERVER_SID_LEN);
    }

    #[test]
    fn test_server_mode_rejects_short_ids() {
        let toml_str = r#"
[store]
sid_len = 8

[crypto]
mode = "server"
"#;
        let err = HushConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("sid_len"), "got: {err}");
    }

    #[test]
    fn test_rejects_out_of_range_sid_len() {
        assert!(HushConfig::from_toml_str("[store]\nsid_len = 3\n").is_err());
        assert!(HushConfig::from_toml_str("[store]\nsid_len = 65\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(HushConfig::from_toml_str("[daemon]\nlog_format = \"xml\"\n").is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = HushConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = HushConfig::from_toml_str(&toml_str).unwrap();

        assert_eq!(config.daemon.listen, parsed.daemon.listen);
        assert_eq!(config.store.data_dir, parsed.store.data_dir);
        assert_eq!(config.crypto.mode, parsed.crypto.mode);
    }
}
