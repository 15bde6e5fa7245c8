use anyhow::{Context, Result};
use keystash_spec::{Algorithm, Digest};
use serde::{Deserialize, Serialize};
use std::env;

use crate::crypto::Crypter;

pub const KEY_ID_ENV: &str = "KEYSTASH_KEY_ID";
pub const ALGORITHM_ENV: &str = "KEYSTASH_ALGORITHM";
pub const DIGEST_ENV: &str = "KEYSTASH_DIGEST";
pub const TABLE_ENV: &str = "KEYSTASH_TABLE";
pub const BUCKET_ENV: &str = "KEYSTASH_BUCKET";
pub const FOLDER_ENV: &str = "KEYSTASH_FOLDER";
pub const REGION_ENV: &str = "KEYSTASH_REGION";
pub const ENDPOINT_ENV: &str = "KEYSTASH_ENDPOINT";

pub const DEFAULT_KEY_ID: &str = "alias/credstash";
pub const DEFAULT_TABLE: &str = "credential-store";

/// Flat keystash settings, as read from the environment or a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystashConfig {
    /// Master key used to mint data keys.
    pub key_id: String,
    pub algorithm: Algorithm,
    /// Digest for new records.
    pub digest: Digest,
    /// Table name for the table-backed store.
    pub table: Option<String>,
    /// Bucket name for the object-backed store. Takes precedence over `table`.
    pub bucket: Option<String>,
    /// Key prefix inside the bucket.
    pub folder: Option<String>,
    pub region: Option<String>,
    /// Endpoint override shared by every client, e.g. a local emulator.
    pub endpoint: Option<String>,
}

impl Default for KeystashConfig {
    fn default() -> Self {
        Self {
            key_id: DEFAULT_KEY_ID.to_string(),
            algorithm: Algorithm::default(),
            digest: Digest::Sha256,
            table: Some(DEFAULT_TABLE.to_string()),
            bucket: None,
            folder: None,
            region: None,
            endpoint: None,
        }
    }
}

impl KeystashConfig {
    /// Load settings from `KEYSTASH_*` variables, falling back to defaults for
    /// anything unset or blank.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let algorithm = match var(ALGORITHM_ENV) {
            Some(value) => value
                .parse()
                .with_context(|| format!("invalid {ALGORITHM_ENV}"))?,
            None => defaults.algorithm,
        };
        let digest = match var(DIGEST_ENV) {
            Some(value) => value
                .parse()
                .with_context(|| format!("invalid {DIGEST_ENV}"))?,
            None => defaults.digest,
        };

        Ok(Self {
            key_id: var(KEY_ID_ENV).unwrap_or(defaults.key_id),
            algorithm,
            digest,
            table: var(TABLE_ENV).or(defaults.table),
            bucket: var(BUCKET_ENV),
            folder: var(FOLDER_ENV),
            region: var(REGION_ENV),
            endpoint: var(ENDPOINT_ENV),
        })
    }

    pub fn crypter(&self) -> Crypter {
        Crypter::new(self.algorithm)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_spec::Error;
    use serial_test::serial;

    const ALL: [&str; 8] = [
        KEY_ID_ENV,
        ALGORITHM_ENV,
        DIGEST_ENV,
        TABLE_ENV,
        BUCKET_ENV,
        FOLDER_ENV,
        REGION_ENV,
        ENDPOINT_ENV,
    ];

    fn clear() {
        for name in ALL {
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    #[serial]
    fn defaults_when_unset() {
        clear();
        let config = KeystashConfig::from_env().unwrap();
        assert_eq!(config, KeystashConfig::default());
        assert_eq!(config.key_id, "alias/credstash");
        assert_eq!(config.table.as_deref(), Some("credential-store"));
        assert_eq!(config.crypter().algorithm(), Algorithm::Aes256Ctr);
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        clear();
        unsafe {
            env::set_var(ALGORITHM_ENV, "aes-256-gcm");
            env::set_var(DIGEST_ENV, "sha512");
            env::set_var(BUCKET_ENV, "secrets-bucket");
            env::set_var(FOLDER_ENV, "prod");
            env::set_var(REGION_ENV, " ");
        }
        let config = KeystashConfig::from_env().unwrap();
        clear();

        assert_eq!(config.algorithm, Algorithm::Aes256Gcm);
        assert_eq!(config.digest, Digest::Sha512);
        assert_eq!(config.bucket.as_deref(), Some("secrets-bucket"));
        assert_eq!(config.folder.as_deref(), Some("prod"));
        assert_eq!(config.region, None);
    }

    #[test]
    #[serial]
    fn rejects_unknown_algorithm() {
        clear();
        unsafe { env::set_var(ALGORITHM_ENV, "des") };
        let err = KeystashConfig::from_env().unwrap_err();
        clear();

        assert!(err.to_string().contains(ALGORITHM_ENV));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Configuration(_))
        ));
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: KeystashConfig =
            serde_json::from_str(r#"{"digest":"SHA512","bucket":"b"}"#).unwrap();
        assert_eq!(config.digest, Digest::Sha512);
        assert_eq!(config.bucket.as_deref(), Some("b"));
        assert_eq!(config.key_id, DEFAULT_KEY_ID);
    }
}
