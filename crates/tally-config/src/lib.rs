//! tally-config
//!
//! Loads the settings a reconciliation pass needs: Harvest account and
//! token, API url, lookback length, and where the bucket lives.
//!
//! The caller picks a [`ConfigSource`] up front (files or environment); the
//! engine never branches on where its settings came from.
//!
//! Secrets:
//! - `Debug` on [`AppConfig`] redacts the access token
//! - the token is left out of [`AppConfig::fingerprint`] and
//!   [`AppConfig::redacted_json`]
//! - errors name the missing field or env var, never a value

pub mod env;
mod error;
pub mod layered;

use std::fmt;
use std::path::PathBuf;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub use error::ConfigError;

pub const DEFAULT_HARVEST_URL: &str = "https://api.harvestapp.com/v2/time_entries";
pub const DEFAULT_DAYS_BACK: u32 = 90;
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_STORE_ROOT: &str = "./data";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub bucket_name: String,
    pub region: String,
    /// Parent directory of the bucket directory for the filesystem backend.
    pub root_dir: PathBuf,
}

impl StorageConfig {
    /// Directory that holds this bucket's objects.
    pub fn bucket_root(&self) -> PathBuf {
        self.root_dir.join(&self.bucket_name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub account_id: String,
    pub access_token: String,
    pub harvest_url: String,
    pub days_back: u32,
    pub storage: StorageConfig,
    /// Extra destination for change-set artifacts, if set.
    pub local_changes_dir: Option<PathBuf>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("account_id", &self.account_id)
            .field("access_token", &"<REDACTED>")
            .field("harvest_url", &self.harvest_url)
            .field("days_back", &self.days_back)
            .field("storage", &self.storage)
            .field("local_changes_dir", &self.local_changes_dir)
            .finish()
    }
}

impl AppConfig {
    fn public_fields(&self) -> Value {
        json!({
            "account_id": self.account_id,
            "harvest_url": self.harvest_url,
            "days_back": self.days_back,
            "storage": {
                "bucket_name": self.storage.bucket_name,
                "region": self.storage.region,
                "root_dir": self.storage.root_dir.display().to_string(),
            },
            "local_changes_dir": self.local_changes_dir.as_ref().map(|p| p.display().to_string()),
        })
    }

    /// Everything except the token, with the token shown as `<REDACTED>`.
    pub fn redacted_json(&self) -> Value {
        let mut v = self.public_fields();
        v["access_token"] = Value::String("<REDACTED>".to_string());
        v
    }

    /// SHA-256 hex of the compact JSON of the non-secret fields. Object keys
    /// serialize sorted, so equal settings give equal fingerprints.
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.public_fields().to_string().as_bytes())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Where settings come from. Chosen once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// One or more YAML/JSON files, later ones overriding earlier ones.
    File(Vec<PathBuf>),
    /// Process environment variables.
    Env,
}

impl ConfigSource {
    /// Env when running hosted (see [`env::ENV_HOSTED_MARKER`]), else
    /// `config.json` in the working directory.
    pub fn detect() -> Self {
        Self::detect_with(&env::process_env)
    }

    pub fn detect_with(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        if lookup(env::ENV_HOSTED_MARKER).is_some() {
            ConfigSource::Env
        } else {
            ConfigSource::File(vec![PathBuf::from(DEFAULT_CONFIG_FILE)])
        }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(&env::process_env)
    }

    /// Load with an explicit env lookup (used both for `Env` and for
    /// `access_token_env` in files).
    pub fn load_with(
        &self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<AppConfig, ConfigError> {
        match self {
            ConfigSource::File(paths) => {
                if paths.is_empty() {
                    return Err(ConfigError::MissingField {
                        field: "config file path".to_string(),
                    });
                }
                layered::load_files(paths, lookup)
            }
            ConfigSource::Env => env::load_env(lookup),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ConfigSource::File(paths) => {
                let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                format!("file:{}", names.join(","))
            }
            ConfigSource::Env => "env".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            account_id: "123".to_string(),
            access_token: "pat-very-secret".to_string(),
            harvest_url: DEFAULT_HARVEST_URL.to_string(),
            days_back: 90,
            storage: StorageConfig {
                bucket_name: "tally-bucket".to_string(),
                region: "eu-west-3".to_string(),
                root_dir: PathBuf::from("./data"),
            },
            local_changes_dir: None,
        }
    }

    #[test]
    fn debug_and_json_redact_token() {
        let cfg = sample();
        assert!(!format!("{cfg:?}").contains("pat-very-secret"));
        let v = cfg.redacted_json();
        assert_eq!(v["access_token"], "<REDACTED>");
        assert!(!v.to_string().contains("pat-very-secret"));
    }

    #[test]
    fn fingerprint_ignores_token_but_not_settings() {
        let a = sample();
        let mut b = sample();
        b.access_token = "another".to_string();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.days_back = 30;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn bucket_root_joins_root_and_name() {
        assert_eq!(
            sample().storage.bucket_root(),
            PathBuf::from("./data").join("tally-bucket")
        );
    }

    #[test]
    fn detect_prefers_env_when_hosted() {
        let hosted = |k: &str| (k == env::ENV_HOSTED_MARKER).then(|| "fn".to_string());
        assert_eq!(ConfigSource::detect_with(&hosted), ConfigSource::Env);

        let local = |_: &str| -> Option<String> { None };
        assert_eq!(
            ConfigSource::detect_with(&local),
            ConfigSource::File(vec![PathBuf::from("config.json")])
        );
    }

    #[test]
    fn empty_file_list_is_rejected() {
        let err = ConfigSource::File(vec![]).load_with(&|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }
}
