use std::fmt;
use std::path::PathBuf;

/// Configuration problems. All of them abort before any network or storage
/// IO. Messages name fields and env vars, never their values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NotFound { path: PathBuf },
    Io { path: PathBuf, message: String },
    Parse { origin: String, message: String },
    /// A required setting is absent or blank. `field` is the config key or
    /// the env var name.
    MissingField { field: String },
    InvalidValue { field: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { path } => write!(
                f,
                "config file not found: {} (expected keys: account_id, access_token or \
                 access_token_env, harvest_url, days_back, storage.bucket_name)",
                path.display()
            ),
            ConfigError::Io { path, message } => {
                write!(f, "failed to read config {}: {message}", path.display())
            }
            ConfigError::Parse { origin, message } => {
                write!(f, "invalid config in {origin}: {message}")
            }
            ConfigError::MissingField { field } => {
                write!(f, "missing required setting: {field}")
            }
            ConfigError::InvalidValue { field, message } => {
                write!(f, "invalid value for {field}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
