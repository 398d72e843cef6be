//! Settings read from environment variables (hosted/serverless runs).

use std::path::PathBuf;

use crate::{
    AppConfig, ConfigError, StorageConfig, DEFAULT_DAYS_BACK, DEFAULT_HARVEST_URL,
    DEFAULT_REGION, DEFAULT_STORE_ROOT,
};

pub const ENV_ACCOUNT_ID: &str = "HARVEST_ACCOUNT_ID";
pub const ENV_ACCESS_TOKEN: &str = "HARVEST_ACCESS_TOKEN";
pub const ENV_HARVEST_URL: &str = "HARVEST_URL";
pub const ENV_DAYS_BACK: &str = "DAYS_BACK";
pub const ENV_BUCKET: &str = "S3_BUCKET_NAME";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_STORE_ROOT: &str = "TALLY_STORE_ROOT";
pub const ENV_LOCAL_CHANGES_DIR: &str = "TALLY_LOCAL_CHANGES_DIR";

/// Presence of this variable selects env-based configuration.
pub const ENV_HOSTED_MARKER: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Process environment, blank values treated as unset.
pub fn process_env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn load_env(lookup: &dyn Fn(&str) -> Option<String>) -> Result<AppConfig, ConfigError> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let require = |name: &str| {
        get(name).ok_or_else(|| ConfigError::MissingField {
            field: name.to_string(),
        })
    };

    let account_id = require(ENV_ACCOUNT_ID)?;
    let access_token = require(ENV_ACCESS_TOKEN)?;
    let bucket_name = require(ENV_BUCKET)?;

    let days_back = match get(ENV_DAYS_BACK) {
        None => DEFAULT_DAYS_BACK,
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidValue {
                field: ENV_DAYS_BACK.to_string(),
                message: format!("{e} (got {raw:?})"),
            })?,
    };

    let region = get(ENV_REGION)
        .or_else(|| get(ENV_DEFAULT_REGION))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    Ok(AppConfig {
        account_id,
        access_token,
        harvest_url: get(ENV_HARVEST_URL).unwrap_or_else(|| DEFAULT_HARVEST_URL.to_string()),
        days_back,
        storage: StorageConfig {
            bucket_name,
            region,
            root_dir: get(ENV_STORE_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT)),
        },
        local_changes_dir: get(ENV_LOCAL_CHANGES_DIR).map(PathBuf::from),
    })
}
