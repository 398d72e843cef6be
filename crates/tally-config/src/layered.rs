//! File-backed settings: YAML or JSON documents merged in order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::{
    AppConfig, ConfigError, StorageConfig, DEFAULT_DAYS_BACK, DEFAULT_HARVEST_URL,
    DEFAULT_REGION, DEFAULT_STORE_ROOT,
};

/// Read every path and merge them; later files override earlier ones.
pub fn load_files(
    paths: &[PathBuf],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut docs: Vec<(String, String)> = Vec::with_capacity(paths.len());
    for p in paths {
        docs.push((p.display().to_string(), read_file(p)?));
    }
    let refs: Vec<(&str, &str)> = docs.iter().map(|(o, d)| (o.as_str(), d.as_str())).collect();
    load_strings(&refs, lookup)
}

/// `(origin, document)` pairs, merged in order. `origin` only shows up in
/// error messages.
pub fn load_strings(
    docs: &[(&str, &str)],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut merged = Value::Object(Default::default());
    for (origin, raw) in docs {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        let v_json = serde_json::to_value(v_yaml).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            message: format!("yaml->json conversion failed: {e}"),
        })?;
        if !v_json.is_object() {
            return Err(ConfigError::Parse {
                origin: origin.to_string(),
                message: "top level must be a mapping".to_string(),
            });
        }
        merged = deep_merge(merged, v_json);
    }
    from_merged(&merged, lookup)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })
}

pub(crate) fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Non-blank string at `pointer`. Numbers are accepted and rendered as text
/// (YAML reads an unquoted account id as an integer).
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = match config.pointer(pointer)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn require_str_at(config: &Value, pointer: &str, field: &str) -> Result<String, ConfigError> {
    read_str_at(config, pointer).ok_or_else(|| ConfigError::MissingField {
        field: field.to_string(),
    })
}

fn from_merged(
    config: &Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let account_id = require_str_at(config, "/account_id", "account_id")?;
    let access_token = resolve_token(config, lookup)?;

    let harvest_url = read_str_at(config, "/harvest_url").unwrap_or_else(|| {
        warn!(default = DEFAULT_HARVEST_URL, "harvest_url not set; using default");
        DEFAULT_HARVEST_URL.to_string()
    });

    let days_back = match config.pointer("/days_back") {
        None | Some(Value::Null) => {
            warn!(default = DEFAULT_DAYS_BACK, "days_back not set; using default");
            DEFAULT_DAYS_BACK
        }
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "days_back".to_string(),
                message: format!("expected a non-negative integer, got {v}"),
            })?,
    };

    let storage = storage_section(config)?;
    let local_changes_dir = read_str_at(config, "/local_changes_dir").map(PathBuf::from);

    Ok(AppConfig {
        account_id,
        access_token,
        harvest_url,
        days_back,
        storage,
        local_changes_dir,
    })
}

/// `access_token` (literal) wins over `access_token_env` (env var name).
fn resolve_token(
    config: &Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if let Some(token) = read_str_at(config, "/access_token") {
        return Ok(token);
    }
    match read_str_at(config, "/access_token_env") {
        Some(var) => lookup(&var)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingField { field: var }),
        None => Err(ConfigError::MissingField {
            field: "access_token".to_string(),
        }),
    }
}

/// `storage`, or the older `aws` section with the same keys.
fn storage_section(config: &Value) -> Result<StorageConfig, ConfigError> {
    let base = if config.pointer("/storage").is_some_and(Value::is_object) {
        "/storage"
    } else if config.pointer("/aws").is_some_and(Value::is_object) {
        for ignored in ["access_key_id", "secret_access_key"] {
            if config.pointer(&format!("/aws/{ignored}")).is_some() {
                warn!(field = ignored, "aws credential fields in config are ignored");
            }
        }
        "/aws"
    } else {
        return Err(ConfigError::MissingField {
            field: "storage".to_string(),
        });
    };

    let bucket_name = require_str_at(
        config,
        &format!("{base}/bucket_name"),
        &format!("{}.bucket_name", &base[1..]),
    )?;
    let region =
        read_str_at(config, &format!("{base}/region")).unwrap_or_else(|| DEFAULT_REGION.to_string());
    let root_dir = read_str_at(config, &format!("{base}/root_dir"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));

    Ok(StorageConfig {
        bucket_name,
        region,
        root_dir,
    })
}
