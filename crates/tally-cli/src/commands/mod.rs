//! Command handlers for the `tally` binary.
//!
//! Machine-readable output goes to stdout; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use tally_config::ConfigSource;
use tally_notify::{route, LogHandler};
use tally_runtime::{ConfiguredPass, Runner};

/// `--env` wins, then explicit `--config` paths, then auto-detection.
pub fn config_source(paths: Vec<PathBuf>, env: bool) -> ConfigSource {
    if env {
        ConfigSource::Env
    } else if !paths.is_empty() {
        ConfigSource::File(paths)
    } else {
        ConfigSource::detect()
    }
}

/// Read a JSON event file. A UTF-8 BOM is tolerated.
pub fn load_event(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read event file failed: {}", path.display()))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("event file must be UTF-8 text")?;
    let v: Value = serde_json::from_str(raw.trim()).context("event file must contain valid JSON")?;
    Ok(v)
}

pub async fn run_pass(source: ConfigSource) -> Result<()> {
    info!(source = %source.describe(), "config source selected");
    let runner = Runner::new(Arc::new(ConfiguredPass::new(source)));
    let summary = runner
        .run_pass_at(Utc::now())
        .await
        .context("reconciliation pass failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("serialize summary failed")?
    );
    if !summary.success {
        anyhow::bail!("snapshot was not fully persisted (pass_id={})", summary.pass_id);
    }
    Ok(())
}

pub fn route_event(path: &Path) -> Result<()> {
    let event = load_event(path)?;
    match route(&event, &LogHandler) {
        Some(n) => println!(
            "{}",
            serde_json::to_string_pretty(&n).context("serialize notification failed")?
        ),
        None => println!("routed=false"),
    }
    Ok(())
}

pub fn config_check(source: ConfigSource) -> Result<()> {
    let cfg = source
        .load()
        .with_context(|| format!("config check failed ({})", source.describe()))?;
    println!("config_source={}", source.describe());
    println!("config_fingerprint={}", cfg.fingerprint());
    println!(
        "{}",
        serde_json::to_string_pretty(&cfg.redacted_json()).context("serialize config failed")?
    );
    Ok(())
}
