use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use tally_config::{AppConfig, ConfigSource};
use tally_notify::{route, ArtifactHandler, LogHandler};
use tally_reconcile::RecordFields;
use tally_source::HarvestFetcher;
use tally_store::{ChangePublisher, FsObjectStore, ObjectStore, SnapshotStore};

use crate::{run_pass, PassDeps, PassError, PassSummary};

/// Status code plus JSON body, returned for every trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerResponse {
    pub status_code: u16,
    pub body: Value,
}

impl TriggerResponse {
    pub fn pass_completed(summary: &PassSummary) -> Self {
        Self {
            status_code: 200,
            body: json!({
                "message": "reconciliation pass completed",
                "summary": summary,
            }),
        }
    }

    pub fn error(err: &PassError) -> Self {
        Self {
            status_code: err.status_code(),
            body: json!({ "error": err.to_string() }),
        }
    }
}

/// Produces the collaborators for one pass. Called per pass so settings are
/// re-read every time.
pub trait PassBuilder: Send + Sync {
    fn build(&self) -> Result<PassDeps, PassError>;
}

/// Builds a pass from an [`AppConfig`] loaded through a [`ConfigSource`].
#[derive(Debug, Clone)]
pub struct ConfiguredPass {
    source: ConfigSource,
}

impl ConfiguredPass {
    pub fn new(source: ConfigSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }
}

/// Wire the Harvest client, the bucket store and the publisher destinations
/// for `cfg`.
pub fn deps_from_config(cfg: &AppConfig) -> Result<PassDeps, PassError> {
    let fetcher = HarvestFetcher::new(&cfg.account_id, &cfg.access_token, &cfg.harvest_url)?;

    let bucket: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(cfg.storage.bucket_root()));
    let mut publisher = ChangePublisher::new().with_destination(bucket.clone());
    if let Some(dir) = &cfg.local_changes_dir {
        publisher = publisher.with_destination(Arc::new(FsObjectStore::new(dir)));
    }

    Ok(PassDeps {
        fetcher: Arc::new(fetcher),
        snapshots: SnapshotStore::new(bucket, RecordFields::harvest()),
        publisher,
        fields: RecordFields::harvest(),
        days_back: cfg.days_back,
    })
}

impl PassBuilder for ConfiguredPass {
    fn build(&self) -> Result<PassDeps, PassError> {
        let cfg = self.source.load()?;
        info!(
            source = %self.source.describe(),
            fingerprint = %cfg.fingerprint(),
            bucket = %cfg.storage.bucket_name,
            region = %cfg.storage.region,
            days_back = cfg.days_back,
            "config loaded"
        );
        deps_from_config(&cfg)
    }
}

/// Entry point for every trigger shape.
///
/// - artifact notification → routed to the handler, 200
/// - anything else → a full pass, 200 with the summary
/// - config error → 400; fetch or data-format error → 500
#[derive(Clone)]
pub struct Runner {
    builder: Arc<dyn PassBuilder>,
    handler: Arc<dyn ArtifactHandler>,
}

impl Runner {
    pub fn new(builder: Arc<dyn PassBuilder>) -> Self {
        Self {
            builder,
            handler: Arc::new(LogHandler),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn ArtifactHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Build and run one pass.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassSummary, PassError> {
        let deps = self.builder.build()?;
        run_pass(&deps, now).await
    }

    pub async fn handle(&self, event: &Value) -> TriggerResponse {
        self.handle_at(event, Utc::now()).await
    }

    pub async fn handle_at(&self, event: &Value, now: DateTime<Utc>) -> TriggerResponse {
        if let Some(n) = route(event, self.handler.as_ref()) {
            return TriggerResponse {
                status_code: 200,
                body: json!({
                    "message": "artifact notification routed",
                    "event": n,
                }),
            };
        }

        match self.run_pass_at(now).await {
            Ok(summary) => TriggerResponse::pass_completed(&summary),
            Err(e) => {
                error!(status = e.status_code(), error = %e, "pass failed");
                TriggerResponse::error(&e)
            }
        }
    }
}
