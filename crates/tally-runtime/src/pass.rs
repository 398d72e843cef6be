use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use tally_reconcile::record_adapter::records_from_values;
use tally_reconcile::{classify, merge, MergeOutcome, RecordFields, Window};
use tally_source::{FetchRequest, RecordFetcher};
use tally_store::{ChangePublisher, SnapshotStore};

use crate::display::log_change_summary;
use crate::PassError;

/// Everything one pass talks to.
#[derive(Clone)]
pub struct PassDeps {
    pub fetcher: Arc<dyn RecordFetcher>,
    pub snapshots: SnapshotStore,
    pub publisher: ChangePublisher,
    pub fields: RecordFields,
    pub days_back: u32,
}

/// Structured result of a pass that got past the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub window_start: String,
    pub window_end: String,
    /// Records in the snapshot before this pass.
    pub loaded: usize,
    /// Records returned by the source.
    pub fetched: usize,
    pub created: usize,
    pub removed: usize,
    pub modified: usize,
    /// Dropped by the retention cutoff.
    pub pruned: usize,
    /// Records in the snapshot written at the end of the pass.
    pub persisted: usize,
    /// Change-set artifact keys that reached at least one destination.
    pub published: Vec<String>,
    /// Both snapshot writes succeeded.
    pub success: bool,
}

/// Storage backends do synchronous IO; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, PassError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PassError::Task(e.to_string()))
}

/// Run one fetch → classify → publish → merge → persist cycle.
///
/// Fetch and data-format errors abort before anything is written. A failed
/// snapshot write does not: the summary comes back with `success == false`
/// and whatever change sets were already published stay published.
pub async fn run_pass(deps: &PassDeps, now: DateTime<Utc>) -> Result<PassSummary, PassError> {
    let pass_id = Uuid::new_v4();
    let today = now.date_naive();
    let window = Window::lookback(today, deps.days_back);

    info!(
        %pass_id,
        source = deps.fetcher.source_name(),
        window_start = %window.start_key(),
        window_end = %window.end_key(),
        "pass start"
    );

    let fetched_raw = deps
        .fetcher
        .fetch_all(FetchRequest::new(window.start(), window.end()))
        .await?;
    let fetched = records_from_values(fetched_raw.records, &deps.fields)?;

    let snapshots = deps.snapshots.clone();
    let loaded = blocking(move || snapshots.load()).await??;
    let previous = loaded.snapshot;
    let loaded_count = previous.len();

    let changes = classify(&previous, &fetched, window.start());
    log_change_summary(&changes);

    let publisher = deps.publisher.clone();
    let (report, changes) = blocking(move || {
        let report = publisher.publish(&changes, now);
        (report, changes)
    })
    .await?;
    let published: Vec<String> = report
        .published_keys()
        .into_iter()
        .map(str::to_string)
        .collect();

    let MergeOutcome { snapshot, stats } = merge(previous, &fetched, window.start());
    info!(
        %pass_id,
        before = stats.before,
        inserted = stats.inserted,
        refreshed = stats.refreshed,
        deleted = stats.deleted.len(),
        pruned = stats.pruned.len(),
        after = stats.after,
        "snapshot merged"
    );

    let snapshots = deps.snapshots.clone();
    let save = blocking(move || snapshots.save(&snapshot, today)).await?;
    if !save.success() {
        warn!(%pass_id, location = %deps.snapshots.location(), "snapshot not fully persisted");
    }

    let summary = PassSummary {
        pass_id,
        window_start: window.start_key(),
        window_end: window.end_key(),
        loaded: loaded_count,
        fetched: fetched.len(),
        created: changes.created.len(),
        removed: changes.removed.len(),
        modified: changes.modified.len(),
        pruned: stats.pruned.len(),
        persisted: stats.after,
        published,
        success: save.success(),
    };
    info!(
        %pass_id,
        loaded = summary.loaded,
        fetched = summary.fetched,
        persisted = summary.persisted,
        success = summary.success,
        "pass complete"
    );
    Ok(summary)
}
