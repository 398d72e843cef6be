use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use tally_reconcile::{ChangeKind, ChangeSet};

use crate::keys::change_key;
use crate::{to_pretty_json, ObjectStore};

/// What happened to one non-empty change set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishedSet {
    pub kind: ChangeKind,
    pub key: String,
    pub records: usize,
    /// Destinations that accepted the artifact.
    pub written_to: Vec<String>,
    /// `"<destination>: <failure>"` for each destination that refused it.
    pub failed: Vec<String>,
}

impl PublishedSet {
    pub fn published(&self) -> bool {
        !self.written_to.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub sets: Vec<PublishedSet>,
    /// Kinds with no records this pass; no artifact was written for them.
    pub skipped: Vec<ChangeKind>,
}

impl PublishReport {
    pub fn get(&self, kind: ChangeKind) -> Option<&PublishedSet> {
        self.sets.iter().find(|s| s.kind == kind)
    }

    /// Keys of every set at least one destination accepted.
    pub fn published_keys(&self) -> Vec<&str> {
        self.sets
            .iter()
            .filter(|s| s.published())
            .map(|s| s.key.as_str())
            .collect()
    }

    pub fn all_published(&self) -> bool {
        self.sets.iter().all(PublishedSet::published)
    }
}

/// Writes each non-empty change set as a JSON array of records to every
/// destination.
#[derive(Clone, Default)]
pub struct ChangePublisher {
    destinations: Vec<Arc<dyn ObjectStore>>,
}

impl ChangePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.destinations.push(store);
        self
    }

    pub fn destinations(&self) -> usize {
        self.destinations.len()
    }

    /// Publish all three sets under keys stamped with `at`. Never fails as a
    /// whole; per-destination failures are logged and listed in the report.
    pub fn publish(&self, changes: &ChangeSet, at: DateTime<Utc>) -> PublishReport {
        let mut report = PublishReport::default();

        for kind in ChangeKind::ALL {
            let records = changes.get(kind);
            if records.is_empty() {
                info!(kind = %kind, "no changes");
                report.skipped.push(kind);
                continue;
            }

            let key = change_key(kind, at);
            let mut set = PublishedSet {
                kind,
                key: key.clone(),
                records: records.len(),
                written_to: Vec::new(),
                failed: Vec::new(),
            };

            match to_pretty_json(records) {
                Ok(body) => {
                    for dest in &self.destinations {
                        match dest.save(&key, &body) {
                            Ok(()) => set.written_to.push(dest.describe()),
                            Err(f) => {
                                warn!(kind = %kind, key = %key, dest = %dest.describe(), error = %f, "change set write failed");
                                set.failed.push(format!("{}: {f}", dest.describe()));
                            }
                        }
                    }
                }
                Err(f) => set.failed.push(f.to_string()),
            }

            if set.published() {
                info!(kind = %kind, key = %key, records = set.records, "change set published");
            } else {
                warn!(kind = %kind, key = %key, "change set not published to any destination");
            }
            report.sets.push(set);
        }

        report
    }
}
