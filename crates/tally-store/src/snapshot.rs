use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use tally_reconcile::record_adapter::{snapshot_from_values, snapshot_to_values};
use tally_reconcile::{RecordError, RecordFields, Snapshot};

use crate::keys::{archive_key, LATEST_KEY};
use crate::{to_pretty_json, LoadOutcome, ObjectStore, StoreFailure};

/// Where a loaded snapshot came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Decoded from the stored latest object.
    Stored,
    /// Nothing stored yet (first run).
    Missing,
    /// The read failed or the bytes were not a JSON array; starting cold.
    Unreadable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub origin: SnapshotOrigin,
}

impl LoadedSnapshot {
    fn cold(origin: SnapshotOrigin) -> Self {
        Self {
            snapshot: Snapshot::empty(),
            origin,
        }
    }
}

/// Outcome of the double write. Both writes are always attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReport {
    pub records: usize,
    pub archive_key: String,
    pub archive: Result<(), StoreFailure>,
    pub latest_key: String,
    pub latest: Result<(), StoreFailure>,
}

impl SaveReport {
    pub fn success(&self) -> bool {
        self.archive.is_ok() && self.latest.is_ok()
    }
}

/// Reads and writes the snapshot blob on one [`ObjectStore`].
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn ObjectStore>,
    fields: RecordFields,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn ObjectStore>, fields: RecordFields) -> Self {
        Self { store, fields }
    }

    pub fn location(&self) -> String {
        self.store.describe()
    }

    /// Load the latest snapshot.
    ///
    /// Missing object, failed read, or bytes that are not a JSON array all
    /// yield an empty snapshot. A stored record without a usable identity is
    /// a data-format error and is returned as such.
    pub fn load(&self) -> Result<LoadedSnapshot, RecordError> {
        let bytes = match self.store.load(LATEST_KEY) {
            LoadOutcome::Found(bytes) => bytes,
            LoadOutcome::NotFound => {
                info!(key = LATEST_KEY, store = %self.store.describe(), "no stored snapshot; starting empty");
                return Ok(LoadedSnapshot::cold(SnapshotOrigin::Missing));
            }
            LoadOutcome::Failed(f) => {
                warn!(key = LATEST_KEY, error = %f, "snapshot read failed; starting empty");
                return Ok(LoadedSnapshot::cold(SnapshotOrigin::Unreadable));
            }
        };

        let values: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = LATEST_KEY, error = %e, "stored snapshot is not a JSON array; starting empty");
                return Ok(LoadedSnapshot::cold(SnapshotOrigin::Unreadable));
            }
        };

        let snapshot = snapshot_from_values(values, &self.fields)?;
        info!(key = LATEST_KEY, records = snapshot.len(), "snapshot loaded");
        Ok(LoadedSnapshot {
            snapshot,
            origin: SnapshotOrigin::Stored,
        })
    }

    /// Write the snapshot to today's archive key, then to the latest key.
    pub fn save(&self, snapshot: &Snapshot, today: NaiveDate) -> SaveReport {
        let archive_key = archive_key(today);
        let records = snapshot.len();

        let (archive, latest) = match to_pretty_json(&snapshot_to_values(snapshot)) {
            Ok(body) => (
                self.write(&archive_key, &body),
                self.write(LATEST_KEY, &body),
            ),
            Err(f) => (Err(f.clone()), Err(f)),
        };

        let report = SaveReport {
            records,
            archive_key,
            archive,
            latest_key: LATEST_KEY.to_string(),
            latest,
        };
        if report.success() {
            info!(records, archive = %report.archive_key, "snapshot saved");
        }
        report
    }

    fn write(&self, key: &str, body: &[u8]) -> Result<(), StoreFailure> {
        self.store.save(key, body).inspect_err(|f| {
            warn!(key, store = %self.store.describe(), error = %f, "snapshot write failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectStore;
    use serde_json::json;
    use tally_reconcile::record_adapter::records_from_values;
    use tally_reconcile::RecordId;

    fn store() -> (Arc<MemoryObjectStore>, SnapshotStore) {
        let mem = Arc::new(MemoryObjectStore::new());
        let snap = SnapshotStore::new(mem.clone(), RecordFields::harvest());
        (mem, snap)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    #[test]
    fn missing_object_is_empty() {
        let (_, s) = store();
        let loaded = s.load().unwrap();
        assert!(loaded.snapshot.is_empty());
        assert_eq!(loaded.origin, SnapshotOrigin::Missing);
    }

    #[test]
    fn failed_read_is_empty_with_unreadable_origin() {
        let (mem, s) = store();
        mem.put(LATEST_KEY, r#"[{"id":1}]"#);
        mem.fail_loads(StoreFailure::transient("503 slow down"));
        let loaded = s.load().unwrap();
        assert!(loaded.snapshot.is_empty());
        assert_eq!(loaded.origin, SnapshotOrigin::Unreadable);
    }

    #[test]
    fn garbage_bytes_are_empty() {
        let (mem, s) = store();
        mem.put(LATEST_KEY, "{not json");
        assert_eq!(s.load().unwrap().origin, SnapshotOrigin::Unreadable);

        mem.put(LATEST_KEY, r#"{"id": 1}"#);
        assert_eq!(s.load().unwrap().origin, SnapshotOrigin::Unreadable);
    }

    #[test]
    fn stored_record_without_identity_is_an_error() {
        let (mem, s) = store();
        mem.put(LATEST_KEY, r#"[{"id":1},{"spent_date":"2024-01-01"}]"#);
        let err = s.load().unwrap_err();
        assert!(matches!(err, RecordError::MissingIdentity { .. }));
    }

    #[test]
    fn save_writes_archive_and_latest_sorted_by_date() {
        let (mem, s) = store();
        let snap = Snapshot::from_records(
            records_from_values(
                vec![
                    json!({"id": 2, "spent_date": "2024-01-20"}),
                    json!({"id": 1, "spent_date": "2024-01-05"}),
                ],
                &RecordFields::harvest(),
            )
            .unwrap(),
        );

        let report = s.save(&snap, day());
        assert!(report.success());
        assert_eq!(report.archive_key, "daily/20240201.json");
        assert_eq!(report.records, 2);

        let latest: Vec<Value> = serde_json::from_slice(&mem.get(LATEST_KEY).unwrap()).unwrap();
        let ids: Vec<i64> = latest.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(mem.get("daily/20240201.json"), mem.get(LATEST_KEY));

        let back = s.load().unwrap();
        assert_eq!(back.origin, SnapshotOrigin::Stored);
        assert!(back.snapshot.contains(&RecordId::Int(2)));
    }

    #[test]
    fn archive_failure_still_writes_latest_but_reports_failure() {
        let (mem, s) = store();
        mem.fail_saves_under("daily/", StoreFailure::fatal("denied"));

        let report = s.save(&Snapshot::empty(), day());
        assert!(!report.success());
        assert!(report.archive.is_err());
        assert!(report.latest.is_ok());
        assert!(mem.get(LATEST_KEY).is_some());
    }
}
