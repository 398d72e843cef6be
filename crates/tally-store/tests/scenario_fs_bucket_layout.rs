//! Scenario: one pass worth of writes against a directory bucket lands in the
//! documented layout, and the next pass reads back what this one wrote.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use tally_reconcile::record_adapter::records_from_values;
use tally_reconcile::{ChangeKind, ChangeSet, RecordFields, Snapshot};
use tally_store::{
    ChangePublisher, FsObjectStore, ObjectStore, SnapshotOrigin, SnapshotStore, LATEST_KEY,
};

fn records(vals: Vec<Value>) -> Vec<tally_reconcile::Record> {
    records_from_values(vals, &RecordFields::harvest()).unwrap()
}

#[test]
fn pass_writes_land_in_bucket_layout() {
    let bucket_dir = tempfile::tempdir().unwrap();
    let local_dir = tempfile::tempdir().unwrap();
    let bucket = Arc::new(FsObjectStore::new(bucket_dir.path()));
    let local = Arc::new(FsObjectStore::new(local_dir.path()));

    let snapshots = SnapshotStore::new(bucket.clone(), RecordFields::harvest());
    let first = snapshots.load().unwrap();
    assert_eq!(first.origin, SnapshotOrigin::Missing);

    let fetched = records(vec![
        json!({"id": 7, "spent_date": "2024-01-30", "updated_at": "2024-01-30T10:00:00Z"}),
        json!({"id": 3, "spent_date": "2024-01-02", "updated_at": "2024-01-02T10:00:00Z"}),
    ]);
    let changes = ChangeSet {
        created: fetched.clone(),
        removed: vec![],
        modified: vec![],
    };

    let at = Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 58).unwrap();
    let report = ChangePublisher::new()
        .with_destination(bucket.clone())
        .with_destination(local.clone())
        .publish(&changes, at);
    assert_eq!(report.skipped, vec![ChangeKind::Removed, ChangeKind::Modified]);

    let created_key = "changes/created/20240201-created-235958.json";
    assert!(bucket_dir.path().join(created_key).is_file());
    assert!(local_dir.path().join(created_key).is_file());
    assert!(!bucket_dir.path().join("changes/removed").exists());

    let save = snapshots.save(
        &Snapshot::from_records(fetched),
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    );
    assert!(save.success());
    assert!(bucket_dir.path().join("daily/20240201.json").is_file());

    let text = std::fs::read_to_string(bucket_dir.path().join(LATEST_KEY)).unwrap();
    let stored: Vec<Value> = serde_json::from_str(&text).unwrap();
    let dates: Vec<&str> = stored
        .iter()
        .map(|v| v["spent_date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-01-02", "2024-01-30"]);

    let second = snapshots.load().unwrap();
    assert_eq!(second.origin, SnapshotOrigin::Stored);
    assert_eq!(second.snapshot.len(), 2);
    assert_eq!(bucket.describe(), format!("fs:{}", bucket_dir.path().display()));
}
