//! Object key layout.
//!
//! ```text
//! harvest-data.json                                   latest snapshot
//! daily/<YYYYMMDD>.json                               one archive per day
//! changes/<kind>/<YYYYMMDD>-<kind>-<HHMMSS>.json      one per non-empty set
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use tally_reconcile::ChangeKind;

pub const LATEST_KEY: &str = "harvest-data.json";

pub const ARCHIVE_PREFIX: &str = "daily/";
pub const CHANGES_PREFIX: &str = "changes/";

pub fn archive_key(day: NaiveDate) -> String {
    format!("{ARCHIVE_PREFIX}{}.json", day.format("%Y%m%d"))
}

/// The kind is written twice (path segment and filename tag) so a reader
/// that only sees the filename can still tell the sets apart.
pub fn change_key(kind: ChangeKind, at: DateTime<Utc>) -> String {
    let k = kind.as_str();
    format!(
        "{CHANGES_PREFIX}{k}/{}-{k}-{}.json",
        at.format("%Y%m%d"),
        at.format("%H%M%S")
    )
}
