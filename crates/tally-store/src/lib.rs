//! tally-store
//!
//! Whole-blob persistence for snapshots and change-set artifacts.
//!
//! - [`ObjectStore`]: key → bytes, with a tagged read result instead of a
//!   "not found" error
//! - [`SnapshotStore`]: load policy (missing or unreadable → empty) and the
//!   archive + latest double write
//! - [`ChangePublisher`]: one artifact per non-empty change set, fanned out
//!   to every destination
//!
//! Backends: a directory acting as the bucket ([`FsObjectStore`]) and an
//! in-process map ([`MemoryObjectStore`]).

mod error;
pub mod keys;
mod object;
mod publisher;
mod snapshot;

pub use error::{FailureKind, LoadOutcome, StoreFailure};
pub use keys::{archive_key, change_key, LATEST_KEY};
pub use object::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use publisher::{ChangePublisher, PublishReport, PublishedSet};
pub use snapshot::{LoadedSnapshot, SaveReport, SnapshotOrigin, SnapshotStore};

use serde::Serialize;

/// Pretty JSON (2-space indent) with a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreFailure> {
    let mut buf = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreFailure::fatal(format!("serialize failed: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}
