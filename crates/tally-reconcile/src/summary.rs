//! Display-only reduction of change lists.
//!
//! Nothing here feeds back into classification or persistence; it only picks
//! which records are worth printing.

use crate::{ChangeKind, ChangeSet, Record};

/// Default number of records shown per change list.
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;

/// Up to `limit` records, most recently revised first. Records without a
/// revision marker sort last; ties keep their input order.
pub fn newest(records: &[Record], limit: usize) -> Vec<&Record> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| b.revision().cmp(&a.revision()));
    sorted.truncate(limit);
    sorted
}

/// What to print for one change list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeView<'a> {
    pub kind: ChangeKind,
    pub total: usize,
    pub shown: Vec<&'a Record>,
    /// Records left out of `shown`.
    pub hidden: usize,
}

/// One view per change kind, in created / removed / modified order.
pub fn change_views(changes: &ChangeSet, limit: usize) -> Vec<ChangeView<'_>> {
    ChangeKind::ALL
        .into_iter()
        .map(|kind| {
            let list = changes.get(kind);
            let shown = newest(list, limit);
            ChangeView {
                kind,
                total: list.len(),
                hidden: list.len() - shown.len(),
                shown,
            }
        })
        .collect()
}
