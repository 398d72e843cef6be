use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::window::{date_key, retention_cutoff};
use crate::{ChangeSet, Record, RecordId, Snapshot};

/// Fetched records keyed by identity, keeping first-seen order. A repeated
/// identity replaces the record in place (last one wins).
struct FetchedView<'a> {
    ordered: Vec<&'a Record>,
    by_id: BTreeMap<&'a RecordId, usize>,
}

impl<'a> FetchedView<'a> {
    fn new(fetched: &'a [Record]) -> Self {
        let mut ordered: Vec<&'a Record> = Vec::with_capacity(fetched.len());
        let mut by_id: BTreeMap<&'a RecordId, usize> = BTreeMap::new();
        for r in fetched {
            match by_id.get(r.id()) {
                Some(&i) => ordered[i] = r,
                None => {
                    by_id.insert(r.id(), ordered.len());
                    ordered.push(r);
                }
            }
        }
        Self { ordered, by_id }
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.by_id.contains_key(id)
    }
}

/// Compare the previous snapshot with a fresh fetch.
///
/// - created: fetched identity unknown to `previous`
/// - removed: previous identity absent from the fetch AND dated on/after
///   `window_start`. Older records were never re-queried, so their absence
///   says nothing.
/// - modified: identity on both sides with a different revision marker. Two
///   absent markers are equal; absent vs present is a change.
///
/// Pure; `previous` is not touched.
pub fn classify(previous: &Snapshot, fetched: &[Record], window_start: NaiveDate) -> ChangeSet {
    let start = date_key(window_start);
    let view = FetchedView::new(fetched);

    let created: Vec<Record> = view
        .ordered
        .iter()
        .filter(|r| !previous.contains(r.id()))
        .map(|r| (*r).clone())
        .collect();

    let removed: Vec<Record> = previous
        .iter()
        .filter(|r| !view.contains(r.id()) && r.is_on_or_after(&start))
        .cloned()
        .collect();

    let modified: Vec<Record> = view
        .ordered
        .iter()
        .filter(|r| {
            previous
                .get(r.id())
                .is_some_and(|old| !old.same_revision(r))
        })
        .map(|r| (*r).clone())
        .collect();

    ChangeSet {
        created,
        removed,
        modified,
    }
}

/// Bookkeeping from one [`merge`], for logging and summaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Snapshot size before the merge.
    pub before: usize,
    /// Distinct identities in the fetch.
    pub fetched: usize,
    /// Fetched identities that were not in the snapshot before.
    pub inserted: usize,
    /// Fetched identities that overwrote an existing entry (changed or not).
    pub refreshed: usize,
    /// Removed because they vanished upstream inside the window.
    pub deleted: Vec<RecordId>,
    /// Removed because they fell before the retention cutoff.
    pub pruned: Vec<RecordId>,
    /// Snapshot size after the merge.
    pub after: usize,
    pub cutoff: Option<NaiveDate>,
}

/// Result of [`merge`]: the next snapshot plus what happened to it.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub stats: MergeStats,
}

/// Fold a fresh fetch into the snapshot and return the next snapshot.
///
/// Steps, in order:
/// 1. remember the identities present before any change
/// 2. upsert every fetched record
/// 3. drop previously-known identities missing from the fetch whose
///    effective date is on/after `window_start` (same rule as `removed` in
///    [`classify`])
/// 4. prune every record dated strictly before `window_start - 1 day`;
///    undated records are kept
///
/// Takes `previous` by value; the caller keeps no alias to the old state.
pub fn merge(previous: Snapshot, fetched: &[Record], window_start: NaiveDate) -> MergeOutcome {
    let start = date_key(window_start);
    let cutoff_date = retention_cutoff(window_start);
    let cutoff = date_key(cutoff_date);

    let mut snapshot = previous;
    let before_ids = snapshot.ids();
    let view = FetchedView::new(fetched);

    let mut stats = MergeStats {
        before: before_ids.len(),
        fetched: view.ordered.len(),
        cutoff: Some(cutoff_date),
        ..MergeStats::default()
    };

    for r in &view.ordered {
        if snapshot.upsert((*r).clone()).is_some() {
            stats.refreshed += 1;
        } else {
            stats.inserted += 1;
        }
    }

    for id in before_ids.iter().filter(|id| !view.contains(id)) {
        let vanished_in_window = snapshot
            .get(id)
            .is_some_and(|r| r.is_on_or_after(&start));
        if vanished_in_window {
            snapshot.remove(id);
            stats.deleted.push(id.clone());
        }
    }

    let mut pruned: Vec<RecordId> = Vec::new();
    snapshot.retain(|id, r| {
        if r.is_before(&cutoff) {
            pruned.push(id.clone());
            false
        } else {
            true
        }
    });
    stats.pruned = pruned;
    stats.after = snapshot.len();

    MergeOutcome { snapshot, stats }
}
