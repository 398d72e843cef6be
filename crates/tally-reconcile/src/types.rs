use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique key of a record.
///
/// Upstream identities are usually integers; string identities are accepted
/// so the engine does not depend on one provider's id shape.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Names of the three fields the engine reads from an otherwise opaque record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFields {
    pub identity: String,
    pub effective_date: String,
    pub revision: String,
}

impl RecordFields {
    /// Harvest v2 time entries: `id`, `spent_date`, `updated_at`.
    pub fn harvest() -> Self {
        Self {
            identity: "id".to_string(),
            effective_date: "spent_date".to_string(),
            revision: "updated_at".to_string(),
        }
    }
}

impl Default for RecordFields {
    fn default() -> Self {
        Self::harvest()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Data-format errors raised when a raw JSON value cannot become a [`Record`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordError {
    /// The value is not a JSON object.
    NotAnObject { found: &'static str },
    /// The identity field is absent or null.
    MissingIdentity { field: String },
    /// The identity field is present but is neither an integer nor a string.
    InvalidIdentity { field: String, raw: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { found } => {
                write!(f, "record is not a JSON object (found {found})")
            }
            Self::MissingIdentity { field } => {
                write!(f, "record has no identity field '{field}'")
            }
            Self::InvalidIdentity { field, raw } => {
                write!(
                    f,
                    "record identity field '{field}' must be an integer or string, got {raw}"
                )
            }
        }
    }
}

impl std::error::Error for RecordError {}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Revision marker text plus whether it arrived as a JSON string, so `42`
/// and `"42"` are different markers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Marker {
    Text(String),
    Scalar(String),
}

impl Marker {
    fn as_str(&self) -> &str {
        match self {
            Marker::Text(s) | Marker::Scalar(s) => s,
        }
    }
}

/// One upstream record, kept verbatim alongside the three fields the engine
/// reasons about.
///
/// `effective_date` and `revision` are `None` when the field is absent, null,
/// or an empty string. Serializes as the original JSON object.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    id: RecordId,
    effective_date: Option<String>,
    revision: Option<Marker>,
    raw: Value,
}

impl Record {
    pub(crate) fn from_parts(
        id: RecordId,
        effective_date: Option<String>,
        revision: Option<Marker>,
        raw: Value,
    ) -> Self {
        Self {
            id,
            effective_date,
            revision,
            raw,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Calendar date (`YYYY-MM-DD`) the record logically belongs to.
    pub fn effective_date(&self) -> Option<&str> {
        self.effective_date.as_deref()
    }

    /// Text of the opaque change marker, for display and ordering.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_ref().map(Marker::as_str)
    }

    /// Marker equality, JSON type included. Two absent markers are equal.
    pub fn same_revision(&self, other: &Record) -> bool {
        self.revision == other.revision
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// True when `effective_date` is present and `>= key` (lexicographic on
    /// the fixed-width date text).
    pub fn is_on_or_after(&self, key: &str) -> bool {
        matches!(self.effective_date(), Some(d) if d >= key)
    }

    /// True when `effective_date` is present and `< key`.
    pub fn is_before(&self, key: &str) -> bool {
        matches!(self.effective_date(), Some(d) if d < key)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Durable state of every record currently believed to exist in the retained
/// window, keyed by identity.
///
/// Invariant: every stored record's `id()` equals its key. The only insertion
/// path is [`Snapshot::upsert`], which derives the key from the record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    records: BTreeMap<RecordId, Record>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from records; a later record replaces an earlier one with the
    /// same identity.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut snap = Self::empty();
        for r in records {
            snap.upsert(r);
        }
        snap
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.records.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Insert or overwrite; returns the previous record with that identity.
    pub fn upsert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        self.records.remove(id)
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&RecordId, &mut Record) -> bool) {
        self.records.retain(f);
    }

    /// Records in persistence order: effective date ascending, absent dates
    /// first, ties broken by identity. Ordering only serves reviewable diffs
    /// between stored snapshots.
    pub fn ordered_for_persist(&self) -> Vec<&Record> {
        let mut out: Vec<&Record> = self.records.values().collect();
        out.sort_by(|a, b| a.effective_date().cmp(&b.effective_date()));
        out
    }
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// Which of the three change lists a record landed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Removed,
    Modified,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Created, ChangeKind::Removed, ChangeKind::Modified];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }

    /// Tag used by artifacts written before the created/removed/modified
    /// naming (`new`, `deleted`, `updated`).
    pub fn legacy_tag(&self) -> &'static str {
        match self {
            ChangeKind::Created => "new",
            ChangeKind::Removed => "deleted",
            ChangeKind::Modified => "updated",
        }
    }

    /// Accepts both current and legacy tags, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim().to_ascii_lowercase();
        ChangeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == t || k.legacy_tag() == t)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`crate::classify`]. A given identity appears in at most one list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Fetched records with no previous counterpart, in fetch order.
    pub created: Vec<Record>,
    /// Previous records missing from the fetch and inside the window, in id order.
    pub removed: Vec<Record>,
    /// New versions of records whose revision marker changed, in fetch order.
    pub modified: Vec<Record>,
}

impl ChangeSet {
    pub fn get(&self, kind: ChangeKind) -> &[Record] {
        match kind {
            ChangeKind::Created => &self.created,
            ChangeKind::Removed => &self.removed,
            ChangeKind::Modified => &self.modified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.removed.len() + self.modified.len()
    }

    pub fn ids(&self, kind: ChangeKind) -> BTreeSet<RecordId> {
        self.get(kind).iter().map(|r| r.id().clone()).collect()
    }
}
