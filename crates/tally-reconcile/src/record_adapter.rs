//! Record adapter: turn raw upstream / stored JSON into [`Record`]s.
//!
//! # Purpose
//! Providers and stored blobs hand us plain JSON objects. This module pulls
//! out the identity, effective date, and revision marker once, so the engine
//! never touches field names.
//!
//! # Rules
//! - Identity must be an integer or a non-empty string. Anything else is a
//!   data-format error; records are never silently skipped.
//! - Effective date: a non-empty string, otherwise absent.
//! - Revision marker: a non-empty string, or any other non-null scalar by its
//!   JSON text; null / empty string / missing is absent. A number and a
//!   string with the same text are different markers.
//! - The original JSON object is kept verbatim.

use serde_json::Value;

use crate::types::Marker;
use crate::{Record, RecordError, RecordFields, RecordId, Snapshot};

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_identity(raw: &Value, field: &str) -> Result<RecordId, RecordError> {
    match raw.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingIdentity {
            field: field.to_string(),
        }),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(RecordId::Int(i)),
            None => Err(RecordError::InvalidIdentity {
                field: field.to_string(),
                raw: n.to_string(),
            }),
        },
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(RecordId::Text(s.clone())),
        Some(Value::String(_)) => Err(RecordError::MissingIdentity {
            field: field.to_string(),
        }),
        Some(other) => Err(RecordError::InvalidIdentity {
            field: field.to_string(),
            raw: other.to_string(),
        }),
    }
}

fn read_effective_date(raw: &Value, field: &str) -> Option<String> {
    match raw.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn read_revision(raw: &Value, field: &str) -> Option<Marker> {
    match raw.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(Marker::Text(s.clone())),
        Some(other) => Some(Marker::Scalar(other.to_string())),
    }
}

/// Convert one raw JSON object into a [`Record`].
pub fn record_from_value(raw: Value, fields: &RecordFields) -> Result<Record, RecordError> {
    if !raw.is_object() {
        return Err(RecordError::NotAnObject {
            found: json_kind(&raw),
        });
    }
    let id = read_identity(&raw, &fields.identity)?;
    let effective_date = read_effective_date(&raw, &fields.effective_date);
    let revision = read_revision(&raw, &fields.revision);
    Ok(Record::from_parts(id, effective_date, revision, raw))
}

/// Convert a list of raw values, failing on the first malformed one.
pub fn records_from_values(
    raw: impl IntoIterator<Item = Value>,
    fields: &RecordFields,
) -> Result<Vec<Record>, RecordError> {
    raw.into_iter()
        .map(|v| record_from_value(v, fields))
        .collect()
}

/// Build a [`Snapshot`] from the stored JSON array. Duplicate identities keep
/// the last occurrence.
pub fn snapshot_from_values(
    raw: impl IntoIterator<Item = Value>,
    fields: &RecordFields,
) -> Result<Snapshot, RecordError> {
    Ok(Snapshot::from_records(records_from_values(raw, fields)?))
}

/// Stored representation of a snapshot: JSON array in persistence order.
pub fn snapshot_to_values(snapshot: &Snapshot) -> Vec<Value> {
    snapshot
        .ordered_for_persist()
        .into_iter()
        .map(|r| r.raw().clone())
        .collect()
}
