//! Human-readable change summary, emitted as log lines.

use serde_json::Value;
use tracing::info;

use tally_reconcile::summary::{change_views, DEFAULT_DISPLAY_LIMIT};
use tally_reconcile::{ChangeSet, Record};

const MISSING: &str = "N/A";
const EMPTY_NOTES: &str = "(empty)";

fn nested_name(raw: &Value, key: &str) -> String {
    match raw.get(key).and_then(|v| v.get("name")) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => MISSING.to_string(),
    }
}

fn scalar(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One line per time entry: who, for whom, on what, how long, when, and the
/// notes.
pub fn describe_record(record: &Record) -> String {
    let raw = record.raw();
    let notes = match raw.get("notes") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => EMPTY_NOTES.to_string(),
    };
    format!(
        "User: {}, Client: {}, Project: {}, Task: {}, Hours: {}, Date: {}, Notes: {}",
        nested_name(raw, "user"),
        nested_name(raw, "client"),
        nested_name(raw, "project"),
        nested_name(raw, "task"),
        scalar(raw, "hours"),
        scalar(raw, "spent_date"),
        notes,
    )
}

/// Lines for the whole change set: a count per kind, the newest entries,
/// and a trailer for the ones left out.
pub fn summary_lines(changes: &ChangeSet, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for view in change_views(changes, limit) {
        lines.push(format!("{}: {}", view.kind, view.total));
        for r in &view.shown {
            lines.push(format!("  {}", describe_record(r)));
        }
        if view.hidden > 0 {
            lines.push(format!("  ... and {} more", view.hidden));
        }
    }
    lines
}

pub fn log_change_summary(changes: &ChangeSet) {
    for line in summary_lines(changes, DEFAULT_DISPLAY_LIMIT) {
        info!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_reconcile::record_adapter::record_from_value;
    use tally_reconcile::RecordFields;

    fn rec(v: Value) -> Record {
        record_from_value(v, &RecordFields::harvest()).unwrap()
    }

    #[test]
    fn full_entry() {
        let r = rec(json!({
            "id": 1,
            "user": {"id": 5, "name": "Ada"},
            "client": {"name": "Acme"},
            "project": {"name": "Site"},
            "task": {"name": "Design"},
            "hours": 1.5,
            "spent_date": "2024-01-10",
            "notes": "wireframes"
        }));
        assert_eq!(
            describe_record(&r),
            "User: Ada, Client: Acme, Project: Site, Task: Design, Hours: 1.5, Date: 2024-01-10, Notes: wireframes"
        );
    }

    #[test]
    fn sparse_entry_uses_placeholders() {
        let r = rec(json!({"id": 2, "user": null, "client": {"name": ""}, "hours": 0, "notes": null}));
        assert_eq!(
            describe_record(&r),
            "User: N/A, Client: N/A, Project: N/A, Task: N/A, Hours: 0, Date: N/A, Notes: (empty)"
        );
    }

    #[test]
    fn summary_truncates_with_trailer() {
        let created: Vec<Record> = (0..4)
            .map(|i| rec(json!({"id": i, "updated_at": format!("2024-01-0{}", i + 1)})))
            .collect();
        let changes = ChangeSet {
            created,
            removed: vec![],
            modified: vec![],
        };
        let lines = summary_lines(&changes, 2);
        assert_eq!(lines[0], "created: 4");
        assert_eq!(lines.len(), 1 + 2 + 1 + 1 + 1);
        assert_eq!(lines[3], "  ... and 2 more");
        assert_eq!(lines[4], "removed: 0");
        assert_eq!(lines[5], "modified: 0");
    }
}
