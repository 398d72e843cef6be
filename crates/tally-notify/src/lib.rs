//! tally-notify
//!
//! Routes "object created" notifications for change-set artifacts.
//!
//! A notification is recognised only when its first record comes from the
//! storage service and reports a plain put of a named object in a named
//! bucket. The change kind is recovered from the key; an unrecognised key is
//! still routed, just without a kind. Routing never starts a reconciliation
//! pass.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use tally_reconcile::ChangeKind;

pub const EVENT_SOURCE: &str = "aws:s3";
pub const EVENT_NAME: &str = "ObjectCreated:Put";

/// A change-set artifact that was just written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactNotification {
    pub bucket: String,
    pub key: String,
    pub change_kind: Option<ChangeKind>,
    pub event_name: String,
    pub event_time: Option<String>,
}

/// Downstream hook for routed notifications.
pub trait ArtifactHandler: Send + Sync {
    fn handle(&self, notification: &ArtifactNotification);
}

/// Logs the notification and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl ArtifactHandler for LogHandler {
    fn handle(&self, n: &ArtifactNotification) {
        info!(
            bucket = %n.bucket,
            key = %n.key,
            kind = n.change_kind.map(|k| k.as_str()).unwrap_or("unknown"),
            event = %n.event_name,
            "change-set artifact notification"
        );
    }
}

fn non_empty_str<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Parse a trigger event. `None` means it is not an artifact notification
/// (empty event, other source, other event name, missing bucket or key).
pub fn parse_notification(event: &Value) -> Option<ArtifactNotification> {
    let record = event.get("Records")?.as_array()?.first()?;

    if record.get("eventSource").and_then(Value::as_str) != Some(EVENT_SOURCE) {
        return None;
    }
    if record.get("eventName").and_then(Value::as_str) != Some(EVENT_NAME) {
        return None;
    }

    let bucket = non_empty_str(record, "/s3/bucket/name")?;
    let key = non_empty_str(record, "/s3/object/key")?;

    Some(ArtifactNotification {
        bucket: bucket.to_string(),
        key: key.to_string(),
        change_kind: detect_kind(key),
        event_name: EVENT_NAME.to_string(),
        event_time: record
            .get("eventTime")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Kind from a `/<kind>/` path segment, else from a `-<kind>-` filename tag.
/// Current and legacy names are both recognised.
pub fn detect_kind(key: &str) -> Option<ChangeKind> {
    let tags = |k: ChangeKind| [k.as_str(), k.legacy_tag()];

    let by_segment = ChangeKind::ALL
        .into_iter()
        .find(|&k| tags(k).iter().any(|t| key.contains(&format!("/{t}/"))));
    if by_segment.is_some() {
        return by_segment;
    }

    let file_name = key.rsplit('/').next().unwrap_or(key);
    ChangeKind::ALL
        .into_iter()
        .find(|&k| tags(k).iter().any(|t| file_name.contains(&format!("-{t}-"))))
}

/// Parse and, when it is a notification, hand it to `handler`.
pub fn route(event: &Value, handler: &dyn ArtifactHandler) -> Option<ArtifactNotification> {
    let n = parse_notification(event)?;
    handler.handle(&n);
    Some(n)
}
