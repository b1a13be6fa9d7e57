use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::notification::parse_targets;
use super::types::{MonitorRow, NormalizedMonitor};

const PROJECT_TAG: &str = "project:";

#[derive(Error, Debug, PartialEq)]
pub enum MalformedRecord {
    #[error("monitor record has no integer id (name: {name:?})")]
    MissingId { name: Option<String> },
    #[error("monitor record is not a JSON object")]
    NotAnObject,
}

/// Flattens one monitor object from the list endpoint.
///
/// Only a missing `id` is fatal for the record. Every other field degrades to
/// null or empty.
pub fn normalize(raw: &Value) -> Result<NormalizedMonitor, MalformedRecord> {
    if !raw.is_object() {
        return Err(MalformedRecord::NotAnObject);
    }

    let id = raw["id"].as_i64().ok_or_else(|| MalformedRecord::MissingId {
        name: text(&raw["name"]),
    })?;

    let tags = collect_tags(&raw["tags"]);
    let project = tags
        .iter()
        .find_map(|t| t.strip_prefix(PROJECT_TAG))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let message = text(&raw["message"]);
    let options = &raw["options"];
    let notifications = parse_targets(
        message.as_deref(),
        options["escalation_message"].as_str(),
    );

    let downtimes = match &raw["matching_downtimes"] {
        Value::Array(items) => items.iter().map(Value::to_string).collect(),
        _ => Vec::new(),
    };

    let monitor = MonitorRow {
        id,
        name: text(&raw["name"]).unwrap_or_default(),
        monitor_type: text(&raw["type"]),
        project,
        overall_state: text(&raw["overall_state"]),
        message,
        query: text(&raw["query"]),
        priority: priority(&raw["priority"]),
        options: options.is_object().then(|| options.to_string()),
        creator: text(&raw["creator"]["email"]),
        created: timestamp(&raw["created"]),
        last_updated: timestamp(&raw["modified"]),
    };

    Ok(NormalizedMonitor {
        monitor,
        tags,
        notifications,
        downtimes,
    })
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn collect_tags(value: &Value) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.as_array().into_iter().flatten() {
        let Some(tag) = tag.as_str().map(str::trim) else { continue };
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn priority(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_start_matches(&['P', 'p'][..]).parse().ok(),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tags_and_pagerduty_target() {
        let raw = json!({
            "id": 42,
            "name": "[SEV-2] High latency",
            "type": "metric alert",
            "tags": ["env:prod", "team:sre"],
            "message": "Latency is above threshold. @pagerduty-oncall",
            "overall_state": "Alert",
        });

        let m = normalize(&raw).unwrap();
        assert_eq!(m.monitor.id, 42);
        assert_eq!(m.monitor.name, "[SEV-2] High latency");
        assert_eq!(m.tags, vec!["env:prod", "team:sre"]);
        assert_eq!(m.notifications.len(), 1);
        assert_eq!(m.notifications[0].target, "pagerduty-oncall");
        assert_eq!(m.monitor.project, None);
    }

    #[test]
    fn test_full_record() {
        let raw = json!({
            "id": 7,
            "name": "Disk usage",
            "type": "query alert",
            "query": "avg(last_5m):avg:system.disk.in_use{*} > 0.9",
            "message": "{{#is_recovery}}@slack-infra{{/is_recovery}}",
            "tags": ["project:billing", "env:prod", "env:prod", "  ", 12],
            "priority": 2,
            "overall_state": "OK",
            "creator": { "email": "ops@example.com", "handle": "ops" },
            "created": "2024-03-01T10:00:00.000000+00:00",
            "modified": "2024-05-02T12:30:00+02:00",
            "options": { "escalation_message": "@pagerduty-infra", "notify_no_data": true },
            "matching_downtimes": [{ "id": 1, "scope": ["env:prod"] }],
        });

        let m = normalize(&raw).unwrap();
        assert_eq!(m.monitor.project.as_deref(), Some("billing"));
        assert_eq!(m.tags, vec!["project:billing", "env:prod"]);
        assert_eq!(m.monitor.priority, Some(2));
        assert_eq!(m.monitor.creator.as_deref(), Some("ops@example.com"));
        assert_eq!(
            m.monitor.last_updated,
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 10, 30, 0).unwrap())
        );
        assert!(m.monitor.created.is_some());
        assert!(m.monitor.options.as_deref().unwrap().contains("notify_no_data"));
        assert_eq!(m.downtimes.len(), 1);

        assert_eq!(m.notifications.len(), 2);
        assert!(m.notifications[0].is_recovery);
        assert_eq!(m.notifications[1].target, "pagerduty-infra");
    }

    #[test]
    fn test_missing_fields_degrade() {
        let m = normalize(&json!({ "id": 1, "tags": "not-a-list", "priority": "P3", "modified": "yesterday" })).unwrap();
        assert_eq!(m.monitor.name, "");
        assert_eq!(m.monitor.monitor_type, None);
        assert_eq!(m.monitor.overall_state, None);
        assert_eq!(m.monitor.priority, Some(3));
        assert_eq!(m.monitor.last_updated, None);
        assert_eq!(m.monitor.options, None);
        assert!(m.tags.is_empty());
        assert!(m.notifications.is_empty());
        assert!(m.downtimes.is_empty());
    }

    #[test]
    fn test_missing_id_is_malformed() {
        assert_eq!(
            normalize(&json!({ "name": "orphan" })),
            Err(MalformedRecord::MissingId { name: Some("orphan".into()) })
        );
        assert!(normalize(&json!({ "id": "12" })).is_err());
        assert_eq!(normalize(&json!([1, 2])), Err(MalformedRecord::NotAnObject));
    }
}
