use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct StoredMonitor {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    pub monitor_type: Option<String>,
    pub project: Option<String>,
    pub overall_state: Option<String>,
    pub priority: Option<i64>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub count: i64,
}

/// Counters of one writer batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertStats {
    pub monitors: u64,
    pub tags: u64,
    pub notifications: u64,
    pub downtimes: u64,
    pub deactivated: u64,
}
