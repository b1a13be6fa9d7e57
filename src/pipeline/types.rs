use chrono::{DateTime, Utc};

/// Flat `monitors` row built from one API record.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRow {
    pub id: i64,
    pub name: String,
    pub monitor_type: Option<String>,
    pub project: Option<String>,
    pub overall_state: Option<String>,
    pub message: Option<String>,
    pub query: Option<String>,
    pub priority: Option<i64>,
    pub options: Option<String>,
    pub creator: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    pub target: String,
    pub context: Option<String>,
    pub is_recovery: bool,
}

/// A monitor row together with the child rows that get replaced with it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMonitor {
    pub monitor: MonitorRow,
    pub tags: Vec<String>,
    pub notifications: Vec<NotificationTarget>,
    pub downtimes: Vec<String>,
}
