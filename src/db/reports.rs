use std::fmt;
use std::str::FromStr;

use sqlx::SqlitePool;

use crate::db::models::ReportRow;

/// Fixed catalog of aggregate reports over the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Severity,
    Type,
    Project,
    State,
    Tag,
    Notification,
    Priority,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportScope {
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

// Mirrors `Severity::from_name`: SEV-1 is tested first.
const SEVERITY: &str = r#"
    SELECT label, COUNT(*) AS count
    FROM (
        SELECT CASE
            WHEN instr(upper(m.name), '[SEV-1]') > 0 THEN 'SEV-1'
            WHEN instr(upper(m.name), '[SEV-2]') > 0 THEN 'SEV-2'
            WHEN instr(upper(m.name), '[SEV-3]') > 0 THEN 'SEV-3'
            WHEN instr(upper(m.name), '[SEV-4]') > 0 THEN 'SEV-4'
            WHEN instr(upper(m.name), '[SEV-5]') > 0 THEN 'SEV-5'
            ELSE 'Unspecified'
        END AS label
        FROM monitors m
        WHERE (?1 OR m.is_active = 1)
    )
    GROUP BY label
    ORDER BY CASE label
        WHEN 'SEV-1' THEN 1
        WHEN 'SEV-2' THEN 2
        WHEN 'SEV-3' THEN 3
        WHEN 'SEV-4' THEN 4
        WHEN 'SEV-5' THEN 5
        ELSE 6
    END
    LIMIT ?2
"#;

const TYPE: &str = r#"
    SELECT COALESCE(m.type, '(none)') AS label, COUNT(*) AS count
    FROM monitors m
    WHERE (?1 OR m.is_active = 1)
    GROUP BY label
    ORDER BY count DESC, label ASC
    LIMIT ?2
"#;

const PROJECT: &str = r#"
    SELECT COALESCE(m.project, '(none)') AS label, COUNT(*) AS count
    FROM monitors m
    WHERE (?1 OR m.is_active = 1)
    GROUP BY label
    ORDER BY count DESC, label ASC
    LIMIT ?2
"#;

const STATE: &str = r#"
    SELECT COALESCE(m.overall_state, '(none)') AS label, COUNT(*) AS count
    FROM monitors m
    WHERE (?1 OR m.is_active = 1)
    GROUP BY label
    ORDER BY count DESC, label ASC
    LIMIT ?2
"#;

const TAG: &str = r#"
    SELECT t.tag AS label, COUNT(*) AS count
    FROM monitor_tags t
    JOIN monitors m ON m.id = t.monitor_id
    WHERE (?1 OR m.is_active = 1)
    GROUP BY t.tag
    ORDER BY count DESC, label ASC
    LIMIT ?2
"#;

const NOTIFICATION: &str = r#"
    SELECT n.target AS label, COUNT(DISTINCT n.monitor_id) AS count
    FROM monitor_notifications n
    JOIN monitors m ON m.id = n.monitor_id
    WHERE (?1 OR m.is_active = 1)
    GROUP BY n.target
    ORDER BY count DESC, label ASC
    LIMIT ?2
"#;

const PRIORITY: &str = r#"
    SELECT COALESCE('P' || m.priority, '(none)') AS label, COUNT(*) AS count
    FROM monitors m
    WHERE (?1 OR m.is_active = 1)
    GROUP BY m.priority
    ORDER BY m.priority IS NULL, m.priority
    LIMIT ?2
"#;

impl Report {
    pub const ALL: [Report; 7] = [
        Report::Severity,
        Report::Type,
        Report::Project,
        Report::State,
        Report::Tag,
        Report::Notification,
        Report::Priority,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Report::Severity => "severity",
            Report::Type => "type",
            Report::Project => "project",
            Report::State => "state",
            Report::Tag => "tag",
            Report::Notification => "notification",
            Report::Priority => "priority",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Report::Severity => "Monitors per [SEV-N] class parsed from the name",
            Report::Type => "Monitors per monitor type",
            Report::Project => "Monitors per project: tag",
            Report::State => "Monitors per overall state",
            Report::Tag => "Most used tags",
            Report::Notification => "Monitors per notification target",
            Report::Priority => "Monitors per priority",
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Report::Severity => SEVERITY,
            Report::Type => TYPE,
            Report::Project => PROJECT,
            Report::State => STATE,
            Report::Tag => TAG,
            Report::Notification => NOTIFICATION,
            Report::Priority => PRIORITY,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Report {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let wanted = match wanted.as_str() {
            "types" => "type",
            "projects" => "project",
            "states" => "state",
            "tags" => "tag",
            "notifications" | "targets" => "notification",
            other => other,
        };
        Report::ALL
            .into_iter()
            .find(|r| r.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Report::ALL.iter().map(Report::name).collect();
                format!("unknown report '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// Runs one report against the current snapshot.
pub async fn run_report(pool: &SqlitePool, report: Report, scope: ReportScope) -> anyhow::Result<Vec<ReportRow>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = scope.limit.map(i64::from).unwrap_or(-1);

    let rows = sqlx::query_as::<sqlx::Sqlite, ReportRow>(report.sql())
        .bind(scope.include_inactive)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run {} report: {}", report, e))?;

    Ok(rows)
}
