use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use crate::pipeline::types::{NormalizedMonitor, NotificationTarget};
use crate::db::models::{StoredMonitor, UpsertStats};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write monitor {id}: {source}")]
    Monitor { id: i64, source: sqlx::Error },
    #[error("Store write failed: {0}")]
    Write(#[from] sqlx::Error),
}

/// Writes a batch of monitors in a single transaction.
///
/// Each monitor row is upserted (keeping `first_seen`) and its tags,
/// notifications and downtimes are replaced wholesale. With `prune`, monitors
/// of the store that are missing from the batch are flagged inactive. On any
/// error the transaction is dropped and the previous snapshot stays intact.
pub async fn upsert_monitors(
    pool: &SqlitePool,
    monitors: &[NormalizedMonitor],
    prune: bool,
) -> Result<UpsertStats, StoreError> {
    let now = Utc::now();
    let mut stats = UpsertStats::default();
    let mut tx = pool.begin().await?;

    for m in monitors {
        let id = m.monitor.id;
        upsert_monitor(&mut tx, m, now)
            .await
            .map_err(|source| StoreError::Monitor { id, source })?;
        replace_children(&mut tx, m)
            .await
            .map_err(|source| StoreError::Monitor { id, source })?;

        stats.monitors += 1;
        stats.tags += m.tags.len() as u64;
        stats.notifications += m.notifications.len() as u64;
        stats.downtimes += m.downtimes.len() as u64;
    }

    if prune {
        let ids: Vec<i64> = monitors.iter().map(|m| m.monitor.id).collect();
        stats.deactivated = mark_inactive(&mut tx, &ids).await?;
    }

    tx.commit().await?;
    Ok(stats)
}

async fn upsert_monitor(
    conn: &mut SqliteConnection,
    m: &NormalizedMonitor,
    now: DateTime<Utc>,
) -> sqlx::Result<()> {
    let row = &m.monitor;
    sqlx::query(
        r#"
        INSERT INTO monitors (
            id, name, type, project, overall_state, message, query,
            priority, options, creator, created, first_seen, last_updated, is_active
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1)
        ON CONFLICT(id) DO UPDATE SET
            -- first_seen stays as recorded by the first sync
            name = excluded.name,
            type = excluded.type,
            project = excluded.project,
            overall_state = excluded.overall_state,
            message = excluded.message,
            query = excluded.query,
            priority = excluded.priority,
            options = excluded.options,
            creator = excluded.creator,
            created = excluded.created,
            last_updated = excluded.last_updated,
            is_active = 1
        "#
    )
    .bind(row.id)
    .bind(&row.name)
    .bind(&row.monitor_type)
    .bind(&row.project)
    .bind(&row.overall_state)
    .bind(&row.message)
    .bind(&row.query)
    .bind(row.priority)
    .bind(&row.options)
    .bind(&row.creator)
    .bind(row.created)
    .bind(now)
    .bind(row.last_updated)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replaces the child-row sets of one monitor.
///
/// Must run in the same transaction as the parent upsert.
pub async fn replace_children(conn: &mut SqliteConnection, m: &NormalizedMonitor) -> sqlx::Result<()> {
    let id = m.monitor.id;

    for table in ["monitor_tags", "monitor_notifications", "monitor_downtimes"] {
        sqlx::query(&format!("DELETE FROM {} WHERE monitor_id = ?", table))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    for tag in &m.tags {
        sqlx::query("INSERT INTO monitor_tags (monitor_id, tag) VALUES (?, ?)")
            .bind(id)
            .bind(tag)
            .execute(&mut *conn)
            .await?;
    }

    for n in &m.notifications {
        sqlx::query(
            "INSERT INTO monitor_notifications (monitor_id, target, context, is_recovery) VALUES (?, ?, ?, ?)"
        )
        .bind(id)
        .bind(&n.target)
        .bind(&n.context)
        .bind(n.is_recovery)
        .execute(&mut *conn)
        .await?;
    }

    for downtime in &m.downtimes {
        sqlx::query("INSERT INTO monitor_downtimes (monitor_id, downtime_data) VALUES (?, ?)")
            .bind(id)
            .bind(downtime)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Flags every active monitor whose id is not in `active_ids`.
async fn mark_inactive(conn: &mut SqliteConnection, active_ids: &[i64]) -> sqlx::Result<u64> {
    let ids = serde_json::to_string(active_ids).unwrap_or_else(|_| "[]".to_string());
    let result = sqlx::query(
        "UPDATE monitors SET is_active = 0 \
         WHERE is_active = 1 AND id NOT IN (SELECT value FROM json_each(?))"
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_monitors(pool: &SqlitePool, include_inactive: bool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM monitors WHERE (?1 OR is_active = 1)")
        .bind(include_inactive)
        .fetch_one(pool)
        .await
}

pub async fn get_monitor(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<StoredMonitor>> {
    sqlx::query_as::<_, StoredMonitor>(
        "SELECT id, name, type, project, overall_state, priority, first_seen, last_updated, is_active \
         FROM monitors WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_tags(pool: &SqlitePool, id: i64) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT tag FROM monitor_tags WHERE monitor_id = ? ORDER BY tag")
        .bind(id)
        .fetch_all(pool)
        .await
}

pub async fn get_notifications(pool: &SqlitePool, id: i64) -> sqlx::Result<Vec<NotificationTarget>> {
    let rows = sqlx::query_as::<_, (String, Option<String>, bool)>(
        "SELECT target, context, is_recovery FROM monitor_notifications WHERE monitor_id = ? ORDER BY target, context"
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(target, context, is_recovery)| NotificationTarget { target, context, is_recovery })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::normalize::normalize;
    use crate::db::testing::{memory_pool, snapshot};

    fn monitor(id: i64, tags: &[&str], message: &str) -> NormalizedMonitor {
        normalize(&json!({
            "id": id,
            "name": format!("[SEV-{}] monitor {}", id % 5 + 1, id),
            "type": "metric alert",
            "tags": tags,
            "message": message,
            "overall_state": "OK",
            "modified": "2024-05-02T12:30:00+00:00",
            "matching_downtimes": [{ "id": id }],
        }))
        .unwrap()
    }

    fn batch(n: i64) -> Vec<NormalizedMonitor> {
        (1..=n)
            .map(|id| monitor(id, &["env:prod", "team:sre"], "@slack-ops @pagerduty-oncall"))
            .collect()
    }

    #[tokio::test]
    async fn test_upsert_writes_children() {
        let pool = memory_pool().await;
        let stats = upsert_monitors(&pool, &batch(3), true).await.unwrap();

        assert_eq!(stats.monitors, 3);
        assert_eq!(stats.tags, 6);
        assert_eq!(stats.notifications, 6);
        assert_eq!(stats.downtimes, 3);
        assert_eq!(count_monitors(&pool, false).await.unwrap(), 3);
        assert_eq!(get_tags(&pool, 2).await.unwrap(), vec!["env:prod", "team:sre"]);

        let stored = get_monitor(&pool, 2).await.unwrap().unwrap();
        assert_eq!(stored.name, "[SEV-3] monitor 2");
        assert_eq!(stored.monitor_type.as_deref(), Some("metric alert"));
        assert!(stored.is_active);
        assert!(stored.last_updated.is_some());

        let targets = get_notifications(&pool, 2).await.unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(names, vec!["pagerduty-oncall", "slack-ops"]);
        assert!(get_monitor(&pool, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(4), true).await.unwrap();
        let first = snapshot(&pool).await;

        upsert_monitors(&pool, &batch(4), true).await.unwrap();
        assert_eq!(snapshot(&pool).await, first);
    }

    #[tokio::test]
    async fn test_children_shrink_on_refetch() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &[monitor(1, &["a", "b", "c"], "@x @y")], true).await.unwrap();
        upsert_monitors(&pool, &[monitor(1, &["a"], "")], true).await.unwrap();

        assert_eq!(get_tags(&pool, 1).await.unwrap(), vec!["a"]);
        let notifications: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM monitor_notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(notifications, 0);
    }

    #[tokio::test]
    async fn test_children_reference_existing_monitors() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(5), true).await.unwrap();
        upsert_monitors(&pool, &batch(2), true).await.unwrap();

        let orphans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
                SELECT monitor_id FROM monitor_tags \
                UNION ALL SELECT monitor_id FROM monitor_notifications \
                UNION ALL SELECT monitor_id FROM monitor_downtimes \
             ) c LEFT JOIN monitors m ON m.id = c.monitor_id WHERE m.id IS NULL"
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(orphans, 0);

        let err = sqlx::query("INSERT INTO monitor_tags (monitor_id, tag) VALUES (999, 'x')")
            .execute(&pool)
            .await;
        assert!(err.is_err(), "foreign keys must be enforced");
    }

    #[tokio::test]
    async fn test_failure_mid_batch_rolls_back() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(3), true).await.unwrap();
        let before = snapshot(&pool).await;

        let mut next = batch(10);
        for m in next.iter_mut() {
            m.monitor.overall_state = Some("Alert".into());
        }
        // duplicate tag violates the (monitor_id, tag) key on record 5
        next[4].tags.push("env:prod".into());

        let err = upsert_monitors(&pool, &next, true).await.unwrap_err();
        assert!(matches!(err, StoreError::Monitor { id: 5, .. }), "{:?}", err);
        assert_eq!(snapshot(&pool).await, before);
        assert_eq!(count_monitors(&pool, true).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_prune_flags_missing_monitors() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(5), true).await.unwrap();

        let stats = upsert_monitors(&pool, &batch(3), true).await.unwrap();
        assert_eq!(stats.deactivated, 2);
        assert_eq!(count_monitors(&pool, false).await.unwrap(), 3);
        assert_eq!(count_monitors(&pool, true).await.unwrap(), 5);
        assert!(!get_monitor(&pool, 5).await.unwrap().unwrap().is_active);

        // a later fetch that sees it again revives it
        upsert_monitors(&pool, &batch(5), true).await.unwrap();
        assert_eq!(count_monitors(&pool, false).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_without_prune_keeps_others_active() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(5), true).await.unwrap();

        let stats = upsert_monitors(&pool, &batch(1), false).await.unwrap();
        assert_eq!(stats.deactivated, 0);
        assert_eq!(count_monitors(&pool, false).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_first_seen_is_preserved() {
        let pool = memory_pool().await;
        upsert_monitors(&pool, &batch(1), true).await.unwrap();
        let first = get_monitor(&pool, 1).await.unwrap().unwrap().first_seen;

        let mut renamed = batch(1);
        renamed[0].monitor.name = "renamed".into();
        upsert_monitors(&pool, &renamed, true).await.unwrap();

        let stored = get_monitor(&pool, 1).await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.first_seen, first);
    }
}
