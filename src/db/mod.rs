pub mod models;
pub mod monitors;
pub mod reports;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use anyhow::{anyhow, Context, Result};
use log::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn init(db_url: &str) -> Result<SqlitePool> {

    prepare_db_dir(db_url).context("Error preparing db dir")?;

    let opts = SqliteConnectOptions::from_str(db_url)
        .context("Unsupported format DATABASE_PATH")?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePool::connect_with(opts)
        .await
        .context("Error connecting to database")?;

    MIGRATOR.run(&pool)
        .await
        .context("Error running migrations")?;
    info!("Migrations applied.");

    Ok(pool)
}

fn prepare_db_dir(uri: &str) -> Result<()> {
    if let Some(path_str) = uri.strip_prefix("sqlite://") {
        let path = Path::new(path_str);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Create DB folder: {:?}", parent);
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Fail create dir {:?}", parent))?;
            }
        }
    } else {
        return Err(anyhow!("Database URL must start with 'sqlite://'"));
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_parent_dir_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("monitors.db");
        let url = format!("sqlite://{}", path.to_string_lossy());

        let pool = init(&url).await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'monitor%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        pool.close().await;

        assert!(path.exists());
        assert_eq!(tables, vec!["monitor_downtimes", "monitor_notifications", "monitor_tags", "monitors"]);

        // reopening runs no migration twice
        init(&url).await.unwrap().close().await;
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        assert!(prepare_db_dir("postgres://localhost/db").is_err());
    }
}
