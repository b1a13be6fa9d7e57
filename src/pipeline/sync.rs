use log::{info, warn};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pipeline::normalize::normalize;
use crate::datadog::{ApiError, MonitorSource};
use crate::db::monitors::{upsert_monitors, StoreError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub fetched: usize,
    pub stored: u64,
    pub skipped: usize,
    pub deactivated: u64,
}

/// One fetch-and-store cycle.
///
/// Malformed records are logged and skipped. Any API or store error aborts the
/// run before or during the single write transaction, so nothing is committed.
pub async fn run_sync<S>(
    source: &S,
    pool: &SqlitePool,
    prune: bool,
    cancel: &CancellationToken,
) -> Result<SyncSummary, SyncError>
where
    S: MonitorSource + ?Sized,
{
    let raw = source.fetch_all_monitors(cancel).await?;

    let mut summary = SyncSummary {
        fetched: raw.len(),
        ..SyncSummary::default()
    };

    let mut monitors = Vec::with_capacity(raw.len());
    for (idx, record) in raw.iter().enumerate() {
        match normalize(record) {
            Ok(m) => monitors.push(m),
            Err(e) => {
                warn!("Skipping record #{}: {}", idx, e);
                summary.skipped += 1;
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled.into());
    }

    let stats = upsert_monitors(pool, &monitors, prune).await?;
    summary.stored = stats.monitors;
    summary.deactivated = stats.deactivated;

    info!(
        "Stored {} monitors ({} tags, {} notification targets, {} downtimes), skipped {}, deactivated {}",
        stats.monitors, stats.tags, stats.notifications, stats.downtimes, summary.skipped, stats.deactivated
    );

    Ok(summary)
}
