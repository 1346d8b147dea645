//! Queue maintenance: stalled-job recovery and retention of finished jobs.
//!
//! Runs once at startup and then on a fixed interval until cancelled.
//! Failed jobs are never purged; they stay for operator inspection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marketsync_core::types::Timestamp;
use marketsync_db::{Store, StoreError};
use tokio_util::sync::CancellationToken;

/// How often maintenance runs.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSettings {
    /// A job locked for longer than this is considered abandoned.
    pub stalled_after: Duration,
    /// Completed jobs older than this are deleted.
    pub retain_completed: Duration,
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub recovered: u64,
    pub purged: u64,
}

/// Run one maintenance pass.
pub async fn run_once(
    store: &dyn Store,
    settings: MaintenanceSettings,
) -> Result<MaintenanceReport, StoreError> {
    let now = Utc::now();
    let stalled_cutoff = cutoff(now, settings.stalled_after);
    let retention_cutoff = cutoff(now, settings.retain_completed);

    Ok(MaintenanceReport {
        recovered: store.recover_stalled_jobs(stalled_cutoff).await?,
        purged: store.purge_completed_jobs(retention_cutoff).await?,
    })
}

/// Run the maintenance loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn Store>, settings: MaintenanceSettings, cancel: CancellationToken) {
    tracing::info!(
        stalled_after_secs = settings.stalled_after.as_secs(),
        retain_completed_secs = settings.retain_completed.as_secs(),
        interval_secs = MAINTENANCE_INTERVAL.as_secs(),
        "Queue maintenance started",
    );

    // The first tick fires immediately, covering jobs left behind by a crash.
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Queue maintenance stopping");
                break;
            }
            _ = interval.tick() => {
                match run_once(&*store, settings).await {
                    Ok(report) if report != MaintenanceReport::default() => {
                        tracing::info!(
                            recovered = report.recovered,
                            purged = report.purged,
                            "Queue maintenance: jobs recovered or purged",
                        );
                    }
                    Ok(_) => tracing::debug!("Queue maintenance: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Queue maintenance failed"),
                }
            }
        }
    }
}

fn cutoff(now: Timestamp, age: Duration) -> Timestamp {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
}
