//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The only task is the expiry sweep. It is optional: deployments that run
//! the `sweep_expired` binary (or hit `POST /api/matches/sweep`) from an
//! external scheduler leave `SWEEP_SCHEDULE` unset.
//!
//! ```text
//! Scheduler (SWEEP_SCHEDULE, e.g. every minute)
//!     │
//!     └─► sweep_expired()
//!             └─► expire overdue offers → advance each affected request
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::matching::activities::sweep_expired;
use crate::kernel::ServerDeps;

/// Start the sweep on `schedule` (cron with seconds, e.g. `0 * * * * *`)
pub async fn start_scheduler(schedule: &str, deps: Arc<ServerDeps>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async(schedule, move |_uuid, _lock| {
        let deps = deps.clone();
        Box::pin(async move {
            run_sweep(&deps).await;
        })
    })
    .with_context(|| format!("Invalid SWEEP_SCHEDULE: {}", schedule))?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Scheduled expiry sweep started");
    Ok(scheduler)
}

async fn run_sweep(deps: &ServerDeps) {
    match sweep_expired(deps).await {
        Ok(report) if report.expired > 0 => {
            tracing::info!(
                expired = report.expired,
                advanced = report.advanced,
                exhausted = report.exhausted,
                failed = report.failed,
                "Scheduled sweep finished"
            );
        }
        Ok(_) => tracing::debug!("Scheduled sweep found nothing overdue"),
        Err(e) => tracing::error!(error = %e, "Scheduled sweep failed"),
    }
}
