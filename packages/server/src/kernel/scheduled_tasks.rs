//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! This module provides periodic tasks that run on schedules:
//! - Dispatching due WhatsApp messages
//! - Sweeping long-expired builder sessions
//!
//! # Architecture
//!
//! The cron trigger is the exclusion mechanism for the dispatcher: it fires
//! at most once per interval, so two invocations never operate on
//! overlapping batches.
//!
//! ```text
//! Scheduler (every 5 minutes)
//!     │
//!     └─► dispatch_due_messages()
//!             └─► For each due message → template/freeform decision → gateway
//! ```

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::builder::models::BuilderSession;
use crate::kernel::ServerDeps;

/// Expired sessions linger this long before the sweep deletes them
const SESSION_SWEEP_GRACE_HOURS: i64 = 24;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: Arc<ServerDeps>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Message dispatch - runs every five minutes
    let dispatch_deps = deps.clone();
    let dispatch_job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let deps = dispatch_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_message_dispatch(&deps).await {
                tracing::error!("Message dispatch task failed: {}", e);
            }
        })
    })?;

    scheduler.add(dispatch_job).await?;

    // Builder session sweep - runs every hour
    let sweep_deps = deps.clone();
    let sweep_job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let deps = sweep_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_session_sweep(&deps).await {
                tracing::error!("Session sweep task failed: {}", e);
            }
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (message dispatch every 5 minutes, session sweep every hour)"
    );
    Ok(scheduler)
}

/// Run the scheduled message dispatch
async fn run_message_dispatch(deps: &ServerDeps) -> Result<()> {
    let report = deps.dispatcher().dispatch_due_messages().await?;

    if report.processed == 0 {
        tracing::debug!("No scheduled messages due");
        return Ok(());
    }

    tracing::info!(
        "Message dispatch complete: {} processed, {} successful, {} failed",
        report.processed,
        report.successful,
        report.failed
    );

    Ok(())
}

/// Delete builder sessions that expired more than a day ago
async fn run_session_sweep(deps: &ServerDeps) -> Result<()> {
    let cutoff = Utc::now() - Duration::hours(SESSION_SWEEP_GRACE_HOURS);
    let removed = BuilderSession::sweep_expired(cutoff, &deps.db_pool).await?;

    if removed > 0 {
        tracing::info!("Session sweep complete: removed {} expired sessions", removed);
    }

    Ok(())
}
