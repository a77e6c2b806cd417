use crate::context::SubmissionContext;
use crate::points;
use crate::sync;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const RECURRING_GRANT_BATCH: i64 = 100;

/// Starts the periodic tasks: group-membership reconciliation and the
/// points sweeps (credit expiry + recurring grants). Tasks stop when the
/// token is cancelled.
pub fn spawn_periodic_tasks(
    ctx: Arc<SubmissionContext>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let sync_period = Duration::from_secs(ctx.config.group_sync_period_secs);
    let sync_ctx = ctx.clone();
    let sync_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sync_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = sync_cancel.cancelled() => {
                    info!("Group sync task shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if let Err(err) = sync::sync_all_groups(&sync_ctx, false).await {
                error!("Scheduled group sync failed: {err}");
            }
        }
    }));

    let sweep_period = Duration::from_secs(ctx.config.points_sweep_period_secs);
    let sweep_ctx = ctx.clone();
    let sweep_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => {
                    info!("Points sweep task shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }
            let result = sweep_ctx
                .run_db(|conn| {
                    let expired = points::expire_due_credits(conn)?;
                    let granted = points::process_recurring_grants(conn, RECURRING_GRANT_BATCH)?;
                    Ok((expired, granted))
                })
                .await;
            match result {
                Ok((expired, granted)) if expired > 0 || granted > 0 => {
                    info!("Points sweep: expired {expired} credits, processed {granted} grants");
                }
                Ok(_) => {}
                Err(err) => error!("Points sweep failed: {err}"),
            }
        }
    }));

    handles
}
