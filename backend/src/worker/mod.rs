use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::state::AppState;

/// Spawns the periodic expiry sweep. An interval of zero disables it.
pub async fn start_background_workers(state: AppState) {
    let every = state.config.expiry_sweep_interval_secs;
    if every == 0 {
        info!("expiry sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_expiry_sweep(&state, OffsetDateTime::now_utc()).await;
        }
    });
}

async fn run_expiry_sweep(state: &AppState, now: OffsetDateTime) {
    match state
        .reconciler()
        .check_and_update_expired_subscriptions(now, state.config.overdue_grace_days)
        .await
    {
        Ok(report) if report.marked_overdue + report.expired + report.errors > 0 => {
            info!(
                checked = report.checked,
                marked_overdue = report.marked_overdue,
                expired = report.expired,
                errors = report.errors,
                "expiry sweep finished"
            );
        }
        Ok(_) => {}
        Err(err) => error!(?err, "expiry sweep failed"),
    }
}
