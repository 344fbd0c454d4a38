use chrono::NaiveDateTime;
use orion_relay::retention::{run_cleanup_cycle, should_fire, until_next_minute};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::observability::alerts::Severity;

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(3);

/// Handle to the daily cleanup task.
pub struct RetentionScheduler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RetentionScheduler {
    /// Spawns the task, or returns `None` when cleanup is disabled.
    pub fn start(ctx: AppContext) -> Option<Self> {
        let config = ctx.config.retention.clone();
        if !config.enabled {
            tracing::info!("Event cleanup disabled");
            return None;
        }

        tracing::info!(
            retention_days = config.retention_days,
            fire_at = %config.fire_at.format("%H:%M"),
            "Starting retention scheduler"
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_retention_scheduler(ctx, token.clone()));

        Some(Self { token, handle })
    }

    /// Cancels the task and waits up to `grace` for it to finish.
    /// Returns `false` if it had to be abandoned.
    pub async fn stop(self, grace: Duration) -> bool {
        self.token.cancel();
        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(())) => {
                tracing::info!("Retention scheduler stopped");
                true
            }
            Ok(Err(e)) => {
                tracing::error!("Retention scheduler task failed: {:?}", e);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "Retention scheduler did not stop within {}s",
                    grace.as_secs()
                );
                false
            }
        }
    }
}

async fn run_retention_scheduler(ctx: AppContext, shutdown: CancellationToken) {
    let mut last_fired: Option<NaiveDateTime> = None;

    loop {
        let now = ctx.config.now();

        if should_fire(now, ctx.config.retention.fire_at, last_fired) {
            last_fired = Some(now);
            run_cycle(&ctx, now).await;
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Retention scheduler shutdown requested");
                break;
            }
            _ = tokio::time::sleep(until_next_minute(ctx.config.now())) => {}
        }
    }
}

async fn run_cycle(ctx: &AppContext, now: NaiveDateTime) {
    let pool = ctx.pool.clone();
    let config = ctx.config.retention.clone();

    let result = tokio::task::spawn_blocking(move || run_cleanup_cycle(&pool, &config, now)).await;

    match result {
        Ok(Ok(deleted)) => {
            ctx.metrics.record_cleanup(deleted as u64);
            tracing::info!(deleted, "Retention cleanup finished");
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to delete expired events: {:?}", e);
            ctx.metrics.increment_errors();
            ctx.alerts
                .send_alert(
                    &ctx.bot,
                    Severity::Error,
                    "Retention",
                    &format!("Failed to delete expired events: {}", e),
                )
                .await;
        }
        Err(e) => {
            tracing::error!("Retention cleanup task panicked: {:?}", e);
            ctx.metrics.increment_errors();
        }
    }
}
