use chrono::{Local, NaiveDateTime, NaiveTime};
use feed_relay::workflows::conversion::{ConversionService, RunTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Time left until the next wall-clock occurrence of `at`; an occurrence
/// equal to `now` counts as already passed.
pub(crate) fn delay_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

/// Runs a scheduled conversion once a day at `at` local time.
pub(crate) fn spawn_daily(service: Arc<ConversionService>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = delay_until_next(Local::now().naive_local(), at);
            info!(%at, wait_secs = delay.as_secs(), "next scheduled conversion");
            tokio::time::sleep(delay).await;

            let worker = Arc::clone(&service);
            match tokio::task::spawn_blocking(move || worker.run(RunTrigger::Scheduled)).await {
                Ok(Ok(stats)) => info!(
                    total = stats.total,
                    errors = stats.errors,
                    "scheduled conversion finished"
                ),
                Ok(Err(err)) => warn!(error = %err, "scheduled conversion did not complete"),
                Err(err) => error!(error = %err, "scheduled conversion task failed"),
            }
        }
    })
}
