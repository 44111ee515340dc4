use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::watch;

use mintfolio_core::broadcast::send_digest_to_all;
use mintfolio_core::domain::holdings::HoldingSpec;
use mintfolio_core::market::yahoo::YahooChartClient;
use mintfolio_core::notify::telegram::TelegramNotifier;
use mintfolio_core::schedule::{DailySchedule, Plan};
use mintfolio_core::storage::runs;
use mintfolio_core::storage::subscribers::PgSubscriberStore;

// Re-plan at least this often so clock jumps and runs recorded by other
// workers are picked up.
const MAX_SLEEP: std::time::Duration = std::time::Duration::from_secs(3600);
const ERROR_SLEEP: std::time::Duration = std::time::Duration::from_secs(60);

pub struct DigestJob {
    pub pool: sqlx::PgPool,
    pub store: PgSubscriberStore,
    pub notifier: TelegramNotifier,
    pub source: YahooChartClient,
    pub holdings: Vec<HoldingSpec>,
}

impl DigestJob {
    /// Claims `fire_date` and sends the digest. Failures are logged and recorded, never returned.
    ///
    /// Returns false only when the claim itself could not be made, i.e. the
    /// date is still unsettled.
    pub async fn fire(&self, fire_date: NaiveDate) -> bool {
        match runs::try_claim_fire_date(&self.pool, fire_date, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(%fire_date, "digest already sent for this date; skipping");
                return true;
            }
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(%fire_date, error = %e, "claiming digest run failed");
                return false;
            }
        }

        tracing::info!(%fire_date, "running portfolio update task");

        let result = send_digest_to_all(&self.store, &self.notifier, &self.source, &self.holdings).await;

        let recorded = match &result {
            Ok(report) => runs::record_finished(&self.pool, fire_date, report).await,
            Err(e) => {
                sentry_anyhow::capture_anyhow(e);
                tracing::error!(%fire_date, error = %e, "sending portfolio updates failed");
                runs::record_failed(&self.pool, fire_date, &format!("{e:#}")).await
            }
        };

        if let Err(e) = recorded {
            tracing::error!(%fire_date, error = %e, "recording digest run failed");
        }
        true
    }
}

pub async fn run_forever(job: &DigestJob, schedule: DailySchedule, catch_up: Duration) {
    // One listener for the whole run, so a ctrl-c that lands mid-fire is not lost.
    let (tx, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = tx.send(true);
        }
    });

    loop {
        let last_fired = match runs::last_fired_date(&job.pool).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "reading last digest run failed");
                if sleep_or_shutdown(&mut shutdown, ERROR_SLEEP).await {
                    return;
                }
                continue;
            }
        };

        match schedule.plan(Utc::now(), last_fired, catch_up) {
            Plan::Fire { fire_date } => {
                let settled = job.fire(fire_date).await;
                if *shutdown.borrow() {
                    return;
                }
                if !settled && sleep_or_shutdown(&mut shutdown, ERROR_SLEEP).await {
                    return;
                }
            }
            Plan::Wait { until } => {
                tracing::info!(%until, ?last_fired, "next digest scheduled");
                let remaining = (until - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                if sleep_or_shutdown(&mut shutdown, remaining.min(MAX_SLEEP)).await {
                    return;
                }
            }
        }
    }
}

/// Returns true when shutdown was requested before or during the sleep.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, d: std::time::Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    if !shutdown_possible(shutdown) {
        tokio::time::sleep(d).await;
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(d) => false,
        requested = shutdown.wait_for(|stop| *stop) => requested.is_ok(),
    }
}

// Without a sender (ctrl-c listener failed) no request can ever arrive.
fn shutdown_possible(shutdown: &watch::Receiver<bool>) -> bool {
    shutdown.has_changed().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: std::time::Duration = std::time::Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn pending_shutdown_skips_the_sleep() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let started = tokio::time::Instant::now();
        assert!(sleep_or_shutdown(&mut rx, MINUTE).await);
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn full_sleep_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);

        let started = tokio::time::Instant::now();
        assert!(!sleep_or_shutdown(&mut rx, MINUTE).await);
        assert!(started.elapsed() >= MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_sleep_wakes_early() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let started = tokio::time::Instant::now();
        assert!(sleep_or_shutdown(&mut rx, MINUTE).await);
        assert!(started.elapsed() < MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn request_sent_while_busy_is_seen_at_next_sleep() {
        let (tx, mut rx) = watch::channel(false);

        // Stands in for a long fire: the request arrives while nobody is waiting.
        tx.send(true).unwrap();
        tokio::time::sleep(MINUTE).await;

        assert!(*rx.borrow());
        assert!(sleep_or_shutdown(&mut rx, MINUTE).await);
    }
}
