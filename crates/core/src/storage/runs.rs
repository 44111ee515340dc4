use crate::broadcast::BroadcastReport;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

// One row per fire date. The primary key makes a second claim for the same
// date a no-op, so restarts and concurrent workers send at most once per day.

pub async fn last_fired_date(pool: &sqlx::PgPool) -> anyhow::Result<Option<NaiveDate>> {
    let row: (Option<NaiveDate>,) = sqlx::query_as("SELECT MAX(fire_date) FROM digest_runs")
        .persistent(false)
        .fetch_one(pool)
        .await
        .context("select last digest run failed")?;
    Ok(row.0)
}

pub async fn try_claim_fire_date(
    pool: &sqlx::PgPool,
    fire_date: NaiveDate,
    fired_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "INSERT INTO digest_runs (fire_date, fired_at, status) \
         VALUES ($1, $2, 'running') \
         ON CONFLICT (fire_date) DO NOTHING",
    )
    .persistent(false)
    .bind(fire_date)
    .bind(fired_at)
    .execute(pool)
    .await
    .with_context(|| format!("claim digest run failed (fire_date={fire_date})"))?;
    Ok(res.rows_affected() == 1)
}

pub async fn record_finished(
    pool: &sqlx::PgPool,
    fire_date: NaiveDate,
    report: &BroadcastReport,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE digest_runs \
         SET status = $2, recipients = $3, delivered = $4, failed = $5, \
             degraded_symbols = $6, finished_at = now() \
         WHERE fire_date = $1",
    )
    .persistent(false)
    .bind(fire_date)
    .bind(report.outcome_label())
    .bind(count_i32(report.recipients))
    .bind(count_i32(report.delivered))
    .bind(count_i32(report.failed))
    .bind(report.digest_status.degraded_symbols().to_vec())
    .execute(pool)
    .await
    .with_context(|| format!("update digest run failed (fire_date={fire_date})"))?;
    Ok(())
}

pub async fn record_failed(
    pool: &sqlx::PgPool,
    fire_date: NaiveDate,
    error: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE digest_runs SET status = 'error', error = $2, finished_at = now() \
         WHERE fire_date = $1",
    )
    .persistent(false)
    .bind(fire_date)
    .bind(error)
    .execute(pool)
    .await
    .with_context(|| format!("update failed digest run failed (fire_date={fire_date})"))?;
    Ok(())
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
