use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintfolio_core::config::Settings;
use mintfolio_core::domain::holdings::{holdings_from_env, HoldingSpec};
use mintfolio_core::market::yahoo::YahooChartClient;
use mintfolio_core::notify::telegram::TelegramNotifier;
use mintfolio_core::schedule::{self, DailySchedule};
use mintfolio_core::storage::subscribers::PgSubscriberStore;

mod scheduler;

#[derive(Debug, Parser)]
#[command(name = "mintfolio_worker")]
struct Args {
    /// Send today's digest immediately instead of waiting for the schedule.
    /// Still claims today's run, so it will not send twice.
    #[arg(long)]
    once: bool,

    /// Price the portfolio and print the digest. No database, no messages.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(e) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "worker exited with error");
        return Err(e);
    }
    Ok(())
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let holdings: Vec<HoldingSpec> = holdings_from_env()?;
    let source = YahooChartClient::from_settings(settings)?;

    if args.dry_run {
        return dry_run(&source, &holdings).await;
    }

    let schedule = DailySchedule::from_env()?;
    let catch_up = schedule::catch_up_from_env()?;

    let pool = mintfolio_core::storage::connect(settings.require_database_url()?).await?;
    mintfolio_core::storage::migrate(&pool).await?;

    let job = scheduler::DigestJob {
        pool: pool.clone(),
        store: PgSubscriberStore::new(pool),
        notifier: TelegramNotifier::from_settings(settings)?,
        source,
        holdings,
    };

    if args.once {
        let fire_date = schedule.fire_date(chrono::Utc::now());
        tracing::info!(%fire_date, "running digest once");
        anyhow::ensure!(job.fire(fire_date).await, "could not claim digest run for {fire_date}");
        return Ok(());
    }

    tracing::info!(
        hour = schedule.hour,
        minute = schedule.minute,
        tz = %schedule.tz,
        catch_up_minutes = catch_up.num_minutes(),
        "digest scheduler started"
    );
    scheduler::run_forever(&job, schedule, catch_up).await;
    Ok(())
}

async fn dry_run(source: &YahooChartClient, holdings: &[HoldingSpec]) -> anyhow::Result<()> {
    let mut portfolio = mintfolio_core::domain::portfolio::Portfolio::new(holdings)?;
    let digest = mintfolio_core::digest::compose(&mut portfolio, source).await;

    tracing::info!(
        dry_run = true,
        status = digest.status.as_str(),
        degraded = ?digest.status.degraded_symbols(),
        current_total = digest.totals.current,
        previous_total = digest.totals.previous,
        "digest composed"
    );
    println!("{}", digest.text);
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from(["mintfolio_worker", "--once"]).unwrap();
        assert!(args.once);
        assert!(!args.dry_run);

        let args = Args::try_parse_from(["mintfolio_worker", "--dry-run"]).unwrap();
        assert!(args.dry_run);

        assert!(Args::try_parse_from(["mintfolio_worker", "--bogus"]).is_err());
    }
}
