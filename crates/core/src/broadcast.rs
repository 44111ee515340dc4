use crate::digest::{self, DigestStatus};
use crate::domain::holdings::HoldingSpec;
use crate::domain::portfolio::Portfolio;
use crate::market::PriceSource;
use crate::notify::Notifier;
use crate::storage::subscribers::SubscriberStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: bool,
    pub digest_status: DigestStatus,
}

impl BroadcastReport {
    pub fn outcome_label(&self) -> &'static str {
        if self.skipped {
            "skipped"
        } else if self.failed > 0 {
            "partial"
        } else {
            "success"
        }
    }
}

/// Prices a fresh portfolio, renders the digest and sends it to every subscriber in turn.
///
/// Sends are sequential. A failed send is logged and counted; the remaining
/// subscribers still get theirs. When no symbol could be priced nothing is
/// sent.
pub async fn send_digest_to_all(
    store: &dyn SubscriberStore,
    notifier: &dyn Notifier,
    source: &dyn PriceSource,
    holdings: &[HoldingSpec],
) -> anyhow::Result<BroadcastReport> {
    let subscribers = store.list_all().await?;
    let mut portfolio = Portfolio::new(holdings)?;
    let digest = digest::compose(&mut portfolio, source).await;

    let mut report = BroadcastReport {
        recipients: subscribers.len(),
        delivered: 0,
        failed: 0,
        skipped: false,
        digest_status: digest.status.clone(),
    };

    match &digest.status {
        DigestStatus::Unavailable => {
            tracing::error!(
                recipients = report.recipients,
                "no prices available; digest not sent"
            );
            report.skipped = true;
            return Ok(report);
        }
        DigestStatus::Degraded { symbols } => {
            tracing::warn!(?symbols, "sending digest with zero prices for some symbols");
        }
        DigestStatus::Complete => {}
    }

    for user_id in subscribers {
        match notifier.send(user_id, &digest.text).await {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                report.failed += 1;
                tracing::error!(user_id, error = %err, "sending digest failed");
            }
        }
    }

    tracing::info!(
        recipients = report.recipients,
        delivered = report.delivered,
        failed = report.failed,
        "portfolio digest sent"
    );

    Ok(report)
}
