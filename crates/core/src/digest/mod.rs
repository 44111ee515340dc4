pub mod format;

use crate::domain::portfolio::{Basis, Portfolio};
use crate::market::{self, PriceSource};
use futures::future::join_all;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub attempted: usize,
    pub failures: Vec<SymbolFailure>,
}

impl RefreshReport {
    pub fn status(&self) -> DigestStatus {
        if self.failures.is_empty() {
            DigestStatus::Complete
        } else if self.failures.len() >= self.attempted {
            DigestStatus::Unavailable
        } else {
            DigestStatus::Degraded {
                symbols: self.failures.iter().map(|f| f.symbol.clone()).collect(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestStatus {
    /// Every symbol returned prices.
    Complete,
    /// Some symbols fell back to zero prices.
    Degraded { symbols: Vec<String> },
    /// No symbol returned prices; the figures are meaningless.
    Unavailable,
}

impl DigestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestStatus::Complete => "complete",
            DigestStatus::Degraded { .. } => "degraded",
            DigestStatus::Unavailable => "unavailable",
        }
    }

    pub fn degraded_symbols(&self) -> &[String] {
        match self {
            DigestStatus::Degraded { symbols } => symbols,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub current: f64,
    pub previous: f64,
}

impl Totals {
    pub fn of(portfolio: &Portfolio) -> Self {
        Self {
            current: portfolio.total_value(Basis::Current),
            previous: portfolio.total_value(Basis::PreviousClose),
        }
    }

    pub fn change(&self) -> f64 {
        self.current - self.previous
    }

    pub fn percent_change(&self) -> Option<f64> {
        format::percent_change(self.change(), self.previous)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub text: String,
    pub totals: Totals,
    pub status: DigestStatus,
}

/// Re-prices every holding concurrently and waits for all of them to settle.
///
/// A failed symbol gets zero prices and is listed in the report; it never
/// aborts the others.
pub async fn refresh(portfolio: &mut Portfolio, source: &dyn PriceSource) -> RefreshReport {
    let symbols: Vec<String> = portfolio.symbols().map(str::to_string).collect();
    let results = join_all(
        symbols
            .iter()
            .map(|symbol| market::fetch_or_zero(source, symbol)),
    )
    .await;

    let mut failures = Vec::new();
    for (holding, (quote, err)) in portfolio.holdings_mut().iter_mut().zip(results) {
        holding.apply_quote(quote);
        if let Some(err) = err {
            failures.push(SymbolFailure {
                symbol: holding.symbol.clone(),
                error: err.to_string(),
            });
        }
    }

    RefreshReport {
        attempted: symbols.len(),
        failures,
    }
}

pub async fn compose(portfolio: &mut Portfolio, source: &dyn PriceSource) -> Digest {
    let report = refresh(portfolio, source).await;
    let status = report.status();

    tracing::info!(
        attempted = report.attempted,
        failed = report.failures.len(),
        status = status.as_str(),
        "portfolio refreshed"
    );

    Digest {
        text: format::render(portfolio),
        totals: Totals::of(portfolio),
        status,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedPrices;
    use super::*;
    use crate::domain::holdings::HoldingSpec;
    use crate::domain::portfolio::Quote;
    use crate::market::QuoteError;

    fn portfolio(specs: &[(&str, u32)]) -> Portfolio {
        let specs: Vec<HoldingSpec> = specs
            .iter()
            .map(|(s, q)| HoldingSpec {
                symbol: s.to_string(),
                quantity: *q,
            })
            .collect();
        Portfolio::new(&specs).unwrap()
    }

    #[tokio::test]
    async fn failed_symbols_are_zeroed_and_others_still_priced() {
        let mut p = portfolio(&[("A.NS", 5), ("BAD.NS", 3), ("C.NS", 2)]);
        let source = FixedPrices::default()
            .with("A.NS", 10.0, 12.0)
            .with("C.NS", 4.0, 3.0);

        let report = refresh(&mut p, &source).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "BAD.NS");

        let bad = p.get("BAD.NS").unwrap();
        assert_eq!(bad.previous_close, 0.0);
        assert_eq!(bad.regular_market_price, 0.0);
        assert_eq!(p.get("A.NS").unwrap().regular_market_price, 12.0);
        assert_eq!(p.get("C.NS").unwrap().previous_close, 4.0);

        assert_eq!(
            report.status(),
            DigestStatus::Degraded {
                symbols: vec!["BAD.NS".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn refresh_overwrites_stale_prices_with_zero_on_failure() {
        let mut p = portfolio(&[("A.NS", 1)]);
        refresh(&mut p, &FixedPrices::default().with("A.NS", 10.0, 11.0)).await;
        assert_eq!(p.get("A.NS").unwrap().regular_market_price, 11.0);

        let report = refresh(&mut p, &FixedPrices::default()).await;
        assert_eq!(report.status(), DigestStatus::Unavailable);
        let h = p.get("A.NS").unwrap();
        assert_eq!((h.previous_close, h.regular_market_price), (0.0, 0.0));
    }

    #[tokio::test]
    async fn compose_single_holding_scenario() {
        let mut p = portfolio(&[("A.NS", 5)]);
        let digest = compose(&mut p, &FixedPrices::default().with("A.NS", 10.0, 12.0)).await;

        assert_eq!(digest.status, DigestStatus::Complete);
        assert_eq!(digest.totals.current, 60.0);
        assert_eq!(digest.totals.previous, 50.0);
        assert_eq!(digest.totals.change(), 10.0);
        assert_eq!(digest.totals.percent_change(), Some(20.0));
        assert!(digest.text.contains("+10.00 (+20.00%)"), "{}", digest.text);
    }

    #[tokio::test]
    async fn failed_symbol_renders_na_percentage() {
        let mut p = portfolio(&[("A.NS", 5), ("BAD.NS", 2)]);
        let digest = compose(&mut p, &FixedPrices::default().with("A.NS", 10.0, 12.0)).await;

        let bad = p.get("BAD.NS").unwrap();
        assert_eq!(format::percent_change(bad.price_change(), bad.previous_close), None);
        assert!(digest.text.contains("+0.00 (n/a)"), "{}", digest.text);
    }

    /// Every quote takes one second of (paused) tokio time.
    struct SlowPrices(FixedPrices);

    #[async_trait::async_trait]
    impl PriceSource for SlowPrices {
        fn source_name(&self) -> &'static str {
            "slow"
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            self.0.fetch_quote(symbol).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_fetches_symbols_concurrently() {
        let mut p = portfolio(&[("A.NS", 1), ("B.NS", 1), ("C.NS", 1)]);
        let source = SlowPrices(
            FixedPrices::default()
                .with("A.NS", 1.0, 2.0)
                .with("B.NS", 1.0, 2.0)
                .with("C.NS", 1.0, 2.0),
        );

        let started = tokio::time::Instant::now();
        let report = refresh(&mut p, &source).await;
        let elapsed = started.elapsed();

        // One at a time would take three seconds.
        assert!(elapsed < std::time::Duration::from_secs(2), "{elapsed:?}");
        assert!(report.failures.is_empty());
        assert!(p.holdings().iter().all(|h| h.regular_market_price == 2.0));
    }

    #[test]
    fn empty_refresh_is_complete() {
        assert_eq!(RefreshReport::default().status(), DigestStatus::Complete);
    }
}
