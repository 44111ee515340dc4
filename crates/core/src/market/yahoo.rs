use crate::config::Settings;
use crate::domain::portfolio::Quote;
use crate::market::types::ChartEnvelope;
use crate::market::{PriceSource, QuoteError};
use anyhow::Context;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CHART_PATH: &str = "/v8/finance/chart";
const USER_AGENT: &str = concat!("mintfolio/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = settings
            .market_data_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(&settings.market_data_base_url, Duration::from_secs(timeout_secs))
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!("{}{}/{}", self.base_url, CHART_PATH, symbol)
    }
}

#[async_trait::async_trait]
impl PriceSource for YahooChartClient {
    fn source_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let res = self
            .http
            .get(self.url(symbol))
            .query(&[("close", "adjusted")])
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(QuoteError::Status { status, body: text });
        }

        parse_chart_quote(&text)
    }
}

pub fn parse_chart_quote(body: &str) -> Result<Quote, QuoteError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| QuoteError::Payload(format!("invalid chart JSON: {e}")))?;

    if let Some(err) = envelope.chart.error {
        return Err(QuoteError::Payload(format!(
            "chart error {}: {}",
            err.code.as_deref().unwrap_or("unknown"),
            err.description.as_deref().unwrap_or("")
        )));
    }

    let meta = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| QuoteError::Payload("chart.result is empty".to_string()))?;

    match (meta.previous_close, meta.regular_market_price) {
        (Some(previous_close), Some(regular_market_price)) => Ok(Quote {
            previous_close,
            regular_market_price,
        }),
        _ => Err(QuoteError::Payload(
            "meta.previousClose or meta.regularMarketPrice missing".to_string(),
        )),
    }
}
