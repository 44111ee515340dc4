pub mod types;
pub mod yahoo;

use crate::domain::portfolio::Quote;

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("market data request failed: {0}")]
    Transport(reqwest::Error),

    #[error("market data HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed market data payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for QuoteError {
    fn from(err: reqwest::Error) -> Self {
        QuoteError::Transport(err.without_url())
    }
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;
}

/// Fetches one symbol; on any failure logs it and yields a zero quote alongside the error.
pub async fn fetch_or_zero(
    source: &dyn PriceSource,
    symbol: &str,
) -> (Quote, Option<QuoteError>) {
    match source.fetch_quote(symbol).await {
        Ok(quote) => (quote, None),
        Err(err) => {
            tracing::warn!(
                %symbol,
                source = source.source_name(),
                error = %err,
                "quote fetch failed; using zero prices"
            );
            (Quote::ZERO, Some(err))
        }
    }
}
