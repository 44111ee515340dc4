use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingSpec {
    pub symbol: String,
    pub quantity: u32,
}

const DEFAULT_HOLDINGS: [(&str, u32); 10] = [
    ("BANKBARODA.NS", 5),
    ("JINDALSTEL.NS", 9),
    ("HDFCBANK.NS", 8),
    ("JPPOWER.NS", 13),
    ("AJANTSOY.BO", 21),
    ("RTNPOWER.NS", 7),
    ("TATASTEEL.NS", 10),
    ("INDIGO.NS", 14),
    ("BAJFINANCE.NS", 3),
    ("ITC.NS", 10),
];

pub fn default_holdings() -> Vec<HoldingSpec> {
    DEFAULT_HOLDINGS
        .iter()
        .map(|(symbol, quantity)| HoldingSpec {
            symbol: symbol.to_string(),
            quantity: *quantity,
        })
        .collect()
}

/// Holdings from `PORTFOLIO_HOLDINGS="SYM:QTY,SYM:QTY"`, or the built-in list when unset.
pub fn holdings_from_env() -> anyhow::Result<Vec<HoldingSpec>> {
    match std::env::var("PORTFOLIO_HOLDINGS") {
        Ok(s) if !s.trim().is_empty() => {
            parse_holdings(&s).context("invalid PORTFOLIO_HOLDINGS")
        }
        _ => Ok(default_holdings()),
    }
}

pub fn parse_holdings(s: &str) -> anyhow::Result<Vec<HoldingSpec>> {
    let mut out = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (symbol, quantity) = part
            .rsplit_once(':')
            .with_context(|| format!("expected SYMBOL:QUANTITY, got {part:?}"))?;
        let symbol = symbol.trim();
        anyhow::ensure!(!symbol.is_empty(), "empty symbol in {part:?}");
        let quantity = quantity
            .trim()
            .parse::<u32>()
            .with_context(|| format!("quantity for {symbol} must be a non-negative integer"))?;

        out.push(HoldingSpec {
            symbol: symbol.to_string(),
            quantity,
        });
    }

    anyhow::ensure!(!out.is_empty(), "at least one holding is required");
    Ok(out)
}
