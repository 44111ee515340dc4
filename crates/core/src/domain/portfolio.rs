use crate::domain::holdings::HoldingSpec;
use anyhow::ensure;
use std::collections::HashSet;

/// Which of the two stored prices a computation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Current,
    PreviousClose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub previous_close: f64,
    pub regular_market_price: f64,
}

impl Quote {
    pub const ZERO: Quote = Quote {
        previous_close: 0.0,
        regular_market_price: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: u32,
    pub previous_close: f64,
    pub regular_market_price: f64,
}

impl Holding {
    pub fn price(&self, basis: Basis) -> f64 {
        match basis {
            Basis::Current => self.regular_market_price,
            Basis::PreviousClose => self.previous_close,
        }
    }

    pub fn value(&self, basis: Basis) -> f64 {
        f64::from(self.quantity) * self.price(basis)
    }

    pub fn price_change(&self) -> f64 {
        self.regular_market_price - self.previous_close
    }

    pub fn value_change(&self) -> f64 {
        f64::from(self.quantity) * self.price_change()
    }

    /// Both prices come from one quote; they are never updated separately.
    pub(crate) fn apply_quote(&mut self, quote: Quote) {
        self.previous_close = quote.previous_close;
        self.regular_market_price = quote.regular_market_price;
    }
}

/// Fixed set of holdings, in configuration order.
///
/// The key set cannot change after construction. Only prices move, and only
/// through [`crate::digest::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(specs: &[HoldingSpec]) -> anyhow::Result<Self> {
        let mut seen = HashSet::with_capacity(specs.len());
        let mut holdings = Vec::with_capacity(specs.len());
        for spec in specs {
            let symbol = spec.symbol.trim();
            ensure!(!symbol.is_empty(), "holding symbol must be non-empty");
            ensure!(seen.insert(symbol.to_string()), "duplicate holding symbol: {symbol}");
            holdings.push(Holding {
                symbol: symbol.to_string(),
                quantity: spec.quantity,
                previous_close: 0.0,
                regular_market_price: 0.0,
            });
        }
        Ok(Self { holdings })
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub(crate) fn holdings_mut(&mut self) -> &mut [Holding] {
        &mut self.holdings
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|h| h.symbol.as_str())
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total_value(&self, basis: Basis) -> f64 {
        self.holdings.iter().map(|h| h.value(basis)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(symbol: &str, quantity: u32) -> HoldingSpec {
        HoldingSpec {
            symbol: symbol.to_string(),
            quantity,
        }
    }

    fn priced(specs: &[HoldingSpec], quotes: &[(f64, f64)]) -> Portfolio {
        let mut p = Portfolio::new(specs).unwrap();
        for (h, (prev, cur)) in p.holdings_mut().iter_mut().zip(quotes) {
            h.apply_quote(Quote {
                previous_close: *prev,
                regular_market_price: *cur,
            });
        }
        p
    }

    #[test]
    fn prices_default_to_zero() {
        let p = Portfolio::new(&[spec("ITC.NS", 10)]).unwrap();
        let h = p.get("ITC.NS").unwrap();
        assert_eq!(h.previous_close, 0.0);
        assert_eq!(h.regular_market_price, 0.0);
        assert_eq!(p.total_value(Basis::Current), 0.0);
    }

    #[test]
    fn rejects_duplicate_and_empty_symbols() {
        assert!(Portfolio::new(&[spec("ITC.NS", 1), spec("ITC.NS", 2)]).is_err());
        assert!(Portfolio::new(&[spec("  ", 1)]).is_err());
    }

    #[test]
    fn total_value_per_basis() {
        let p = priced(&[spec("A", 5)], &[(10.0, 12.0)]);
        assert_eq!(p.total_value(Basis::Current), 60.0);
        assert_eq!(p.total_value(Basis::PreviousClose), 50.0);
    }

    #[test]
    fn total_value_scales_linearly_with_quantity() {
        let quotes = [(10.0, 12.5), (3.25, 3.0), (100.0, 101.0)];
        let base = priced(&[spec("A", 2), spec("B", 7), spec("C", 1)], &quotes);
        let scaled = priced(&[spec("A", 6), spec("B", 21), spec("C", 3)], &quotes);

        for basis in [Basis::Current, Basis::PreviousClose] {
            let expected = base.total_value(basis) * 3.0;
            assert!((scaled.total_value(basis) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn total_value_ignores_holding_order() {
        let a = priced(&[spec("A", 2), spec("B", 7)], &[(10.0, 12.5), (3.25, 3.0)]);
        let b = priced(&[spec("B", 7), spec("A", 2)], &[(3.25, 3.0), (10.0, 12.5)]);
        assert_eq!(a.total_value(Basis::Current), b.total_value(Basis::Current));

        let by_hand: f64 = a.holdings().iter().map(|h| h.value(Basis::Current)).sum();
        assert_eq!(a.total_value(Basis::Current), by_hand);
    }
}
