use crate::digest::Totals;
use crate::domain::portfolio::{Holding, Portfolio};
use std::fmt::Write;

const HEADER: &str = "📊 Portfolio digest";
const UP: &str = "📈";
const DOWN: &str = "📉";
const CURRENCY: &str = "₹";

/// `+12.34` / `-12.34`: the sign, then the absolute value to two decimals.
pub fn signed(value: f64) -> String {
    let sign = if value < 0.0 { '-' } else { '+' };
    format!("{sign}{:.2}", value.abs())
}

/// Percentage of `change` against `base`; `None` when `base` is zero or the result is not finite.
pub fn percent_change(change: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    let pct = change * 100.0 / base;
    pct.is_finite().then_some(pct)
}

pub fn percent_label(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{}%", signed(p)),
        None => "n/a".to_string(),
    }
}

/// Up or down indicator; no glyph when the change is exactly zero.
pub fn glyph(change: f64) -> Option<&'static str> {
    if change > 0.0 {
        Some(UP)
    } else if change < 0.0 {
        Some(DOWN)
    } else {
        None
    }
}

fn change_line(change: f64, pct: Option<f64>) -> String {
    let figures = format!("{} ({})", signed(change), percent_label(pct));
    match glyph(change) {
        Some(g) => format!("{g} {figures}"),
        None => figures,
    }
}

fn holding_block(out: &mut String, h: &Holding) {
    let price_change = h.price_change();
    let pct = percent_change(price_change, h.previous_close);

    let _ = writeln!(
        out,
        "{}: {} @ {CURRENCY}{:.2}",
        h.symbol, h.quantity, h.regular_market_price
    );
    let _ = writeln!(
        out,
        "  {CURRENCY}{:.2} → {CURRENCY}{:.2}",
        h.previous_close, h.regular_market_price
    );
    // Direction follows the price move; the figures are the position's value change.
    let figures = format!("{} ({})", signed(h.value_change()), percent_label(pct));
    let _ = match glyph(price_change) {
        Some(g) => writeln!(out, "  {g} {figures}"),
        None => writeln!(out, "  {figures}"),
    };
}

pub fn render(portfolio: &Portfolio) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}");

    for h in portfolio.holdings() {
        out.push('\n');
        holding_block(&mut out, h);
    }

    let totals = Totals::of(portfolio);
    out.push('\n');
    let _ = writeln!(out, "Current value: {CURRENCY}{:.2}", totals.current);
    let _ = writeln!(out, "Previous close value: {CURRENCY}{:.2}", totals.previous);
    let _ = write!(
        out,
        "Total change: {}",
        change_line(totals.change(), totals.percent_change())
    );

    out
}
