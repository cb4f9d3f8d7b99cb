/// TradeEngine: the rule coupling a discrete grid move to continuous prices.
///
/// A move from cell A to cell B is "sell everything at h(A), buy at h(B)":
///
///   new_stocks = max(floor(h0 · stocks / h1), floor_min)
///   buy_price  = h1
///
/// Both prices are sampled at the current instant. The gain signal
/// `h0 - buy_price` only drives feedback effects, it never touches holdings.
///
/// Capital is never stored: `capital = floor(stocks · h(cell, now))`.

use crate::config::TradeConfig;

/// Heights at or below this are treated as this when dividing.
const MIN_PRICE: f64 = 1e-3;

/// Outcome of one trade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TradeResult {
    pub stocks: f64,
    pub buy_price: f64,
    /// Signed, scaled and capped gain. Zero means "no effect".
    pub effect: f64,
}

/// Sell at `h0`, buy at `h1`.
pub fn trade(stocks: f64, buy_price: f64, h0: f64, h1: f64, cfg: &TradeConfig) -> TradeResult {
    let h0 = sanitize(h0);
    let h1 = sanitize(h1);
    let raw = (h0 * stocks / h1).floor();
    let stocks = if raw.is_finite() { raw.max(cfg.floor_min) } else { cfg.floor_min };
    TradeResult {
        stocks,
        buy_price: h1,
        effect: effect_magnitude(h0 - buy_price, cfg),
    }
}

/// `sign(gain) · min(cap, |gain| · scale)`; exactly zero for zero gain.
pub fn effect_magnitude(gain: f64, cfg: &TradeConfig) -> f64 {
    if gain == 0.0 || !gain.is_finite() {
        return 0.0;
    }
    gain.signum() * (gain.abs() * cfg.effect_scale).min(cfg.effect_cap)
}

/// Derived capital for a holding at the given price.
pub fn capital(stocks: f64, price: f64) -> i64 {
    let c = (stocks * price).floor();
    if c.is_finite() { c as i64 } else { 0 }
}

fn sanitize(price: f64) -> f64 {
    if price.is_finite() { price.max(MIN_PRICE) } else { MIN_PRICE }
}
