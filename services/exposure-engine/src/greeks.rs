//! Greek estimation
//!
//! Upstream chains rarely carry vanna, so it is estimated from Black-Scholes.
//! Dealer-side delta is never taken from upstream: it comes from a fixed
//! moneyness lookup so that DEX, the stability index and max pain all agree
//! even when upstream delta is missing.

use crate::types::OptionType;

/// Default annualised risk-free rate for the vanna estimate
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0408;

/// Implied volatility assumed when the chain carries none
pub const DEFAULT_IMPLIED_VOLATILITY: f64 = 0.30;

const SQRT_2PI: f64 = 2.5066282746310007;

/// Moneyness breakpoints (`strike / spot`) and the call delta at or above each
const CALL_DELTA_BUCKETS: [(f64, f64); 5] = [
    (1.10, 0.10),
    (1.05, 0.25),
    (1.00, 0.50),
    (0.95, 0.70),
    (0.90, 0.85),
];

/// Call delta for strikes below the lowest breakpoint
const DEEP_ITM_CALL_DELTA: f64 = 0.95;

/// Black-Scholes helpers
#[derive(Debug)]
pub struct BlackScholes;

impl BlackScholes {
    /// Standard normal probability density function
    #[must_use]
    pub fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / SQRT_2PI
    }

    /// Calculate d1 parameter
    #[must_use]
    pub fn d1(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
        ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
    }

    /// Calculate d2 parameter
    #[must_use]
    pub fn d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
        Self::d1(s, k, r, sigma, t) - sigma * t.sqrt()
    }

    /// Vanna (dDelta/dSigma), discounted
    ///
    /// `-e^{-rT} φ(d1) d2 / σ`. Returns 0 when `T <= 0`, `σ <= 0`, or any
    /// input is degenerate, never NaN.
    #[must_use]
    pub fn vanna(strike: f64, spot: f64, time: f64, implied_vol: f64, rate: f64) -> f64 {
        if !(time > 0.0) || !(implied_vol > 0.0) || !(strike > 0.0) || !(spot > 0.0) {
            return 0.0;
        }
        let d1 = Self::d1(spot, strike, rate, implied_vol, time);
        let d2 = d1 - implied_vol * time.sqrt();
        let vanna = -(-rate * time).exp() * Self::norm_pdf(d1) * (d2 / implied_vol);
        if vanna.is_finite() { vanna } else { 0.0 }
    }
}

/// Vanna with the default risk-free rate
#[must_use]
pub fn vanna(strike: f64, spot: f64, time: f64, implied_vol: f64) -> f64 {
    BlackScholes::vanna(strike, spot, time, implied_vol, DEFAULT_RISK_FREE_RATE)
}

/// Vanna to use for a leg: upstream when present and non-zero, otherwise estimated
///
/// Estimation only kicks in when gamma is non-zero; a leg without gamma has no
/// dealer exposure to feed.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn effective_vanna(
    upstream: Option<f64>,
    gamma: f64,
    strike: f64,
    spot: f64,
    time: f64,
    implied_vol: Option<f64>,
    rate: f64,
    default_vol: f64,
) -> f64 {
    match upstream {
        Some(v) if v != 0.0 => v,
        _ if gamma != 0.0 => {
            let sigma = implied_vol.filter(|iv| *iv > 0.0).unwrap_or(default_vol);
            BlackScholes::vanna(strike, spot, time, sigma, rate)
        }
        _ => 0.0,
    }
}

/// Call delta from the moneyness table
#[must_use]
pub fn moneyness_call_delta(strike: f64, spot: f64) -> f64 {
    if !(spot > 0.0) {
        return 0.0;
    }
    let ratio = strike / spot;
    CALL_DELTA_BUCKETS
        .iter()
        .find(|(breakpoint, _)| ratio >= *breakpoint)
        .map_or(DEEP_ITM_CALL_DELTA, |(_, delta)| *delta)
}

/// Dealer-side delta from the moneyness table; puts are `call - 1`
#[must_use]
pub fn moneyness_delta(strike: f64, spot: f64, option_type: OptionType) -> f64 {
    let call = moneyness_call_delta(strike, spot);
    match option_type {
        OptionType::Call => call,
        OptionType::Put => call - 1.0,
    }
}
