//! Cross-symbol screener rows and rankings

use crate::engine::ChainAnalysis;
use crate::stability::Regime;
use chrono::NaiveDate;
use serde::Serialize;

/// One symbol's headline readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenerRow {
    pub ticker: String,
    pub spot: f64,
    /// Expiration the max pain reading belongs to
    pub expiration: Option<NaiveDate>,
    /// Nearest-expiration max pain strike, spot when unavailable
    pub max_pain: f64,
    /// `(max_pain - spot) / spot` in percent
    pub distance_pct: f64,
    pub stability_index: f64,
    pub regime: Regime,
}

impl ScreenerRow {
    /// Row from a completed analysis
    #[must_use]
    pub fn from_analysis(analysis: &ChainAnalysis) -> Self {
        let spot = analysis.spot();
        let (expiration, max_pain, distance_pct) = match analysis.nearest_max_pain() {
            Some(result) => (result.expiration, result.strike, result.distance_pct(spot)),
            None => (None, spot, 0.0),
        };
        Self {
            ticker: analysis.ticker().to_string(),
            spot,
            expiration,
            max_pain,
            distance_pct,
            stability_index: analysis.stability.value(),
            regime: analysis.stability.regime(),
        }
    }
}

/// Closest pins first; ties by ticker
#[must_use]
pub fn rank_by_pin_distance(mut rows: Vec<ScreenerRow>) -> Vec<ScreenerRow> {
    rows.sort_by(|a, b| {
        a.distance_pct
            .abs()
            .total_cmp(&b.distance_pct.abs())
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    rows
}

/// Most stable first; ties by ticker
#[must_use]
pub fn rank_by_stability(mut rows: Vec<ScreenerRow>) -> Vec<ScreenerRow> {
    rows.sort_by(|a, b| {
        b.stability_index
            .total_cmp(&a.stability_index)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    rows
}
