//! Max pain / market-maker risk minimiser
//!
//! Grid search over candidate settlement prices. The reported strike is
//! always one of the significant strikes, never an interpolated test price.

use crate::aggregator::{ChainAggregation, StrikeAggregate};
use crate::config::{EngineConfig, MaxPainConfig};
use crate::exposure::CONTRACT_MULTIPLIER;
use crate::greeks::moneyness_delta;
use crate::types::OptionType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Vega scaling applied per leg in the risk function
const VEGA_SHOCK: f64 = 0.02;

/// Risk at one test price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    /// Candidate settlement price
    pub price: f64,
    /// Aggregate market-maker risk at that price
    pub risk: f64,
}

/// Outcome of a max pain search for one expiration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxPainResult {
    /// Expiration searched, if known
    pub expiration: Option<NaiveDate>,
    /// Risk-minimising significant strike (spot when there are none)
    pub strike: f64,
    /// Minimum risk found
    pub min_risk: f64,
    /// Test price at which the minimum occurred
    pub optimal_price: f64,
    /// Risk curve across test prices
    pub curve: Vec<RiskPoint>,
    /// Strikes that passed the open interest threshold
    pub significant_strikes: Vec<f64>,
}

impl MaxPainResult {
    /// Result for an input without significant strikes
    #[must_use]
    pub fn degenerate(expiration: Option<NaiveDate>, spot: f64) -> Self {
        Self {
            expiration,
            strike: spot,
            min_risk: 0.0,
            optimal_price: spot,
            curve: Vec::new(),
            significant_strikes: Vec::new(),
        }
    }

    /// Whether the search had no significant strikes to work with
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.significant_strikes.is_empty()
    }

    /// Signed distance from spot to the max pain strike, in percent of spot
    #[must_use]
    pub fn distance_pct(&self, spot: f64) -> f64 {
        if spot > 0.0 {
            (self.strike - spot) / spot * 100.0
        } else {
            0.0
        }
    }
}

/// Max pain search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPainCalculator {
    /// Search parameters
    pub config: MaxPainConfig,
    /// Shares per contract
    pub multiplier: f64,
}

impl Default for MaxPainCalculator {
    fn default() -> Self {
        Self {
            config: MaxPainConfig::default(),
            multiplier: CONTRACT_MULTIPLIER,
        }
    }
}

impl MaxPainCalculator {
    /// Calculator from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.max_pain,
            multiplier: config.greeks.contract_multiplier,
        }
    }

    /// Strikes whose combined open interest reaches the threshold
    pub fn significant<'a>(
        &self,
        aggregates: impl IntoIterator<Item = &'a StrikeAggregate>,
    ) -> Vec<&'a StrikeAggregate> {
        let mut strikes: Vec<&StrikeAggregate> = aggregates
            .into_iter()
            .filter(|agg| agg.total_oi() >= self.config.min_significant_oi)
            .collect();
        strikes.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        strikes
    }

    /// Padded significant span intersected with the spot band
    ///
    /// Falls back to the bare significant span when the two do not overlap.
    #[must_use]
    pub fn test_range(&self, lowest: f64, highest: f64, spot: f64) -> (f64, f64) {
        let span = highest - lowest;
        let padding = span * self.config.range_padding;
        let lo = (lowest - padding).max(spot * (1.0 - self.config.spot_band));
        let hi = (highest + padding).min(spot * (1.0 + self.config.spot_band));
        if lo <= hi { (lo, hi) } else { (lowest, highest) }
    }

    /// Equally spaced test prices across the range
    #[must_use]
    pub fn test_prices(&self, lo: f64, hi: f64) -> Vec<f64> {
        let n = self.config.sample_count.max(2);
        let step = (hi - lo) / (n - 1) as f64;
        (0..n).map(|i| lo + step * i as f64).collect()
    }

    fn leg_risk(&self, price: f64, strike: f64, option_type: OptionType, aggregate: &StrikeAggregate) -> f64 {
        let Some(leg) = aggregate.leg(option_type) else {
            return 0.0;
        };
        let distance = price - strike;
        let delta = moneyness_delta(strike, price, option_type).abs();
        let greeks = &leg.greeks;
        leg.open_interest as f64
            * self.multiplier
            * (delta * distance.abs()
                + 0.5 * greeks.gamma.abs() * distance * distance
                + greeks.theta.abs()
                + (greeks.vega * VEGA_SHOCK).abs())
    }

    /// Aggregate market-maker risk if the underlying settles at `price`
    #[must_use]
    pub fn risk_at(&self, price: f64, significant: &[&StrikeAggregate]) -> f64 {
        significant
            .iter()
            .map(|agg| {
                self.leg_risk(price, agg.strike, OptionType::Call, agg)
                    + self.leg_risk(price, agg.strike, OptionType::Put, agg)
            })
            .sum()
    }

    /// Run the search over one expiration's aggregates
    pub fn compute<'a>(
        &self,
        aggregates: impl IntoIterator<Item = &'a StrikeAggregate>,
        spot: f64,
    ) -> MaxPainResult {
        let significant = self.significant(aggregates);
        let expiration = significant.first().map(|agg| agg.expiration);
        let (Some(first), Some(last)) = (significant.first(), significant.last()) else {
            return MaxPainResult::degenerate(expiration, spot);
        };

        let (lo, hi) = self.test_range(first.strike, last.strike, spot);
        let curve: Vec<RiskPoint> = self
            .test_prices(lo, hi)
            .into_iter()
            .map(|price| RiskPoint {
                price,
                risk: self.risk_at(price, &significant),
            })
            .collect();

        let Some(optimal) = curve
            .iter()
            .copied()
            .reduce(|best, point| if point.risk < best.risk { point } else { best })
        else {
            return MaxPainResult::degenerate(expiration, spot);
        };

        let strike = significant
            .iter()
            .map(|agg| agg.strike)
            .reduce(|best, strike| {
                if (strike - optimal.price).abs() < (best - optimal.price).abs() {
                    strike
                } else {
                    best
                }
            })
            .unwrap_or(spot);

        debug!(
            ?expiration,
            significant = significant.len(),
            lo,
            hi,
            optimal_price = optimal.price,
            strike,
            "Max pain search complete"
        );

        MaxPainResult {
            expiration,
            strike,
            min_risk: optimal.risk,
            optimal_price: optimal.price,
            curve,
            significant_strikes: significant.iter().map(|agg| agg.strike).collect(),
        }
    }

    /// Max pain for every expiration in an aggregation
    #[must_use]
    pub fn by_expiration(&self, aggregation: &ChainAggregation) -> BTreeMap<NaiveDate, MaxPainResult> {
        aggregation
            .expirations()
            .into_iter()
            .map(|expiration| {
                let mut result = self.compute(aggregation.aggregates_for(expiration), aggregation.spot);
                result.expiration = Some(expiration);
                (expiration, result)
            })
            .collect()
    }
}

/// Max pain for one expiration with default parameters
pub fn max_pain<'a>(aggregates: impl IntoIterator<Item = &'a StrikeAggregate>, spot: f64) -> MaxPainResult {
    MaxPainCalculator::default().compute(aggregates, spot)
}

/// Max pain for every expiration with default parameters
#[must_use]
pub fn max_pain_by_expiration(aggregation: &ChainAggregation) -> BTreeMap<NaiveDate, MaxPainResult> {
    MaxPainCalculator::default().by_expiration(aggregation)
}
