//! Exposure calculator
//!
//! Per-leg GEX, DEX, VEX and dealer exposure. Every function is pure and
//! resolves missing or degenerate inputs to a zero contribution.

use crate::greeks::moneyness_delta;
use crate::types::{strike_key, OptionType};
use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::ops::{Add, AddAssign};

/// Shares per standard equity option contract
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Vanna weight in the effective gamma of the dealer exposure
const VANNA_WEIGHT: f64 = 0.25;
/// Assumed spot/vol correlation applied to vanna
const SPOT_VOL_CORRELATION: f64 = -0.7;
/// Width of the Gaussian moneyness weight on VEX
const VEX_MONEYNESS_WIDTH: f64 = 0.5;
/// Floor on T in the VEX time weight
const VEX_MIN_TIME: f64 = 0.01;

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn signed(value: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => value,
        OptionType::Put => -value,
    }
}

/// Sign convention for delta exposure
///
/// `DealerShort` is the convention the stability index was tuned against.
/// `CallsNegated` reproduces the alternate screener view, where call DEX is
/// flipped; it is never used on the stability path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaConvention {
    /// `DEX = delta * oi * multiplier * spot` with table delta, puts `call - 1`
    #[default]
    DealerShort,
    /// As `DealerShort`, with call DEX negated
    CallsNegated,
}

/// Everything needed to price one leg's exposures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegInput {
    /// Open interest (possibly a live override)
    pub open_interest: f64,
    /// Underlying spot
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Years to expiry
    pub time_to_expiry: f64,
    /// Call or put
    pub option_type: OptionType,
    /// Upstream delta (dealer exposure live weight only)
    pub delta: f64,
    /// Upstream gamma
    pub gamma: f64,
    /// Upstream vega
    pub vega: f64,
    /// Upstream or estimated vanna
    pub vanna: f64,
}

/// All four exposures for a single leg
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegExposure {
    /// Gamma exposure
    pub gex: f64,
    /// Delta exposure
    pub dex: f64,
    /// Vega exposure
    pub vex: f64,
    /// Composite dealer exposure
    pub dealer: f64,
}

/// Exposure calculator with contract sizing and DEX convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureCalculator {
    /// Shares per contract
    pub multiplier: f64,
    /// DEX sign convention
    pub convention: DeltaConvention,
}

impl Default for ExposureCalculator {
    fn default() -> Self {
        Self {
            multiplier: CONTRACT_MULTIPLIER,
            convention: DeltaConvention::DealerShort,
        }
    }
}

impl ExposureCalculator {
    /// Calculator with a custom multiplier and the canonical convention
    #[must_use]
    pub fn with_multiplier(multiplier: f64) -> Self {
        Self {
            multiplier,
            ..Self::default()
        }
    }

    /// `gamma * oi * spot² * multiplier`, negated for puts
    #[must_use]
    pub fn gex(&self, oi: f64, gamma: f64, spot: f64, option_type: OptionType) -> f64 {
        finite_or_zero(signed(gamma * oi * spot * spot * self.multiplier, option_type))
    }

    /// `delta * oi * multiplier * spot` with the moneyness table delta
    #[must_use]
    pub fn dex(&self, oi: f64, strike: f64, spot: f64, option_type: OptionType) -> f64 {
        let delta = moneyness_delta(strike, spot, option_type);
        let value = finite_or_zero(delta * oi * self.multiplier * spot);
        match (self.convention, option_type) {
            (DeltaConvention::CallsNegated, OptionType::Call) => -value,
            _ => value,
        }
    }

    /// `vega * oi * spot * multiplier * moneynessWeight * timeWeight`, negated for puts
    #[must_use]
    pub fn vex(
        &self,
        oi: f64,
        vega: f64,
        strike: f64,
        spot: f64,
        time: f64,
        option_type: OptionType,
    ) -> f64 {
        if !(time > 0.0) || !(strike > 0.0) || !(spot > 0.0) {
            return 0.0;
        }
        let log_moneyness = (strike / spot).ln();
        let moneyness_weight = (-(log_moneyness * log_moneyness) / VEX_MONEYNESS_WIDTH).exp();
        let time_weight = time.sqrt() * (1.0 + 0.5 / time.max(VEX_MIN_TIME));
        finite_or_zero(signed(
            vega * oi * spot * self.multiplier * moneyness_weight * time_weight,
            option_type,
        ))
    }

    /// Gamma blended with vanna, weighted by a delta-derived live factor and `1/√T`
    ///
    /// Zero once the expiration has elapsed.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn dealer(
        &self,
        oi: f64,
        gamma: f64,
        vanna: f64,
        delta: f64,
        spot: f64,
        time: f64,
        option_type: OptionType,
    ) -> f64 {
        if !(time > 0.0) {
            return 0.0;
        }
        let gamma_eff = gamma + VANNA_WEIGHT * vanna * SPOT_VOL_CORRELATION;
        let abs_delta = delta.abs();
        let live_weight = abs_delta * (1.0 - abs_delta);
        let time_weight = 1.0 / time.sqrt();
        finite_or_zero(signed(
            oi * gamma_eff * live_weight * time_weight * spot * self.multiplier,
            option_type,
        ))
    }

    /// All four exposures for a leg
    #[must_use]
    pub fn leg(&self, input: &LegInput) -> LegExposure {
        LegExposure {
            gex: self.gex(input.open_interest, input.gamma, input.spot, input.option_type),
            dex: self.dex(input.open_interest, input.strike, input.spot, input.option_type),
            vex: self.vex(
                input.open_interest,
                input.vega,
                input.strike,
                input.spot,
                input.time_to_expiry,
                input.option_type,
            ),
            dealer: self.dealer(
                input.open_interest,
                input.gamma,
                input.vanna,
                input.delta,
                input.spot,
                input.time_to_expiry,
                input.option_type,
            ),
        }
    }
}

/// GEX with the standard multiplier
#[must_use]
pub fn gamma_exposure(oi: f64, gamma: f64, spot: f64, option_type: OptionType) -> f64 {
    ExposureCalculator::default().gex(oi, gamma, spot, option_type)
}

/// DEX with the standard multiplier and dealer-short convention
#[must_use]
pub fn delta_exposure(oi: f64, strike: f64, spot: f64, option_type: OptionType) -> f64 {
    ExposureCalculator::default().dex(oi, strike, spot, option_type)
}

/// VEX with the standard multiplier
#[must_use]
pub fn vega_exposure(
    oi: f64,
    vega: f64,
    strike: f64,
    spot: f64,
    time: f64,
    option_type: OptionType,
) -> f64 {
    ExposureCalculator::default().vex(oi, vega, strike, spot, time, option_type)
}

/// Dealer exposure with the standard multiplier
#[must_use]
pub fn dealer_exposure(
    oi: f64,
    gamma: f64,
    vanna: f64,
    delta: f64,
    spot: f64,
    time: f64,
    option_type: OptionType,
) -> f64 {
    ExposureCalculator::default().dealer(oi, gamma, vanna, delta, spot, time, option_type)
}

/// Call and put values of one exposure; net is always derived from them
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SidePair {
    /// Call side
    pub call: f64,
    /// Put side
    pub put: f64,
}

impl SidePair {
    /// `call + put`
    #[must_use]
    pub fn net(&self) -> f64 {
        self.call + self.put
    }

    /// Add a leg's value to the matching side
    pub fn add_side(&mut self, option_type: OptionType, value: f64) {
        match option_type {
            OptionType::Call => self.call += value,
            OptionType::Put => self.put += value,
        }
    }
}

impl Add for SidePair {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            call: self.call + rhs.call,
            put: self.put + rhs.put,
        }
    }
}

impl AddAssign for SidePair {
    fn add_assign(&mut self, rhs: Self) {
        self.call += rhs.call;
        self.put += rhs.put;
    }
}

impl Serialize for SidePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SidePair", 3)?;
        state.serialize_field("call", &self.call)?;
        state.serialize_field("put", &self.put)?;
        state.serialize_field("net", &self.net())?;
        state.end()
    }
}

/// Exposures at one strike, for one expiration or merged across several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    /// Expiration, `None` for a merged multi-expiration row
    pub expiration: Option<NaiveDate>,
    /// Strike price
    pub strike: f64,
    /// Gamma exposure
    pub gex: SidePair,
    /// Delta exposure
    pub dex: SidePair,
    /// Vega exposure
    pub vex: SidePair,
    /// Dealer exposure
    pub dealer: SidePair,
}

impl ExposureSnapshot {
    /// Empty row for a strike
    #[must_use]
    pub fn new(expiration: Option<NaiveDate>, strike: f64) -> Self {
        Self {
            expiration,
            strike,
            gex: SidePair::default(),
            dex: SidePair::default(),
            vex: SidePair::default(),
            dealer: SidePair::default(),
        }
    }

    /// Fixed-point strike key
    #[must_use]
    pub fn strike_key(&self) -> u64 {
        strike_key(self.strike)
    }

    /// Record one leg's exposures on its side
    pub fn add_leg(&mut self, option_type: OptionType, leg: &LegExposure) {
        self.gex.add_side(option_type, leg.gex);
        self.dex.add_side(option_type, leg.dex);
        self.vex.add_side(option_type, leg.vex);
        self.dealer.add_side(option_type, leg.dealer);
    }

    /// Sum another row into this one
    pub fn accumulate(&mut self, other: &ExposureSnapshot) {
        self.gex += other.gex;
        self.dex += other.dex;
        self.vex += other.vex;
        self.dealer += other.dealer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gex_scenario() {
        // 0.05 * 1000 * 100² * 100
        assert!((gamma_exposure(1000.0, 0.05, 100.0, OptionType::Call) - 50_000_000.0).abs() < 1e-6);
        assert!((gamma_exposure(1000.0, 0.05, 100.0, OptionType::Put) + 50_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_dex_complementary_deltas() {
        let call = delta_exposure(10.0, 100.0, 100.0, OptionType::Call);
        let put = delta_exposure(10.0, 100.0, 100.0, OptionType::Put);
        assert_eq!(call, 0.5 * 10.0 * 100.0 * 100.0);
        assert_eq!(put, -0.5 * 10.0 * 100.0 * 100.0);

        let negated = ExposureCalculator {
            convention: DeltaConvention::CallsNegated,
            ..ExposureCalculator::default()
        };
        assert_eq!(negated.dex(10.0, 100.0, 100.0, OptionType::Call), -call);
        assert_eq!(negated.dex(10.0, 100.0, 100.0, OptionType::Put), put);
    }

    #[test]
    fn test_vex_atm_weights() {
        // ATM: moneyness weight 1; T = 0.25: √T * (1 + 0.5 / 0.25) = 0.5 * 3
        let v = vega_exposure(100.0, 0.2, 100.0, 100.0, 0.25, OptionType::Call);
        assert!((v - 0.2 * 100.0 * 100.0 * 100.0 * 1.5).abs() < 1e-6);
        assert_eq!(vega_exposure(100.0, 0.2, 100.0, 100.0, 0.0, OptionType::Call), 0.0);
    }

    #[test]
    fn test_dealer_exposure_expired_is_zero() {
        assert_eq!(dealer_exposure(100.0, 0.05, 0.1, 0.5, 100.0, 0.0, OptionType::Call), 0.0);
        assert_eq!(dealer_exposure(100.0, 0.05, 0.1, 0.5, 100.0, -0.1, OptionType::Put), 0.0);
    }

    #[test]
    fn test_dealer_exposure_formula() {
        // gammaEff = 0.05 + 0.25 * 0.2 * -0.7 = 0.015; live = 0.25; wT = 2
        let v = dealer_exposure(100.0, 0.05, 0.2, 0.5, 100.0, 0.25, OptionType::Put);
        assert!((v + 100.0 * 0.015 * 0.25 * 2.0 * 100.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_side_pair_net_and_serialization() {
        let pair = SidePair { call: 3.0, put: -1.0 };
        assert_eq!(pair.net(), 2.0);
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#"{"call":3.0,"put":-1.0,"net":2.0}"#);
    }
}
