//! Stability index
//!
//! `SI = totalGEX / (|totalVEX| + |totalDEX|)`, always derived from the three
//! totals and always finite. The regime table is evaluated high to low, first
//! match wins, boundaries inclusive.

use crate::exposure::ExposureSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market regime implied by the stability index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// SI >= 2.0
    ExtremelyStable,
    /// SI >= 0.5
    HighlyStable,
    /// SI >= 0
    MildlySupportive,
    /// SI >= -0.5
    VolatilityBuilding,
    /// SI >= -2.0
    ReflexiveMarket,
    /// SI < -2.0
    ExtremelyReflexive,
}

/// Lower bounds in evaluation order
const REGIME_TABLE: [(f64, Regime); 5] = [
    (2.0, Regime::ExtremelyStable),
    (0.5, Regime::HighlyStable),
    (0.0, Regime::MildlySupportive),
    (-0.5, Regime::VolatilityBuilding),
    (-2.0, Regime::ReflexiveMarket),
];

impl Regime {
    /// Classify a stability index; non-finite input is read as 0
    #[must_use]
    pub fn classify(si: f64) -> Self {
        let si = if si.is_finite() { si } else { 0.0 };
        REGIME_TABLE
            .iter()
            .find(|(bound, _)| si >= *bound)
            .map_or(Self::ExtremelyReflexive, |(_, regime)| *regime)
    }

    /// Display label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtremelyStable => "EXTREMELY STABLE",
            Self::HighlyStable => "HIGHLY STABLE",
            Self::MildlySupportive => "MILDLY SUPPORTIVE",
            Self::VolatilityBuilding => "VOLATILITY BUILDING",
            Self::ReflexiveMarket => "REFLEXIVE MARKET",
            Self::ExtremelyReflexive => "EXTREMELY REFLEXIVE",
        }
    }

    /// Expected price behaviour
    #[must_use]
    pub fn behavior(&self) -> &'static str {
        match self {
            Self::ExtremelyStable => "Strong mean reversion",
            Self::HighlyStable => "Mean reverting",
            Self::MildlySupportive => "Range-bound",
            Self::VolatilityBuilding => "Breakout likely",
            Self::ReflexiveMarket => "Fragile & explosive",
            Self::ExtremelyReflexive => "Highly explosive",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `totalGEX / (|totalVEX| + |totalDEX|)`, 0 when undefined
#[must_use]
pub fn stability_ratio(total_gex: f64, total_vex: f64, total_dex: f64) -> f64 {
    let denominator = total_vex.abs() + total_dex.abs();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let si = total_gex / denominator;
    if si.is_finite() { si } else { 0.0 }
}

/// Exposure totals over an evaluation window
///
/// Only the totals are stored; the index and regime are derived on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityIndex {
    /// Σ(call + put) GEX
    pub total_gex: f64,
    /// Σ(call + put) VEX
    pub total_vex: f64,
    /// Σ(call + put) DEX with table delta
    pub total_dex: f64,
}

impl StabilityIndex {
    /// Index from precomputed totals
    #[must_use]
    pub fn from_totals(total_gex: f64, total_vex: f64, total_dex: f64) -> Self {
        Self {
            total_gex,
            total_vex,
            total_dex,
        }
    }

    /// Sum a snapshot set
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a ExposureSnapshot>) -> Self {
        snapshots
            .into_iter()
            .fold(Self::default(), |acc, s| Self {
                total_gex: acc.total_gex + s.gex.net(),
                total_vex: acc.total_vex + s.vex.net(),
                total_dex: acc.total_dex + s.dex.net(),
            })
    }

    /// The stability index
    #[must_use]
    pub fn value(&self) -> f64 {
        stability_ratio(self.total_gex, self.total_vex, self.total_dex)
    }

    /// Regime for the current value
    #[must_use]
    pub fn regime(&self) -> Regime {
        Regime::classify(self.value())
    }

    /// Flattened view for display and serialisation
    #[must_use]
    pub fn reading(&self) -> StabilityReading {
        let regime = self.regime();
        StabilityReading {
            total_gex: self.total_gex,
            total_vex: self.total_vex,
            total_dex: self.total_dex,
            stability_index: self.value(),
            regime,
            label: regime.label(),
            behavior: regime.behavior(),
        }
    }
}

/// Stability index with its totals and regime, ready for output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StabilityReading {
    /// Σ GEX
    pub total_gex: f64,
    /// Σ VEX
    pub total_vex: f64,
    /// Σ DEX
    pub total_dex: f64,
    /// SI
    pub stability_index: f64,
    /// Regime
    pub regime: Regime,
    /// Regime label
    pub label: &'static str,
    /// Regime behaviour
    pub behavior: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_inclusive() {
        assert_eq!(Regime::classify(2.0), Regime::ExtremelyStable);
        assert_eq!(Regime::classify(0.5), Regime::HighlyStable);
        assert_eq!(Regime::classify(0.0), Regime::MildlySupportive);
        assert_eq!(Regime::classify(-0.5), Regime::VolatilityBuilding);
        assert_eq!(Regime::classify(-2.0), Regime::ReflexiveMarket);
        assert_eq!(Regime::classify(-2.000001), Regime::ExtremelyReflexive);
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(stability_ratio(1e12, 0.0, 0.0), 0.0);
        assert_eq!(stability_ratio(-5.0, 0.0, -0.0), 0.0);
        assert_eq!(stability_ratio(f64::INFINITY, 1.0, 1.0), 0.0);
        assert_eq!(stability_ratio(f64::NAN, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_non_finite_classifies_as_supportive() {
        assert_eq!(Regime::classify(f64::NAN), Regime::MildlySupportive);
        assert_eq!(Regime::classify(f64::INFINITY), Regime::MildlySupportive);
    }
}
