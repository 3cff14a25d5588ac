//! Strike/expiration aggregation
//!
//! A pure fold over the chain: each pass builds fresh [`StrikeAggregate`] and
//! [`ExposureSnapshot`] maps from the contracts plus optional live open
//! interest overrides. Nothing is patched in place; callers re-run the pass.

use crate::config::{EngineConfig, GreeksConfig, WindowConfig};
use crate::error::{validate_spot, EngineResult};
use crate::exposure::{ExposureCalculator, ExposureSnapshot, LegInput, SidePair};
use crate::greeks::effective_vanna;
use crate::types::{
    strike_from_key, ContractKey, Greeks, OptionChain, OptionContract, OptionType,
};
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Live open interest by contract, substituted for snapshot open interest
pub type LiveOiOverrides = FxHashMap<ContractKey, u64>;

/// Hour (UTC) at which an expiration's session closes
const SESSION_CLOSE_HOUR_UTC: u32 = 20;
const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Years from `as_of` to the expiration's session close, never negative
#[must_use]
pub fn time_to_expiry(expiration: NaiveDate, as_of: DateTime<Utc>) -> f64 {
    let Some(close) = expiration.and_hms_opt(SESSION_CLOSE_HOUR_UTC, 0, 0) else {
        return 0.0;
    };
    let seconds = (close.and_utc() - as_of).num_seconds();
    if seconds <= 0 {
        0.0
    } else {
        seconds as f64 / SECONDS_PER_YEAR
    }
}

/// Which expirations take part in an aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationWindow {
    /// Latest expiration kept, in days from the evaluation date
    pub max_days: i64,
    /// Global cap in months, applied regardless of `max_days`
    pub max_months: u32,
}

impl Default for ExpirationWindow {
    fn default() -> Self {
        Self::from(&WindowConfig::default())
    }
}

impl From<&WindowConfig> for ExpirationWindow {
    fn from(config: &WindowConfig) -> Self {
        Self {
            max_days: config.max_days_to_expiry,
            max_months: config.max_expiration_months,
        }
    }
}

impl ExpirationWindow {
    /// Latest date allowed by the global month cap
    #[must_use]
    pub fn global_cap(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_months(Months::new(self.max_months))
            .unwrap_or(NaiveDate::MAX)
    }

    /// `today <= expiration <= today + max_days`, ignoring the global cap
    #[must_use]
    pub fn within_days(&self, today: NaiveDate, expiration: NaiveDate) -> bool {
        let horizon = today
            .checked_add_signed(Duration::days(self.max_days))
            .unwrap_or(NaiveDate::MAX);
        expiration >= today && expiration <= horizon
    }

    /// Day window and global cap both satisfied
    #[must_use]
    pub fn contains(&self, today: NaiveDate, expiration: NaiveDate) -> bool {
        self.within_days(today, expiration) && expiration <= self.global_cap(today)
    }
}

/// One side of a strike as it entered aggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegData {
    /// Effective open interest (override when present)
    pub open_interest: u64,
    /// Snapshot open interest before any override
    pub snapshot_open_interest: u64,
    /// Upstream Greeks
    pub greeks: Greeks,
    /// Upstream implied volatility
    pub implied_volatility: Option<f64>,
}

impl LegData {
    /// Whether a live open interest override replaced the snapshot value
    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.open_interest != self.snapshot_open_interest
    }
}

/// Merged call and put legs at one (expiration, strike)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeAggregate {
    /// Expiration date
    pub expiration: NaiveDate,
    /// Strike price
    pub strike: f64,
    /// Call leg, absent when it has no open interest
    pub call: Option<LegData>,
    /// Put leg, absent when it has no open interest
    pub put: Option<LegData>,
}

impl StrikeAggregate {
    /// Leg for a side
    #[must_use]
    pub fn leg(&self, option_type: OptionType) -> Option<&LegData> {
        match option_type {
            OptionType::Call => self.call.as_ref(),
            OptionType::Put => self.put.as_ref(),
        }
    }

    /// Call open interest
    #[must_use]
    pub fn call_oi(&self) -> u64 {
        self.call.map_or(0, |l| l.open_interest)
    }

    /// Put open interest
    #[must_use]
    pub fn put_oi(&self) -> u64 {
        self.put.map_or(0, |l| l.open_interest)
    }

    /// Combined open interest
    #[must_use]
    pub fn total_oi(&self) -> u64 {
        self.call_oi().saturating_add(self.put_oi())
    }
}

/// Summed exposures over a whole aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureTotals {
    /// Gamma exposure
    pub gex: SidePair,
    /// Delta exposure
    pub dex: SidePair,
    /// Vega exposure
    pub vex: SidePair,
    /// Dealer exposure
    pub dealer: SidePair,
}

/// Result of one aggregation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ChainAggregation {
    /// Underlying ticker
    pub ticker: String,
    /// Spot used for every exposure
    pub spot: f64,
    /// Evaluation instant
    pub as_of: DateTime<Utc>,
    /// Merged legs keyed by (expiration, fixed-point strike)
    pub aggregates: BTreeMap<(NaiveDate, u64), StrikeAggregate>,
    /// Exposures keyed by (expiration, fixed-point strike)
    pub snapshots: BTreeMap<(NaiveDate, u64), ExposureSnapshot>,
    /// Expirations present in the chain but outside the window
    pub skipped_expirations: Vec<NaiveDate>,
}

impl ChainAggregation {
    /// Expirations that contributed at least one strike
    #[must_use]
    pub fn expirations(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.aggregates.keys().map(|(d, _)| *d).collect();
        dates.dedup();
        dates
    }

    /// Aggregates of a single expiration in strike order
    pub fn aggregates_for(&self, expiration: NaiveDate) -> impl Iterator<Item = &StrikeAggregate> {
        self.aggregates
            .range((expiration, u64::MIN)..=(expiration, u64::MAX))
            .map(|(_, agg)| agg)
    }

    /// Snapshots of a single expiration in strike order
    pub fn snapshots_for(&self, expiration: NaiveDate) -> impl Iterator<Item = &ExposureSnapshot> {
        self.snapshots
            .range((expiration, u64::MIN)..=(expiration, u64::MAX))
            .map(|(_, snap)| snap)
    }

    /// Snapshots summed across expirations, one row per strike
    #[must_use]
    pub fn merged_by_strike(&self) -> BTreeMap<u64, ExposureSnapshot> {
        let mut merged: BTreeMap<u64, ExposureSnapshot> = BTreeMap::new();
        for (&(_, key), snapshot) in &self.snapshots {
            merged
                .entry(key)
                .or_insert_with(|| ExposureSnapshot::new(None, strike_from_key(key)))
                .accumulate(snapshot);
        }
        merged
    }

    /// Sum of every snapshot
    #[must_use]
    pub fn totals(&self) -> ExposureTotals {
        self.snapshots
            .values()
            .fold(ExposureTotals::default(), |mut acc, s| {
                acc.gex += s.gex;
                acc.dex += s.dex;
                acc.vex += s.vex;
                acc.dealer += s.dealer;
                acc
            })
    }

    /// Strike with the largest absolute net GEX across expirations
    #[must_use]
    pub fn gamma_wall(&self) -> Option<f64> {
        self.merged_by_strike()
            .values()
            .max_by(|a, b| a.gex.net().abs().total_cmp(&b.gex.net().abs()))
            .map(|s| s.strike)
    }

    /// Put open interest over call open interest; `None` without call interest
    #[must_use]
    pub fn put_call_ratio(&self) -> Option<f64> {
        let (calls, puts) = self
            .aggregates
            .values()
            .fold((0u64, 0u64), |(c, p), agg| {
                (c.saturating_add(agg.call_oi()), p.saturating_add(agg.put_oi()))
            });
        (calls > 0).then(|| puts as f64 / calls as f64)
    }

    /// Whether no strike survived aggregation
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

/// Strike/expiration aggregator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    /// Expiration window
    pub window: ExpirationWindow,
    /// Greek estimation settings
    pub greeks: GreeksConfig,
    /// Exposure calculator
    pub calculator: ExposureCalculator,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Aggregator {
    /// Aggregator from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: ExpirationWindow::from(&config.window),
            greeks: config.greeks,
            calculator: ExposureCalculator::with_multiplier(config.greeks.contract_multiplier),
        }
    }

    /// Replace the expiration window
    #[must_use]
    pub fn with_window(mut self, window: ExpirationWindow) -> Self {
        self.window = window;
        self
    }

    fn leg_data(
        contract: Option<&OptionContract>,
        overrides: Option<&LiveOiOverrides>,
    ) -> Option<LegData> {
        let contract = contract?;
        let open_interest = overrides
            .and_then(|o| o.get(&contract.key()).copied())
            .unwrap_or(contract.open_interest);
        (open_interest > 0).then_some(LegData {
            open_interest,
            snapshot_open_interest: contract.open_interest,
            greeks: contract.greeks,
            implied_volatility: contract.implied_volatility,
        })
    }

    fn leg_input(
        &self,
        leg: &LegData,
        option_type: OptionType,
        strike: f64,
        spot: f64,
        time: f64,
    ) -> LegInput {
        LegInput {
            open_interest: leg.open_interest as f64,
            spot,
            strike,
            time_to_expiry: time,
            option_type,
            delta: leg.greeks.delta,
            gamma: leg.greeks.gamma,
            vega: leg.greeks.vega,
            vanna: effective_vanna(
                leg.greeks.vanna,
                leg.greeks.gamma,
                strike,
                spot,
                time,
                leg.implied_volatility,
                self.greeks.risk_free_rate,
                self.greeks.default_implied_volatility,
            ),
        }
    }

    /// Exposure row for one aggregate
    #[must_use]
    pub fn snapshot(&self, aggregate: &StrikeAggregate, spot: f64, as_of: DateTime<Utc>) -> ExposureSnapshot {
        let time = time_to_expiry(aggregate.expiration, as_of);
        let mut snapshot = ExposureSnapshot::new(Some(aggregate.expiration), aggregate.strike);
        for option_type in [OptionType::Call, OptionType::Put] {
            if let Some(leg) = aggregate.leg(option_type) {
                let input = self.leg_input(leg, option_type, aggregate.strike, spot, time);
                snapshot.add_leg(option_type, &self.calculator.leg(&input));
            }
        }
        snapshot
    }

    /// Run one full aggregation pass
    pub fn aggregate(
        &self,
        chain: &OptionChain,
        spot: f64,
        as_of: DateTime<Utc>,
        overrides: Option<&LiveOiOverrides>,
    ) -> EngineResult<ChainAggregation> {
        let spot = validate_spot(spot)?;
        let today = as_of.date_naive();

        let mut aggregates = BTreeMap::new();
        let mut snapshots = BTreeMap::new();
        let mut skipped_expirations = Vec::new();
        let mut skipped_strikes = 0usize;

        for (&expiration, legs) in &chain.expirations {
            if !self.window.contains(today, expiration) {
                if self.window.within_days(today, expiration) {
                    warn!(%expiration, cap_months = self.window.max_months, "Expiration beyond global cap discarded");
                }
                skipped_expirations.push(expiration);
                continue;
            }

            for key in legs.strike_keys() {
                let call = Self::leg_data(legs.calls.get(&key), overrides);
                let put = Self::leg_data(legs.puts.get(&key), overrides);
                if call.is_none() && put.is_none() {
                    skipped_strikes += 1;
                    continue;
                }

                let aggregate = StrikeAggregate {
                    expiration,
                    strike: strike_from_key(key),
                    call,
                    put,
                };
                snapshots.insert((expiration, key), self.snapshot(&aggregate, spot, as_of));
                aggregates.insert((expiration, key), aggregate);
            }
        }

        debug!(
            ticker = %chain.ticker,
            strikes = aggregates.len(),
            skipped_strikes,
            skipped_expirations = skipped_expirations.len(),
            overrides = overrides.map_or(0, |o| o.len()),
            "Aggregated option chain"
        );

        Ok(ChainAggregation {
            ticker: chain.ticker.clone(),
            spot,
            as_of,
            aggregates,
            snapshots,
            skipped_expirations,
        })
    }
}
