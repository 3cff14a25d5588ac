//! Core option chain types

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fixed-point scale for strike keys (4 decimal places)
pub const STRIKE_SCALE: f64 = 10_000.0;

/// Convert a strike to its fixed-point map key
#[must_use]
pub fn strike_key(strike: f64) -> u64 {
    (strike * STRIKE_SCALE).round() as u64
}

/// Recover the strike price from a fixed-point key
#[must_use]
pub fn strike_from_key(key: u64) -> f64 {
    key as f64 / STRIKE_SCALE
}

/// Option type for derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Call option - right to buy the underlying at strike price
    Call,
    /// Put option - right to sell the underlying at strike price
    Put,
}

impl OptionType {
    /// Parse `call`/`put`/`c`/`p` in any case
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "call" | "c" | "ce" => Some(Self::Call),
            "put" | "p" | "pe" => Some(Self::Put),
            _ => None,
        }
    }

    /// Single-letter code used in contract descriptions
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

/// Greeks as delivered by the upstream chain
///
/// Absent values are carried as 0; vanna is the only Greek the engine can
/// estimate itself, so it stays optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Rate of change of option price with respect to underlying price
    pub delta: f64,
    /// Rate of change of delta with respect to underlying price
    pub gamma: f64,
    /// Time decay
    pub theta: f64,
    /// Sensitivity to volatility changes
    pub vega: f64,
    /// Sensitivity of delta to volatility changes
    pub vanna: Option<f64>,
}

impl Greeks {
    /// Replace non-finite values with their absent defaults
    #[must_use]
    pub fn sanitized(self) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            delta: finite_or_zero(self.delta),
            gamma: finite_or_zero(self.gamma),
            theta: finite_or_zero(self.theta),
            vega: finite_or_zero(self.vega),
            vanna: self.vanna.filter(|v| v.is_finite()),
        }
    }
}

/// Identity of a single listed contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey {
    /// Underlying ticker
    pub ticker: String,
    /// Expiration date
    pub expiration: NaiveDate,
    /// Fixed-point strike (see [`strike_key`])
    pub strike: u64,
    /// Call or put
    pub option_type: OptionType,
}

impl ContractKey {
    /// Build a key from a decimal strike
    pub fn new(
        ticker: impl Into<String>,
        expiration: NaiveDate,
        strike: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            expiration,
            strike: strike_key(strike),
            option_type,
        }
    }

    /// Strike as a decimal price
    #[must_use]
    pub fn strike_price(&self) -> f64 {
        strike_from_key(self.strike)
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.ticker,
            self.expiration,
            self.strike_price(),
            self.option_type.code()
        )
    }
}

/// Option contract as sourced from the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying ticker
    pub ticker: String,
    /// Expiration date
    pub expiration: NaiveDate,
    /// Strike price
    pub strike: f64,
    /// Call or put
    pub option_type: OptionType,
    /// Snapshot open interest
    pub open_interest: u64,
    /// Session volume
    pub volume: u64,
    /// Upstream Greeks
    pub greeks: Greeks,
    /// Upstream implied volatility, if any
    pub implied_volatility: Option<f64>,
}

impl OptionContract {
    /// Key identifying this contract
    #[must_use]
    pub fn key(&self) -> ContractKey {
        ContractKey::new(self.ticker.clone(), self.expiration, self.strike, self.option_type)
    }
}

/// Snapshot open interest and volume, the reference point for tape replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractActivity {
    /// Snapshot open interest
    pub open_interest: u64,
    /// Session volume
    pub volume: u64,
}

/// Calls and puts for one expiration, keyed by fixed-point strike
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpirationChain {
    /// Call legs by strike
    pub calls: BTreeMap<u64, OptionContract>,
    /// Put legs by strike
    pub puts: BTreeMap<u64, OptionContract>,
}

impl ExpirationChain {
    /// Sorted union of call and put strike keys
    #[must_use]
    pub fn strike_keys(&self) -> Vec<u64> {
        let mut keys: Vec<u64> = self.calls.keys().chain(self.puts.keys()).copied().collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

/// Full option chain for one underlying
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionChain {
    /// Underlying ticker
    pub ticker: String,
    /// Expirations in date order
    pub expirations: BTreeMap<NaiveDate, ExpirationChain>,
}

impl OptionChain {
    /// Create an empty chain
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            expirations: BTreeMap::new(),
        }
    }

    /// Insert or replace a contract
    pub fn insert(&mut self, contract: OptionContract) {
        let key = strike_key(contract.strike);
        let expiration = self.expirations.entry(contract.expiration).or_default();
        match contract.option_type {
            OptionType::Call => expiration.calls.insert(key, contract),
            OptionType::Put => expiration.puts.insert(key, contract),
        };
    }

    /// Iterate every contract in expiration, strike, side order
    pub fn contracts(&self) -> impl Iterator<Item = &OptionContract> {
        self.expirations
            .values()
            .flat_map(|exp| exp.calls.values().chain(exp.puts.values()))
    }

    /// Number of contracts
    #[must_use]
    pub fn len(&self) -> usize {
        self.expirations
            .values()
            .map(|exp| exp.calls.len() + exp.puts.len())
            .sum()
    }

    /// Whether the chain has no contracts
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a single contract
    #[must_use]
    pub fn get(&self, key: &ContractKey) -> Option<&OptionContract> {
        let expiration = self.expirations.get(&key.expiration)?;
        match key.option_type {
            OptionType::Call => expiration.calls.get(&key.strike),
            OptionType::Put => expiration.puts.get(&key.strike),
        }
    }

    /// Snapshot open interest and volume per contract
    #[must_use]
    pub fn activity(&self) -> FxHashMap<ContractKey, ContractActivity> {
        self.contracts()
            .map(|c| {
                (
                    c.key(),
                    ContractActivity {
                        open_interest: c.open_interest,
                        volume: c.volume,
                    },
                )
            })
            .collect()
    }

    /// Content hash over every contract, used as a cache key
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.ticker.hash(&mut hasher);
        for c in self.contracts() {
            c.expiration.hash(&mut hasher);
            strike_key(c.strike).hash(&mut hasher);
            c.option_type.hash(&mut hasher);
            c.open_interest.hash(&mut hasher);
            c.volume.hash(&mut hasher);
            c.greeks.delta.to_bits().hash(&mut hasher);
            c.greeks.gamma.to_bits().hash(&mut hasher);
            c.greeks.theta.to_bits().hash(&mut hasher);
            c.greeks.vega.to_bits().hash(&mut hasher);
            c.greeks.vanna.map(f64::to_bits).hash(&mut hasher);
            c.implied_volatility.map(f64::to_bits).hash(&mut hasher);
        }
        hasher.finish()
    }
}
