//! Option chain wire model and validation
//!
//! The data layer hands over a JSON object keyed by ISO expiration date, each
//! holding `calls` and `puts` keyed by strike. Every numeric field is optional;
//! missing values become zero. Negative open interest is the one shape error
//! that is rejected outright.

use crate::error::{EngineError, EngineResult};
use crate::types::{Greeks, OptionChain, OptionContract, OptionType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Greeks exactly as delivered upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGreeks {
    /// Delta
    #[serde(default)]
    pub delta: Option<f64>,
    /// Gamma
    #[serde(default)]
    pub gamma: Option<f64>,
    /// Theta
    #[serde(default)]
    pub theta: Option<f64>,
    /// Vega
    #[serde(default)]
    pub vega: Option<f64>,
    /// Vanna, rarely supplied
    #[serde(default)]
    pub vanna: Option<f64>,
}

/// One call or put leg at a strike
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLeg {
    /// Open interest in contracts
    #[serde(default)]
    pub open_interest: Option<f64>,
    /// Session volume in contracts
    #[serde(default)]
    pub volume: Option<f64>,
    /// Greeks block
    #[serde(default)]
    pub greeks: Option<RawGreeks>,
    /// Implied volatility as a decimal
    #[serde(default)]
    pub implied_volatility: Option<f64>,
}

/// Calls and puts for one expiration, keyed by strike text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExpiration {
    /// Call legs
    #[serde(default)]
    pub calls: BTreeMap<String, RawLeg>,
    /// Put legs
    #[serde(default)]
    pub puts: BTreeMap<String, RawLeg>,
}

/// Whole chain keyed by `YYYY-MM-DD`
pub type RawChain = BTreeMap<String, RawExpiration>;

/// Parse an ISO `YYYY-MM-DD` date
pub fn parse_expiration(raw: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::MalformedRecord(format!("expiration '{raw}': {e}")))
}

/// Parse a strike given as text
pub fn parse_strike(raw: &str) -> EngineResult<f64> {
    let strike: f64 = raw
        .trim()
        .parse()
        .map_err(|e| EngineError::MalformedRecord(format!("strike '{raw}': {e}")))?;
    if strike.is_finite() && strike > 0.0 {
        Ok(strike)
    } else {
        Err(EngineError::MalformedRecord(format!("strike '{raw}' must be positive")))
    }
}

/// Exclusive upper bound of a contract count (2^64)
const COUNT_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// A whole, non-negative contract count that fits in `u64`
#[must_use]
pub fn whole_count(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < COUNT_LIMIT).then_some(v as u64)
}

fn open_interest(raw: Option<f64>, contract: impl FnOnce() -> String) -> EngineResult<u64> {
    match raw {
        None => Ok(0),
        Some(v) if v < 0.0 => Err(EngineError::NegativeOpenInterest {
            contract: contract(),
            value: v,
        }),
        Some(v) => whole_count(v).ok_or_else(|| {
            EngineError::MalformedRecord(format!("open interest {v} for {}", contract()))
        }),
    }
}

fn volume(raw: Option<f64>, contract: impl FnOnce() -> String) -> EngineResult<u64> {
    match raw {
        None => Ok(0),
        Some(v) => whole_count(v)
            .ok_or_else(|| EngineError::MalformedRecord(format!("volume {v} for {}", contract()))),
    }
}

fn leg_to_contract(
    ticker: &str,
    expiration: NaiveDate,
    strike_text: &str,
    option_type: OptionType,
    leg: &RawLeg,
) -> EngineResult<OptionContract> {
    let strike = parse_strike(strike_text)?;
    let describe = || format!("{ticker} {expiration} {strike} {}", option_type.code());
    let raw_greeks = leg.greeks.clone().unwrap_or_default();

    Ok(OptionContract {
        ticker: ticker.to_string(),
        expiration,
        strike,
        option_type,
        open_interest: open_interest(leg.open_interest, describe)?,
        volume: volume(leg.volume, describe)?,
        greeks: Greeks {
            delta: raw_greeks.delta.unwrap_or(0.0),
            gamma: raw_greeks.gamma.unwrap_or(0.0),
            theta: raw_greeks.theta.unwrap_or(0.0),
            vega: raw_greeks.vega.unwrap_or(0.0),
            vanna: raw_greeks.vanna,
        }
        .sanitized(),
        implied_volatility: leg.implied_volatility.filter(|iv| iv.is_finite() && *iv > 0.0),
    })
}

/// Validate a decoded wire chain into an [`OptionChain`]
pub fn chain_from_raw(ticker: &str, raw: &RawChain) -> EngineResult<OptionChain> {
    let mut chain = OptionChain::new(ticker);

    for (date_text, expiration) in raw {
        let date = parse_expiration(date_text)?;
        for (strike, leg) in &expiration.calls {
            chain.insert(leg_to_contract(ticker, date, strike, OptionType::Call, leg)?);
        }
        for (strike, leg) in &expiration.puts {
            chain.insert(leg_to_contract(ticker, date, strike, OptionType::Put, leg)?);
        }
    }

    debug!(
        ticker,
        expirations = chain.expirations.len(),
        contracts = chain.len(),
        "Decoded option chain"
    );
    Ok(chain)
}

/// Decode and validate a chain from JSON text
pub fn parse_chain_json(ticker: &str, json: &str) -> EngineResult<OptionChain> {
    let raw: RawChain = serde_json::from_str(json)?;
    chain_from_raw(ticker, &raw)
}

/// Read and validate a chain from a JSON file
pub fn read_chain_file(ticker: &str, path: impl AsRef<Path>) -> EngineResult<OptionChain> {
    let text = std::fs::read_to_string(path)?;
    parse_chain_json(ticker, &text)
}
