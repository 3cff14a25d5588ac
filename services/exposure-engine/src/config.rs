//! Engine configuration

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Expiration window applied by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Latest expiration kept, in calendar days from the evaluation date
    pub max_days_to_expiry: i64,
    /// Global cap in calendar months, applied regardless of other filters
    pub max_expiration_months: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_days_to_expiry: 45,
            max_expiration_months: 3,
        }
    }
}

/// Greek estimation and contract sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreeksConfig {
    /// Annualised risk-free rate used by the vanna estimate
    pub risk_free_rate: f64,
    /// Implied volatility assumed when the chain carries none
    pub default_implied_volatility: f64,
    /// Shares per contract
    pub contract_multiplier: f64,
}

impl Default for GreeksConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0408,
            default_implied_volatility: 0.30,
            contract_multiplier: 100.0,
        }
    }
}

/// Max pain grid search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPainConfig {
    /// Minimum combined call+put open interest for a strike to count
    pub min_significant_oi: u64,
    /// Number of equally spaced test prices
    pub sample_count: usize,
    /// Padding added either side of the significant strike span, as a fraction of the span
    pub range_padding: f64,
    /// Test prices stay within spot * (1 ± spot_band)
    pub spot_band: f64,
}

impl Default for MaxPainConfig {
    fn default() -> Self {
        Self {
            min_significant_oi: 100,
            sample_count: 100,
            range_padding: 0.05,
            spot_band: 0.30,
        }
    }
}

/// Trade tape consumption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapeConfig {
    /// Records drained from a stream before yielding to the runtime
    pub batch_size: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// Memoisation of full chain analyses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of analyses retained; 0 disables caching
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Expiration window
    pub window: WindowConfig,
    /// Greek estimation
    pub greeks: GreeksConfig,
    /// Max pain search
    pub max_pain: MaxPainConfig,
    /// Tape consumption
    pub tape: TapeConfig,
    /// Analysis cache
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Load configuration from file, with `EXPOSURE__SECTION__KEY` environment overrides
    pub fn from_file(path: &str) -> EngineResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("EXPOSURE").separator("__"))
            .build()?;

        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check every section for values the engine cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        if self.window.max_days_to_expiry < 0 {
            return Err(EngineError::Configuration(format!(
                "window.max_days_to_expiry must be >= 0, got {}",
                self.window.max_days_to_expiry
            )));
        }
        if self.window.max_expiration_months == 0 {
            return Err(EngineError::Configuration(
                "window.max_expiration_months must be > 0".to_string(),
            ));
        }
        if !self.greeks.risk_free_rate.is_finite() || self.greeks.risk_free_rate < 0.0 {
            return Err(EngineError::Configuration(format!(
                "greeks.risk_free_rate must be finite and >= 0, got {}",
                self.greeks.risk_free_rate
            )));
        }
        if !(self.greeks.default_implied_volatility > 0.0) {
            return Err(EngineError::Configuration(format!(
                "greeks.default_implied_volatility must be > 0, got {}",
                self.greeks.default_implied_volatility
            )));
        }
        if !(self.greeks.contract_multiplier > 0.0) {
            return Err(EngineError::Configuration(format!(
                "greeks.contract_multiplier must be > 0, got {}",
                self.greeks.contract_multiplier
            )));
        }
        if self.max_pain.sample_count < 2 {
            return Err(EngineError::Configuration(format!(
                "max_pain.sample_count must be >= 2, got {}",
                self.max_pain.sample_count
            )));
        }
        if !(self.max_pain.range_padding >= 0.0) {
            return Err(EngineError::Configuration(format!(
                "max_pain.range_padding must be >= 0, got {}",
                self.max_pain.range_padding
            )));
        }
        if !(self.max_pain.spot_band > 0.0 && self.max_pain.spot_band < 1.0) {
            return Err(EngineError::Configuration(format!(
                "max_pain.spot_band must lie in (0, 1), got {}",
                self.max_pain.spot_band
            )));
        }
        if self.tape.batch_size == 0 {
            return Err(EngineError::Configuration(
                "tape.batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
