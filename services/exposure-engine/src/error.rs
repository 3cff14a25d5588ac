//! Engine error types
//!
//! Numeric degeneracies (zero time to expiry, zero volatility, an empty chain)
//! never surface here; they resolve to zero contributions or explicit empty
//! results. Only genuinely malformed input is rejected.

use thiserror::Error;

/// Result alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A record could not be interpreted (bad date, strike, side, non-finite field)
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Open interest below zero
    #[error("Negative open interest {value} for {contract}")]
    NegativeOpenInterest {
        /// Contract description
        contract: String,
        /// Offending value
        value: f64,
    },

    /// Trade size below zero
    #[error("Negative trade size {value} for {contract}")]
    NegativeTradeSize {
        /// Contract description
        contract: String,
        /// Offending value
        value: f64,
    },

    /// Spot price must be positive and finite
    #[error("Invalid spot price: {0}")]
    InvalidSpot(f64),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading an input file failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Decoding JSON or CSV input failed
    #[error("Parse error: {0}")]
    Parse(String),

    /// An in-flight pass was cancelled by its caller
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl EngineError {
    /// Whether the error was caused by bad input data rather than setup or control flow
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord(_)
                | Self::NegativeOpenInterest { .. }
                | Self::NegativeTradeSize { .. }
                | Self::InvalidSpot(_)
                | Self::Parse(_)
        )
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Reject spot prices that are zero, negative or non-finite
pub fn validate_spot(spot: f64) -> EngineResult<f64> {
    if spot.is_finite() && spot > 0.0 {
        Ok(spot)
    } else {
        Err(EngineError::InvalidSpot(spot))
    }
}
