//! Options exposure and dealer-positioning analytics
//!
//! Converts an option chain's open interest and Greeks into:
//! - Gamma, delta, vega and dealer exposure surfaces per strike/expiration
//! - A stability index with its market regime
//! - Per-expiration max pain from a market-maker risk grid search
//! - Live open interest rebuilt from a trade tape
//!
//! Every pass is a pure fold over immutable inputs. [`ExposureEngine`] adds a
//! bounded memo cache and batched, cancellable tape consumption on top.

pub mod aggregator;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod exposure;
pub mod greeks;
pub mod max_pain;
pub mod reconstruct;
pub mod screener;
pub mod stability;
pub mod tape;
pub mod types;

pub use aggregator::{
    time_to_expiry, Aggregator, ChainAggregation, ExpirationWindow, ExposureTotals, LegData,
    LiveOiOverrides, StrikeAggregate,
};
pub use chain::{parse_chain_json, read_chain_file};
pub use config::EngineConfig;
pub use engine::{AnalysisReport, CacheStats, ChainAnalysis, ExposureEngine, LiveRefresh};
pub use error::{EngineError, EngineResult};
pub use exposure::{DeltaConvention, ExposureCalculator, ExposureSnapshot, SidePair};
pub use greeks::{moneyness_delta, vanna};
pub use max_pain::{max_pain, max_pain_by_expiration, MaxPainCalculator, MaxPainResult};
pub use reconstruct::{live_oi_overrides, reconstruct, FillStyle, LiveOpenInterest};
pub use screener::{rank_by_pin_distance, rank_by_stability, ScreenerRow};
pub use stability::{stability_ratio, Regime, StabilityIndex};
pub use tape::{parse_csv_tape, parse_json_tape, read_tape_file, TradeRecord};
pub use types::{ContractKey, Greeks, OptionChain, OptionContract, OptionType};
