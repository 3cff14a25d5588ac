//! Memoising analysis engine
//!
//! Wraps the pure aggregation, stability and max pain passes behind a bounded
//! cache keyed by everything that can change a result: chain contents, spot,
//! window, evaluation instant and live open interest overrides. A cache hit
//! returns the same `Arc`; a miss always recomputes from scratch.

use crate::aggregator::{Aggregator, ChainAggregation, ExposureTotals, LiveOiOverrides};
use crate::config::EngineConfig;
use crate::error::{validate_spot, EngineError, EngineResult};
use crate::exposure::ExposureSnapshot;
use crate::max_pain::{MaxPainCalculator, MaxPainResult};
use crate::reconstruct::{live_oi_overrides, reconstruct, LiveOpenInterest};
use crate::stability::{StabilityIndex, StabilityReading};
use crate::tape::TradeRecord;
use crate::types::{ContractActivity, ContractKey, OptionChain};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHasher};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// Everything a cached analysis depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    chain: u64,
    spot_bits: u64,
    max_days: i64,
    max_months: u32,
    as_of: DateTime<Utc>,
    overrides: u64,
}

/// Order-independent hash of live open interest overrides
#[must_use]
pub fn overrides_fingerprint(overrides: Option<&LiveOiOverrides>) -> u64 {
    let Some(overrides) = overrides.filter(|o| !o.is_empty()) else {
        return 0;
    };
    let mut entries: Vec<(&ContractKey, &u64)> = overrides.iter().collect();
    entries.sort_unstable();
    let mut hasher = FxHasher::default();
    entries.hash(&mut hasher);
    // keep non-empty overrides away from the "no overrides" key
    hasher.finish() | 1
}

/// Full result of one analysis pass over a chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainAnalysis {
    /// Per-(expiration, strike) aggregates and snapshots
    pub aggregation: ChainAggregation,
    /// Snapshots summed across expirations, by fixed-point strike
    pub merged: BTreeMap<u64, ExposureSnapshot>,
    /// Totals over the window
    pub totals: ExposureTotals,
    /// Stability index over the window
    pub stability: StabilityIndex,
    /// Max pain per expiration
    pub max_pain: BTreeMap<NaiveDate, MaxPainResult>,
}

impl ChainAnalysis {
    /// Underlying ticker
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.aggregation.ticker
    }

    /// Spot used for the pass
    #[must_use]
    pub fn spot(&self) -> f64 {
        self.aggregation.spot
    }

    /// Evaluation instant
    #[must_use]
    pub fn as_of(&self) -> DateTime<Utc> {
        self.aggregation.as_of
    }

    /// Max pain of the nearest expiration in the window
    #[must_use]
    pub fn nearest_max_pain(&self) -> Option<&MaxPainResult> {
        self.max_pain.values().next()
    }

    /// Serializable summary, optionally with the live open interest it used
    #[must_use]
    pub fn report(&self, live: Option<&BTreeMap<ContractKey, LiveOpenInterest>>) -> AnalysisReport {
        AnalysisReport {
            ticker: self.ticker().to_string(),
            spot: self.spot(),
            as_of: self.as_of(),
            stability: self.stability.reading(),
            totals: self.totals,
            gamma_wall: self.aggregation.gamma_wall(),
            put_call_ratio: self.aggregation.put_call_ratio(),
            max_pain: self
                .max_pain
                .iter()
                .map(|(date, result)| MaxPainSummary {
                    expiration: *date,
                    strike: result.strike,
                    min_risk: result.min_risk,
                    distance_pct: result.distance_pct(self.spot()),
                    significant_strikes: result.significant_strikes.len(),
                })
                .collect(),
            snapshots: self.merged.values().cloned().collect(),
            live_open_interest: live.map(|l| l.values().cloned().collect()).unwrap_or_default(),
            skipped_expirations: self.aggregation.skipped_expirations.clone(),
        }
    }
}

/// Max pain row in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxPainSummary {
    /// Expiration
    pub expiration: NaiveDate,
    /// Max pain strike
    pub strike: f64,
    /// Risk at the optimal test price
    pub min_risk: f64,
    /// Distance from spot in percent
    pub distance_pct: f64,
    /// Strikes that passed the open interest threshold
    pub significant_strikes: usize,
}

/// JSON-ready view of an analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub spot: f64,
    pub as_of: DateTime<Utc>,
    pub stability: StabilityReading,
    pub totals: ExposureTotals,
    pub gamma_wall: Option<f64>,
    pub put_call_ratio: Option<f64>,
    pub max_pain: Vec<MaxPainSummary>,
    pub snapshots: Vec<ExposureSnapshot>,
    pub live_open_interest: Vec<LiveOpenInterest>,
    pub skipped_expirations: Vec<NaiveDate>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that recomputed
    pub misses: u64,
    /// Analyses currently cached
    pub entries: usize,
}

/// Analysis re-run with reconstructed open interest
#[derive(Debug, Clone)]
pub struct LiveRefresh {
    /// Analysis using the live open interest overrides
    pub analysis: Arc<ChainAnalysis>,
    /// Reconstruction the overrides came from
    pub live: BTreeMap<ContractKey, LiveOpenInterest>,
}

/// Orchestrates aggregation, stability, max pain and tape replay
pub struct ExposureEngine {
    config: EngineConfig,
    aggregator: Aggregator,
    max_pain: MaxPainCalculator,
    cache: DashMap<CacheKey, Arc<ChainAnalysis>>,
    insertion_order: Mutex<VecDeque<CacheKey>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ExposureEngine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl ExposureEngine {
    /// Engine with validated configuration
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            aggregator: Aggregator::new(&config),
            max_pain: MaxPainCalculator::new(&config),
            cache: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyse a chain without touching the cache
    pub fn compute(
        &self,
        chain: &OptionChain,
        spot: f64,
        as_of: DateTime<Utc>,
        overrides: Option<&LiveOiOverrides>,
    ) -> EngineResult<ChainAnalysis> {
        let aggregation = self.aggregator.aggregate(chain, spot, as_of, overrides)?;
        let merged = aggregation.merged_by_strike();
        let totals = aggregation.totals();
        let stability = StabilityIndex::from_snapshots(aggregation.snapshots.values());
        let max_pain = self.max_pain.by_expiration(&aggregation);

        info!(
            ticker = %aggregation.ticker,
            spot = aggregation.spot,
            strikes = aggregation.aggregates.len(),
            expirations = max_pain.len(),
            stability_index = stability.value(),
            regime = %stability.regime(),
            "Chain analysis complete"
        );

        Ok(ChainAnalysis {
            aggregation,
            merged,
            totals,
            stability,
            max_pain,
        })
    }

    /// Analyse a chain, reusing a cached result for identical inputs
    pub fn analyze(
        &self,
        chain: &OptionChain,
        spot: f64,
        as_of: DateTime<Utc>,
        overrides: Option<&LiveOiOverrides>,
    ) -> EngineResult<Arc<ChainAnalysis>> {
        let spot = validate_spot(spot)?;
        let key = CacheKey {
            chain: chain.fingerprint(),
            spot_bits: spot.to_bits(),
            max_days: self.aggregator.window.max_days,
            max_months: self.aggregator.window.max_months,
            as_of,
            overrides: overrides_fingerprint(overrides),
        };

        if let Some(cached) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(ticker = %chain.ticker, "Analysis cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let analysis = Arc::new(self.compute(chain, spot, as_of, overrides)?);
        self.remember(key, Arc::clone(&analysis));
        Ok(analysis)
    }

    fn remember(&self, key: CacheKey, analysis: Arc<ChainAnalysis>) {
        let capacity = self.config.cache.capacity;
        if capacity == 0 {
            return;
        }
        let mut order = self.insertion_order.lock();
        if self.cache.insert(key, analysis).is_none() {
            order.push_back(key);
        }
        while order.len() > capacity {
            if let Some(oldest) = order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
    }

    /// Drop every cached analysis
    pub fn clear_cache(&self) {
        let mut order = self.insertion_order.lock();
        order.clear();
        self.cache.clear();
        debug!("Analysis cache cleared");
    }

    /// Cache counters
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    /// Replay a complete tape against a chain's snapshot open interest
    #[must_use]
    pub fn reconstruct(
        &self,
        tape: &[TradeRecord],
        chain: &OptionChain,
    ) -> BTreeMap<ContractKey, LiveOpenInterest> {
        reconstruct(tape, &chain.activity())
    }

    /// Drain a trade stream in batches, then replay it in full
    ///
    /// Yields to the runtime after every `tape.batch_size` records. Setting
    /// `cancel` stops consumption with [`EngineError::Cancelled`]; no partial
    /// reconstruction is returned.
    pub async fn reconstruct_stream<S>(
        &self,
        stream: S,
        snapshot: &FxHashMap<ContractKey, ContractActivity>,
        cancel: &AtomicBool,
    ) -> EngineResult<BTreeMap<ContractKey, LiveOpenInterest>>
    where
        S: Stream<Item = TradeRecord>,
    {
        let batch_size = self.config.tape.batch_size.max(1);
        let mut stream = std::pin::pin!(stream);
        let mut tape = Vec::new();
        let mut batches = 0usize;

        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(EngineError::Cancelled(format!(
                    "tape consumption stopped after {} records",
                    tape.len()
                )));
            }
            let Some(record) = stream.next().await else {
                break;
            };
            tape.push(record);
            if tape.len() % batch_size == 0 {
                batches += 1;
                tokio::task::yield_now().await;
            }
        }

        debug!(records = tape.len(), batches, "Trade stream drained");
        Ok(reconstruct(&tape, snapshot))
    }

    /// Reconstruct live open interest from a stream and re-run the analysis
    pub async fn refresh_with_tape<S>(
        &self,
        chain: &OptionChain,
        spot: f64,
        as_of: DateTime<Utc>,
        stream: S,
        cancel: &AtomicBool,
    ) -> EngineResult<LiveRefresh>
    where
        S: Stream<Item = TradeRecord>,
    {
        let live = self.reconstruct_stream(stream, &chain.activity(), cancel).await?;
        let overrides = live_oi_overrides(&live);
        let analysis = self.analyze(chain, spot, as_of, Some(&overrides))?;
        info!(
            ticker = %chain.ticker,
            contracts = live.len(),
            "Refreshed analysis with live open interest"
        );
        Ok(LiveRefresh { analysis, live })
    }
}
