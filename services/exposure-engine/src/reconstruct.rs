//! Live open interest reconstruction
//!
//! Replays the full trade tape per contract against the snapshot open
//! interest. Every run starts from the snapshot; results are never carried
//! between runs. Ordering is timestamp ascending with tape arrival order
//! breaking ties, and duplicate prints (same contract, timestamp and size)
//! are dropped before replay.

use crate::aggregator::LiveOiOverrides;
use crate::tape::TradeRecord;
use crate::types::{ContractActivity, ContractKey};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Heuristic opening/closing classification of a print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillStyle {
    /// Size above half the open interest
    #[serde(rename = "AA")]
    AA,
    /// Size above 30% of session volume
    #[serde(rename = "A")]
    A,
    /// Size above 10% of the open interest
    #[serde(rename = "BB")]
    BB,
    /// Everything else
    #[serde(rename = "B")]
    B,
    /// Nothing to classify (zero-size print)
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl FillStyle {
    /// Classify a print against the contract's open interest and volume
    #[must_use]
    pub fn classify(size: u64, open_interest: u64, volume: u64) -> Self {
        if size == 0 {
            return Self::NotApplicable;
        }
        let size = size as f64;
        if size > 0.5 * open_interest as f64 {
            Self::AA
        } else if size > 0.3 * volume as f64 {
            Self::A
        } else if size > 0.1 * open_interest as f64 {
            Self::BB
        } else {
            Self::B
        }
    }

    /// Tape label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AA => "AA",
            Self::A => "A",
            Self::BB => "BB",
            Self::B => "B",
            Self::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for FillStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reconstructed open interest for one contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveOpenInterest {
    /// Contract
    pub key: ContractKey,
    /// Snapshot open interest replay started from
    pub original_oi: u64,
    /// Open interest after replay, clamped at zero
    pub live_oi: u64,
    /// Prints replayed
    pub trades_applied: usize,
    /// Duplicate prints dropped
    pub duplicates_dropped: usize,
    /// Contracts added by prints classified as opening
    pub opened: u64,
    /// Contracts removed by prints classified as closing
    pub closed: u64,
}

impl LiveOpenInterest {
    /// Change against the snapshot
    #[must_use]
    pub fn change(&self) -> i64 {
        let change = i128::from(self.live_oi) - i128::from(self.original_oi);
        change.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

/// Fill style of a print
///
/// Open interest comes from the snapshot when known. Volume is the print's
/// own recent volume; the snapshot's volume is used only when the print
/// carries none.
#[must_use]
pub fn classify_trade(record: &TradeRecord, snapshot: Option<&ContractActivity>) -> FillStyle {
    let open_interest = snapshot.map_or(record.open_interest, |a| a.open_interest);
    let volume = match snapshot {
        Some(activity) if record.volume == 0 => activity.volume,
        _ => record.volume,
    };
    FillStyle::classify(record.trade_size, open_interest, volume)
}

/// Replay one contract's prints, already in replay order and de-duplicated
#[must_use]
pub fn replay(key: ContractKey, reference: ContractActivity, trades: &[&TradeRecord]) -> LiveOpenInterest {
    let original = reference.open_interest;
    let mut live = original as i128;
    let mut opened = 0u64;
    let mut closed = 0u64;

    for trade in trades {
        let size = trade.trade_size;
        match classify_trade(trade, Some(&reference)) {
            FillStyle::AA | FillStyle::A | FillStyle::BB => {
                live += size as i128;
                opened = opened.saturating_add(size);
            }
            FillStyle::B if size > original => {
                live += size as i128;
                opened = opened.saturating_add(size);
            }
            FillStyle::B => {
                live -= size as i128;
                closed = closed.saturating_add(size);
            }
            FillStyle::NotApplicable => {}
        }
    }

    LiveOpenInterest {
        key,
        original_oi: original,
        live_oi: live.clamp(0, u64::MAX as i128) as u64,
        trades_applied: trades.len(),
        duplicates_dropped: 0,
        opened,
        closed,
    }
}

/// Rebuild live open interest for every contract on the tape
///
/// `snapshot` supplies each contract's starting open interest; contracts
/// missing from it fall back to the values carried on their earliest print.
/// Each print is classified against its own recent volume.
#[must_use]
pub fn reconstruct(
    tape: &[TradeRecord],
    snapshot: &FxHashMap<ContractKey, ContractActivity>,
) -> BTreeMap<ContractKey, LiveOpenInterest> {
    let mut by_contract: FxHashMap<&ContractKey, Vec<&TradeRecord>> = FxHashMap::default();
    for record in tape {
        by_contract.entry(&record.key).or_default().push(record);
    }

    let mut results = BTreeMap::new();
    let mut total_duplicates = 0usize;

    for (key, mut trades) in by_contract {
        // stable: equal timestamps keep tape arrival order
        trades.sort_by_key(|t| t.timestamp);

        let mut seen = FxHashSet::default();
        let before = trades.len();
        trades.retain(|t| seen.insert((t.timestamp, t.trade_size)));
        let duplicates = before - trades.len();
        total_duplicates += duplicates;

        let activity = snapshot.get(key).copied().unwrap_or_else(|| ContractActivity {
            open_interest: trades.first().map_or(0, |t| t.open_interest),
            volume: trades.first().map_or(0, |t| t.volume),
        });

        let mut live = replay(key.clone(), activity, &trades);
        live.duplicates_dropped = duplicates;
        results.insert(key.clone(), live);
    }

    if total_duplicates > 0 {
        warn!(duplicates = total_duplicates, "Dropped duplicate prints from trade tape");
    }
    debug!(
        records = tape.len(),
        contracts = results.len(),
        "Reconstructed live open interest"
    );
    results
}

/// Overrides for the aggregator from a reconstruction
#[must_use]
pub fn live_oi_overrides(live: &BTreeMap<ContractKey, LiveOpenInterest>) -> LiveOiOverrides {
    live.iter().map(|(k, v)| (k.clone(), v.live_oi)).collect()
}
