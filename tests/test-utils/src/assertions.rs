//! Custom assertions for exposure tests

use exposure_engine::{ExposureSnapshot, MaxPainResult, SidePair};
use std::fmt::Debug;

/// Assert that two floating point values are equal within a relative tolerance
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    let scale = left.abs().max(right.abs()).max(1.0);
    let diff = (left - right).abs();
    assert!(
        diff <= tolerance * scale,
        "Values not approximately equal: {} != {} (diff: {}, tolerance: {})",
        left,
        right,
        diff,
        tolerance
    );
}

/// Assert that a collection is sorted
pub fn assert_sorted<T: PartialOrd + Debug>(collection: &[T]) {
    for window in collection.windows(2) {
        assert!(
            window[0] <= window[1],
            "Collection not sorted at elements: {:?} > {:?}",
            window[0],
            window[1]
        );
    }
}

fn assert_pair_consistent(name: &str, strike: f64, pair: &SidePair) {
    assert_eq!(
        pair.net(),
        pair.call + pair.put,
        "{name} net differs from call + put at strike {strike}"
    );
}

/// Assert `net == call + put` for every exposure in a snapshot
pub fn assert_net_consistent(snapshot: &ExposureSnapshot) {
    assert_pair_consistent("GEX", snapshot.strike, &snapshot.gex);
    assert_pair_consistent("DEX", snapshot.strike, &snapshot.dex);
    assert_pair_consistent("VEX", snapshot.strike, &snapshot.vex);
    assert_pair_consistent("Dealer", snapshot.strike, &snapshot.dealer);
}

/// Assert every exposure in a snapshot is finite
pub fn assert_finite(snapshot: &ExposureSnapshot) {
    for (name, pair) in [
        ("GEX", snapshot.gex),
        ("DEX", snapshot.dex),
        ("VEX", snapshot.vex),
        ("Dealer", snapshot.dealer),
    ] {
        assert!(
            pair.call.is_finite() && pair.put.is_finite(),
            "{name} not finite at strike {}: {:?}",
            snapshot.strike,
            pair
        );
    }
}

/// Assert the max pain strike is one of the significant strikes
pub fn assert_on_significant_strike(result: &MaxPainResult) {
    assert!(
        result.significant_strikes.contains(&result.strike),
        "Max pain strike {} not in significant set {:?}",
        result.strike,
        result.significant_strikes
    );
}
