//! End-to-end scenarios from wire-format inputs

use approx::assert_relative_eq;
use assert_matches::assert_matches;
use chrono::{DateTime, Utc};
use exposure_engine::types::strike_key;
use exposure_engine::{
    parse_chain_json, rank_by_pin_distance, rank_by_stability, read_chain_file, read_tape_file,
    EngineError, ExposureEngine, FillStyle, ScreenerRow,
};
use rstest::*;
use std::sync::atomic::AtomicBool;
use test_utils::*;

const CHAIN_JSON: &str = r#"{
    "2026-11-20": {
        "calls": {
            "100": {"open_interest": 1000,
                    "greeks": {"delta": 0.5, "gamma": 0.05, "theta": -0.04, "vega": 0.12},
                    "implied_volatility": 0.25},
            "105": {"open_interest": 400, "greeks": {"gamma": 0.03}}
        },
        "puts": {
            "95": {"open_interest": 800, "greeks": {"delta": -0.3, "gamma": 0.03, "vega": 0.1}},
            "100.5": {"open_interest": 0}
        }
    },
    "2027-06-18": {
        "calls": {"100": {"open_interest": 9000}}
    }
}"#;

const TAPE_CSV: &str = "\
ticker,strike,type,expiry,trade_size,premium_per_contract,total_premium,trade_timestamp,volume,open_interest
SPY,100,call,2026-11-20,600,2.10,126000,2026-10-19T13:00:00Z,50,1000
SPY,100,call,2026-11-20,600,2.10,126000,2026-10-19T13:00:00Z,50,1000
SPY,95,PUT,2026-11-20,20,1.05,2100,1792418400000,500,800
";

#[rstest]
fn test_chain_json_pipeline(as_of: DateTime<Utc>, monthly_expiration: chrono::NaiveDate) {
    init_test_logging();
    let chain = parse_chain_json(TICKER, CHAIN_JSON).unwrap();
    assert_eq!(chain.len(), 5);

    let engine = ExposureEngine::default();
    let analysis = engine.analyze(&chain, SPOT, as_of, None).unwrap();

    // the zero-OI put and the out-of-window expiration contribute nothing
    assert_eq!(analysis.aggregation.aggregates.len(), 3);
    assert_eq!(analysis.aggregation.skipped_expirations.len(), 1);

    let call = &analysis.aggregation.snapshots[&(monthly_expiration, strike_key(100.0))];
    assert_relative_eq!(call.gex.call, 50_000_000.0, max_relative = 1e-12);
    assert_relative_eq!(call.dex.call, 5_000_000.0, max_relative = 1e-12);

    let pin = &analysis.max_pain[&monthly_expiration];
    assert_on_significant_strike(pin);
    assert!(analysis.stability.value().is_finite());
}

#[rstest]
fn test_malformed_chain_rejected() {
    let negative = r#"{"2026-11-20": {"calls": {"100": {"open_interest": -5}}}}"#;
    assert_matches!(
        parse_chain_json(TICKER, negative),
        Err(EngineError::NegativeOpenInterest { value, .. }) if value == -5.0
    );

    let bad_date = r#"{"20-11-2026": {"calls": {}}}"#;
    assert_matches!(parse_chain_json(TICKER, bad_date), Err(EngineError::MalformedRecord(_)));

    let bad_strike = r#"{"2026-11-20": {"puts": {"abc": {"open_interest": 5}}}}"#;
    assert_matches!(parse_chain_json(TICKER, bad_strike), Err(EngineError::MalformedRecord(_)));

    assert_matches!(parse_chain_json(TICKER, "not json"), Err(EngineError::Parse(_)));
}

#[rstest]
#[tokio::test]
async fn test_files_to_live_refresh(as_of: DateTime<Utc>, monthly_expiration: chrono::NaiveDate) {
    let chain_file = temp_file(CHAIN_JSON, "json").unwrap();
    let tape_file = temp_file(TAPE_CSV, "csv").unwrap();

    let chain = read_chain_file(TICKER, chain_file.path()).unwrap();
    let tape = read_tape_file(tape_file.path()).unwrap();
    assert_eq!(tape.len(), 3);
    assert_eq!(
        exposure_engine::reconstruct::classify_trade(&tape[0], None),
        FillStyle::AA
    );

    let engine = ExposureEngine::default();
    let cancel = AtomicBool::new(false);
    let refresh = engine
        .refresh_with_tape(&chain, SPOT, as_of, tokio_stream::iter(tape), &cancel)
        .await
        .unwrap();

    // duplicate print dropped: one AA of 600 on the call, one B of 20 on the put
    // (chain carries no volume, so each print is judged against its own)
    let live: Vec<(f64, u64)> = refresh
        .live
        .values()
        .map(|l| (l.key.strike_price(), l.live_oi))
        .collect();
    assert_eq!(live, vec![(95.0, 780), (100.0, 1600)]);

    let call = refresh.analysis.aggregation.aggregates[&(monthly_expiration, strike_key(100.0))]
        .call
        .unwrap();
    assert_eq!(call.open_interest, 1600);

    let report = serde_json::to_value(refresh.analysis.report(Some(&refresh.live))).unwrap();
    assert_eq!(report["live_open_interest"].as_array().unwrap().len(), 2);
}

#[rstest]
#[tokio::test]
async fn test_chain_without_volume_uses_print_volume(as_of: DateTime<Utc>) {
    let chain = parse_chain_json(
        TICKER,
        r#"{"2026-11-20": {"calls": {"100": {"open_interest": 1000, "greeks": {"gamma": 0.05}}}}}"#,
    )
    .unwrap();
    let tape = exposure_engine::parse_json_tape(
        r#"[{"ticker": "SPY", "strike": 100, "type": "call", "expiry": "2026-11-20",
             "trade_size": 20, "trade_timestamp": "2026-10-19T13:00:00Z",
             "volume": 1000, "open_interest": 1000}]"#,
    )
    .unwrap();

    // small against both OI and recent volume: a closing print
    let live = ExposureEngine::default().reconstruct(&tape, &chain);
    let result = live.values().next().unwrap();
    assert_eq!(result.live_oi, 980);
    assert_eq!(result.closed, 20);

    let cancel = AtomicBool::new(false);
    let refresh = ExposureEngine::default()
        .refresh_with_tape(&chain, SPOT, as_of, tokio_stream::iter(tape), &cancel)
        .await
        .unwrap();
    assert_eq!(refresh.analysis.aggregation.aggregates.values().next().unwrap().call_oi(), 980);
}

#[rstest]
fn test_screener_across_symbols(as_of: DateTime<Utc>) {
    let engine = ExposureEngine::default();
    let mut rows = Vec::new();
    for (ticker, spot) in [("AAA", 100.0), ("BBB", 250.0), ("CCC", 40.0)] {
        let chain = ChainFactory::new(ticker, spot, as_of)
            .with_strikes(8, spot / 50.0)
            .build();
        let analysis = engine.analyze(&chain, spot, as_of, None).unwrap();
        rows.push(ScreenerRow::from_analysis(&analysis));
    }

    let by_pin = rank_by_pin_distance(rows.clone());
    let distances: Vec<f64> = by_pin.iter().map(|r| r.distance_pct.abs()).collect();
    assert_sorted(&distances);

    let by_stability = rank_by_stability(rows);
    for pair in by_stability.windows(2) {
        assert!(pair[0].stability_index >= pair[1].stability_index);
    }
}
