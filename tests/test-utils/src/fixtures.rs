//! Test fixtures for common chains
//!
//! All fixtures evaluate at 2026-10-19 14:30 UTC with spot 100 so expected
//! values can be worked out by hand.

use crate::factories::{contract, greeks};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use exposure_engine::{ExposureEngine, OptionChain, OptionType};
use rstest::*;

pub const TICKER: &str = "SPY";
pub const SPOT: f64 = 100.0;

/// Evaluation instant shared by every fixture
#[fixture]
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap()
}

/// Expiration 11 days out
#[fixture]
pub fn front_expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 30).unwrap()
}

/// Expiration 32 days out, still inside the 45-day window
#[fixture]
pub fn monthly_expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 20).unwrap()
}

/// Expiration five months out, outside every default window
#[fixture]
pub fn far_expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2027, 3, 19).unwrap()
}

/// Single 100-strike call: OI 1000, gamma 0.05, delta 0.5
#[fixture]
pub fn single_call_chain(monthly_expiration: NaiveDate) -> OptionChain {
    let mut chain = OptionChain::new(TICKER);
    chain.insert(contract(
        TICKER,
        monthly_expiration,
        100.0,
        OptionType::Call,
        1000,
        greeks(0.5, 0.05, -0.04, 0.12),
    ));
    chain
}

/// Five strikes on the front expiration, three on the monthly, two outside the window
#[fixture]
pub fn sample_chain(
    front_expiration: NaiveDate,
    monthly_expiration: NaiveDate,
    far_expiration: NaiveDate,
) -> OptionChain {
    let mut chain = OptionChain::new(TICKER);

    let front = [
        // strike, call OI, put OI, call delta, gamma
        (90.0, 200, 600, 0.90, 0.01),
        (95.0, 500, 1200, 0.70, 0.03),
        (100.0, 1500, 1000, 0.50, 0.05),
        (105.0, 900, 300, 0.30, 0.03),
        (110.0, 300, 50, 0.10, 0.01),
    ];
    for (strike, call_oi, put_oi, call_delta, gamma) in front {
        chain.insert(contract(
            TICKER,
            front_expiration,
            strike,
            OptionType::Call,
            call_oi,
            greeks(call_delta, gamma, -0.05, 0.10),
        ));
        chain.insert(contract(
            TICKER,
            front_expiration,
            strike,
            OptionType::Put,
            put_oi,
            greeks(call_delta - 1.0, gamma, -0.05, 0.10),
        ));
    }

    let monthly = [(95.0, 400, 800), (100.0, 1200, 700), (105.0, 600, 0)];
    for (strike, call_oi, put_oi) in monthly {
        chain.insert(contract(
            TICKER,
            monthly_expiration,
            strike,
            OptionType::Call,
            call_oi,
            greeks(0.5, 0.02, -0.02, 0.20),
        ));
        chain.insert(contract(
            TICKER,
            monthly_expiration,
            strike,
            OptionType::Put,
            put_oi,
            greeks(-0.5, 0.02, -0.02, 0.20),
        ));
    }

    for strike in [95.0, 100.0] {
        chain.insert(contract(
            TICKER,
            far_expiration,
            strike,
            OptionType::Call,
            5_000,
            greeks(0.5, 0.01, -0.01, 0.30),
        ));
    }

    chain
}

/// Chain whose strikes all sit below the significance threshold
#[fixture]
pub fn thin_chain(front_expiration: NaiveDate) -> OptionChain {
    let mut chain = OptionChain::new(TICKER);
    for (strike, oi) in [(95.0, 40), (100.0, 60), (105.0, 99)] {
        chain.insert(contract(
            TICKER,
            front_expiration,
            strike,
            OptionType::Call,
            oi,
            greeks(0.5, 0.04, -0.03, 0.1),
        ));
    }
    chain
}

/// Engine with default configuration
#[fixture]
pub fn engine() -> ExposureEngine {
    ExposureEngine::default()
}
