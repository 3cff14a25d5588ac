//! Factory patterns for generating chains and trade tapes

use chrono::{DateTime, Duration, NaiveDate, Utc};
use exposure_engine::tape::TradeRecord;
use exposure_engine::{ContractKey, Greeks, OptionChain, OptionContract, OptionType};
use fake::{Fake, Faker};

/// Build one contract with the given Greeks
pub fn contract(
    ticker: &str,
    expiration: NaiveDate,
    strike: f64,
    option_type: OptionType,
    open_interest: u64,
    greeks: Greeks,
) -> OptionContract {
    OptionContract {
        ticker: ticker.to_string(),
        expiration,
        strike,
        option_type,
        open_interest,
        volume: open_interest / 10,
        greeks,
        implied_volatility: Some(0.25),
    }
}

/// Greeks without vanna
pub fn greeks(delta: f64, gamma: f64, theta: f64, vega: f64) -> Greeks {
    Greeks {
        delta,
        gamma,
        theta,
        vega,
        vanna: None,
    }
}

/// Factory for randomised option chains around a spot price
pub struct ChainFactory {
    ticker: String,
    spot: f64,
    as_of: DateTime<Utc>,
    expiration_days: Vec<i64>,
    strikes_per_side: usize,
    strike_step: f64,
    max_open_interest: u64,
}

impl ChainFactory {
    pub fn new(ticker: impl Into<String>, spot: f64, as_of: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            spot,
            as_of,
            expiration_days: vec![3, 10, 31],
            strikes_per_side: 10,
            strike_step: 1.0,
            max_open_interest: 5_000,
        }
    }

    pub fn with_expiration_days(mut self, days: Vec<i64>) -> Self {
        self.expiration_days = days;
        self
    }

    pub fn with_strikes(mut self, per_side: usize, step: f64) -> Self {
        self.strikes_per_side = per_side;
        self.strike_step = step;
        self
    }

    pub fn with_max_open_interest(mut self, max: u64) -> Self {
        self.max_open_interest = max;
        self
    }

    /// Strikes centred on the rounded spot
    pub fn strikes(&self) -> Vec<f64> {
        let centre = (self.spot / self.strike_step).round() * self.strike_step;
        let n = self.strikes_per_side as i64;
        (-n..=n)
            .map(|i| centre + i as f64 * self.strike_step)
            .filter(|k| *k > 0.0)
            .collect()
    }

    fn random_greeks(&self, strike: f64, option_type: OptionType) -> Greeks {
        let moneyness = (self.spot - strike) / self.spot;
        let call_delta = (0.5 + moneyness * 5.0).clamp(0.02, 0.98);
        let delta = match option_type {
            OptionType::Call => call_delta,
            OptionType::Put => call_delta - 1.0,
        };
        Greeks {
            delta,
            gamma: (0.001..0.08).fake::<f64>(),
            theta: -(0.01..0.5).fake::<f64>(),
            vega: (0.01..0.6).fake::<f64>(),
            vanna: if Faker.fake::<bool>() {
                Some((-0.2..0.2).fake::<f64>())
            } else {
                None
            },
        }
    }

    /// Random chain; some legs get zero open interest
    pub fn build(&self) -> OptionChain {
        let mut chain = OptionChain::new(self.ticker.clone());
        let today = self.as_of.date_naive();
        for days in &self.expiration_days {
            let expiration = today + Duration::days(*days);
            for strike in self.strikes() {
                for option_type in [OptionType::Call, OptionType::Put] {
                    let open_interest = if (0..10).fake::<u8>() == 0 {
                        0
                    } else {
                        (1..=self.max_open_interest).fake::<u64>()
                    };
                    chain.insert(OptionContract {
                        ticker: self.ticker.clone(),
                        expiration,
                        strike,
                        option_type,
                        open_interest,
                        volume: (0..=open_interest.max(1)).fake::<u64>(),
                        greeks: self.random_greeks(strike, option_type),
                        implied_volatility: Some((0.1..0.9).fake::<f64>()),
                    });
                }
            }
        }
        chain
    }
}

/// Factory for trade tapes
pub struct TapeFactory {
    start: DateTime<Utc>,
}

impl TapeFactory {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }

    /// One print `offset_secs` after the tape start
    pub fn trade(
        &self,
        key: &ContractKey,
        size: u64,
        offset_secs: i64,
        volume: u64,
        open_interest: u64,
    ) -> TradeRecord {
        TradeRecord {
            key: key.clone(),
            trade_size: size,
            premium_per_contract: 1.5,
            total_premium: 1.5 * size as f64 * 100.0,
            timestamp: self.start + Duration::seconds(offset_secs),
            volume,
            open_interest,
        }
    }

    /// Random prints against contracts of a chain, in time order
    pub fn random_for(&self, chain: &OptionChain, count: usize) -> Vec<TradeRecord> {
        let contracts: Vec<&OptionContract> = chain.contracts().collect();
        if contracts.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|i| {
                let contract = contracts[(0..contracts.len()).fake::<usize>()];
                self.trade(
                    &contract.key(),
                    (1..500).fake::<u64>(),
                    i as i64,
                    contract.volume,
                    contract.open_interest,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strikes_centred_on_spot() {
        let as_of = Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap();
        let factory = ChainFactory::new("SPY", 101.2, as_of).with_strikes(2, 5.0);
        assert_eq!(factory.strikes(), vec![90.0, 95.0, 100.0, 105.0, 110.0]);
    }

    #[test]
    fn test_chain_covers_every_leg() {
        let as_of = Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap();
        let chain = ChainFactory::new("SPY", 100.0, as_of)
            .with_expiration_days(vec![7])
            .with_strikes(3, 1.0)
            .build();
        assert_eq!(chain.len(), 14);
    }

    #[test]
    fn test_random_tape_is_time_ordered() {
        let as_of = Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap();
        let chain = ChainFactory::new("SPY", 100.0, as_of).build();
        let tape = TapeFactory::new(as_of).random_for(&chain, 25);
        assert_eq!(tape.len(), 25);
        assert!(tape.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
