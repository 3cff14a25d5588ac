//! Trade tape records
//!
//! The tape arrives as JSON arrays or CSV exports with the upstream field
//! names. Strikes may be numbers or strings; timestamps may be RFC 3339 text
//! or epoch milliseconds.

use crate::chain::{parse_expiration, parse_strike, whole_count};
use crate::error::{EngineError, EngineResult};
use crate::types::{ContractKey, OptionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Number-or-string field as found on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    /// Numeric form
    Number(f64),
    /// Text form
    Text(String),
}

impl NumberOrText {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(t) => t.clone(),
        }
    }
}

/// Trade exactly as delivered by the tape feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTradeRecord {
    /// Underlying ticker
    pub ticker: String,
    /// Strike
    pub strike: NumberOrText,
    /// `call`/`put`
    #[serde(rename = "type")]
    pub option_type: String,
    /// Expiration `YYYY-MM-DD`
    pub expiry: String,
    /// Contracts traded
    pub trade_size: f64,
    /// Premium per contract
    #[serde(default)]
    pub premium_per_contract: Option<f64>,
    /// Total premium
    #[serde(default)]
    pub total_premium: Option<f64>,
    /// RFC 3339 text or epoch milliseconds
    pub trade_timestamp: NumberOrText,
    /// Contract volume when the trade printed
    #[serde(default)]
    pub volume: Option<f64>,
    /// Contract open interest when the trade printed
    #[serde(default)]
    pub open_interest: Option<f64>,
}

/// Validated trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Contract traded
    pub key: ContractKey,
    /// Contracts traded
    pub trade_size: u64,
    /// Premium per contract
    pub premium_per_contract: f64,
    /// Total premium
    pub total_premium: f64,
    /// Print time
    pub timestamp: DateTime<Utc>,
    /// Contract volume carried on the record
    pub volume: u64,
    /// Contract open interest carried on the record
    pub open_interest: u64,
}

fn parse_timestamp(raw: &NumberOrText) -> EngineResult<DateTime<Utc>> {
    match raw {
        NumberOrText::Number(ms) => DateTime::<Utc>::from_timestamp_millis(*ms as i64)
            .ok_or_else(|| EngineError::MalformedRecord(format!("timestamp {ms} out of range"))),
        NumberOrText::Text(text) => {
            if let Ok(ms) = text.trim().parse::<i64>() {
                return DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                    EngineError::MalformedRecord(format!("timestamp {ms} out of range"))
                });
            }
            DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| EngineError::MalformedRecord(format!("timestamp '{text}': {e}")))
        }
    }
}

fn non_negative_count(raw: Option<f64>, field: &str, key: &ContractKey) -> EngineResult<u64> {
    match raw {
        None => Ok(0),
        Some(v) => whole_count(v)
            .ok_or_else(|| EngineError::MalformedRecord(format!("{field} {v} for {key}"))),
    }
}

impl TryFrom<&RawTradeRecord> for TradeRecord {
    type Error = EngineError;

    fn try_from(raw: &RawTradeRecord) -> EngineResult<Self> {
        let option_type = OptionType::parse(&raw.option_type).ok_or_else(|| {
            EngineError::MalformedRecord(format!("option type '{}'", raw.option_type))
        })?;
        let strike = parse_strike(&raw.strike.as_text())?;
        let expiration = parse_expiration(&raw.expiry)?;
        let key = ContractKey::new(raw.ticker.trim(), expiration, strike, option_type);

        if raw.trade_size < 0.0 {
            return Err(EngineError::NegativeTradeSize {
                contract: key.to_string(),
                value: raw.trade_size,
            });
        }
        let trade_size = whole_count(raw.trade_size).ok_or_else(|| {
            EngineError::MalformedRecord(format!("trade size {} for {key}", raw.trade_size))
        })?;
        let open_interest = match raw.open_interest {
            Some(v) if v < 0.0 => {
                return Err(EngineError::NegativeOpenInterest {
                    contract: key.to_string(),
                    value: v,
                });
            }
            other => non_negative_count(other, "open interest", &key)?,
        };

        let premium_per_contract = raw.premium_per_contract.filter(|p| p.is_finite()).unwrap_or(0.0);
        let total_premium = raw
            .total_premium
            .filter(|p| p.is_finite())
            .unwrap_or(premium_per_contract * trade_size as f64);

        Ok(Self {
            timestamp: parse_timestamp(&raw.trade_timestamp)?,
            volume: non_negative_count(raw.volume, "volume", &key)?,
            open_interest,
            trade_size,
            premium_per_contract,
            total_premium,
            key,
        })
    }
}

/// Validate a batch of raw records, keeping tape order
pub fn validate_tape(raw: &[RawTradeRecord]) -> EngineResult<Vec<TradeRecord>> {
    raw.iter().map(TradeRecord::try_from).collect()
}

/// Decode a JSON array of trades
pub fn parse_json_tape(json: &str) -> EngineResult<Vec<TradeRecord>> {
    let raw: Vec<RawTradeRecord> = serde_json::from_str(json)?;
    validate_tape(&raw)
}

#[derive(Debug, Deserialize)]
struct CsvTradeRow {
    ticker: String,
    strike: String,
    #[serde(rename = "type")]
    option_type: String,
    expiry: String,
    trade_size: f64,
    premium_per_contract: Option<f64>,
    total_premium: Option<f64>,
    trade_timestamp: String,
    volume: Option<f64>,
    open_interest: Option<f64>,
}

impl From<CsvTradeRow> for RawTradeRecord {
    fn from(row: CsvTradeRow) -> Self {
        Self {
            ticker: row.ticker,
            strike: NumberOrText::Text(row.strike),
            option_type: row.option_type,
            expiry: row.expiry,
            trade_size: row.trade_size,
            premium_per_contract: row.premium_per_contract,
            total_premium: row.total_premium,
            trade_timestamp: NumberOrText::Text(row.trade_timestamp),
            volume: row.volume,
            open_interest: row.open_interest,
        }
    }
}

/// Decode CSV with a header row of upstream field names
pub fn parse_csv_tape(reader: impl Read) -> EngineResult<Vec<TradeRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize::<CsvTradeRow>() {
        let raw = RawTradeRecord::from(row?);
        records.push(TradeRecord::try_from(&raw)?);
    }
    Ok(records)
}

/// Read a tape file, choosing CSV or JSON by extension
pub fn read_tape_file(path: impl AsRef<Path>) -> EngineResult<Vec<TradeRecord>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_csv_tape(std::fs::File::open(path)?)
    } else {
        parse_json_tape(&std::fs::read_to_string(path)?)
    }
}
