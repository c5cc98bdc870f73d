use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

use crate::config::{Config, PriceSourceKind};
use crate::models::{
    Bias, Candle, CandleSeries, Direction, Session, Trade, TradeForm, TradeResult,
    DEFAULT_CONDITIONS,
};

/// 2024-01-15 12:00 UTC, the first bar of [`make_candles`].
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Create candles from (open, high, low, close) tuples with auto-incrementing 1m timestamps.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();

    CandleSeries::new(candles)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// An aligned XAUUSD long with no prices and no conditions.
pub fn sample_form() -> TradeForm {
    TradeForm {
        symbol: "XAUUSD".to_string(),
        direction: Direction::Buy,
        entry_time: at(2024, 1, 15, 12, 1),
        rr: 3.0,
        h4: Bias::Up,
        h1: Bias::Up,
        m15: Bias::Up,
        result: TradeResult::Open,
        notes: String::new(),
        entry_price: None,
        stop_price: None,
        exit_price: None,
        conditions: Vec::new(),
    }
}

/// The persisted counterpart of [`sample_form`], entered on the second bar of
/// [`make_candles`].
pub fn sample_trade() -> Trade {
    Trade {
        id: 1,
        symbol: "XAUUSD".to_string(),
        direction: Direction::Buy,
        entry_time: at(2024, 1, 15, 12, 1),
        rr: 3.0,
        session: Session::London,
        h4: Bias::Up,
        h1: Bias::Up,
        m15: Bias::Up,
        mtf_score: 3,
        result: TradeResult::Open,
        notes: String::new(),
        entry_price: None,
        stop_price: None,
        exit_price: None,
    }
}

/// A Config for tests: UTC, in-repo relative paths, no network lookups.
pub fn default_test_config() -> Config {
    let mut symbol_aliases = HashMap::new();
    symbol_aliases.insert("XAUUSD".to_string(), "GC=F".to_string());
    symbol_aliases.insert("EURUSD".to_string(), "EURUSD=X".to_string());

    Config {
        db_path: ":memory:".into(),
        chart_dir: "charts".into(),
        data_dir: "data".into(),
        timezone: Tz::UTC,
        price_source: PriceSourceKind::Csv,
        symbol_aliases,
        minutes_before: 90,
        minutes_after: 30,
        min_condition_trades: 3,
        default_conditions: DEFAULT_CONDITIONS.iter().map(|l| l.to_string()).collect(),
        log_level: "debug".to_string(),
    }
}
