#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::Path;

use trade_journal::config::{Config, PriceSourceKind};
use trade_journal::models::{Bias, Candle, Direction, TradeForm, TradeResult, DEFAULT_CONDITIONS};

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// One-minute bars drifting up from `start`, `before` minutes either side of `center`.
pub fn bars_around(center: DateTime<Utc>, minutes: i64, start: f64) -> Vec<Candle> {
    (-minutes..=minutes)
        .map(|i| {
            let open = start + (i + minutes) as f64 * 0.25;
            let close = if i % 3 == 0 { open - 0.5 } else { open + 0.75 };
            Candle {
                timestamp: center + Duration::minutes(i),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 100.0,
            }
        })
        .collect()
}

pub fn form(
    symbol: &str,
    entry_time: NaiveDateTime,
    result: TradeResult,
    conditions: &[&str],
) -> TradeForm {
    TradeForm {
        symbol: symbol.to_string(),
        direction: Direction::Buy,
        entry_time,
        rr: 2.0,
        h4: Bias::Up,
        h1: Bias::Up,
        m15: Bias::Range,
        result,
        notes: String::new(),
        entry_price: Some(2000.0),
        stop_price: Some(1995.0),
        exit_price: None,
        conditions: conditions.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn test_config(root: &Path) -> Config {
    let mut symbol_aliases = HashMap::new();
    symbol_aliases.insert("XAUUSD".to_string(), "GC=F".to_string());

    Config {
        db_path: root.join("journal.db"),
        chart_dir: root.join("charts"),
        data_dir: root.join("data"),
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
