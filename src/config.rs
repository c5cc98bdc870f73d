use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::models::DEFAULT_CONDITIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    Yahoo,
    Csv,
}

impl FromStr for PriceSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(PriceSourceKind::Yahoo),
            "csv" => Ok(PriceSourceKind::Csv),
            other => Err(format!("unknown price source {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Storage
    pub db_path: PathBuf,
    pub chart_dir: PathBuf,
    pub data_dir: PathBuf,

    // Wall-clock zone for entry times and chart axes
    pub timezone: Tz,

    // Price data
    pub price_source: PriceSourceKind,
    pub symbol_aliases: HashMap<String, String>,
    pub minutes_before: i64,
    pub minutes_after: i64,

    // Analytics
    pub min_condition_trades: usize,
    pub default_conditions: Vec<String>,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let tz_name = env("JOURNAL_TZ", "UTC");
        let timezone = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!("Unknown JOURNAL_TZ {:?}, using UTC", tz_name);
            Tz::UTC
        });

        let mut symbol_aliases = HashMap::new();
        symbol_aliases.insert("XAUUSD".to_string(), "GC=F".to_string());
        symbol_aliases.insert("EURUSD".to_string(), "EURUSD=X".to_string());

        Config {
            db_path: env("JOURNAL_DB", "journal.db").into(),
            chart_dir: env("JOURNAL_CHART_DIR", "charts").into(),
            data_dir: env("JOURNAL_DATA_DIR", "data").into(),
            timezone,
            price_source: env("PRICE_SOURCE", "yahoo")
                .parse()
                .unwrap_or(PriceSourceKind::Yahoo),
            symbol_aliases,
            minutes_before: env("CHART_MINUTES_BEFORE", "90").parse().unwrap_or(90),
            minutes_after: env("CHART_MINUTES_AFTER", "30").parse().unwrap_or(30),
            min_condition_trades: env("MIN_CONDITION_TRADES", "3").parse().unwrap_or(3),
            default_conditions: DEFAULT_CONDITIONS.iter().map(|l| l.to_string()).collect(),
            log_level: env("LOG_LEVEL", "info"),
        }
    }
}
