use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{JournalError, Result};
use crate::models::{Candle, CandleSeries};
use crate::price_source::{window_bounds, PriceSource};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) trade-journal";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turns a Yahoo chart payload into bars. Minutes with any missing OHLC
/// value are skipped.
fn parse_chart(body: &str) -> Result<CandleSeries> {
    let resp: ChartResponse = serde_json::from_str(body)
        .map_err(|e| JournalError::ExternalSource(format!("bad chart payload: {}", e)))?;

    if let Some(err) = resp.chart.error {
        return Err(JournalError::ExternalSource(format!(
            "{}: {}",
            err.code, err.description
        )));
    }
    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(CandleSeries::default());
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(CandleSeries::default());
    };

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();
    let mut candles = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(timestamp) = DateTime::from_timestamp(*ts, 0) else {
            continue;
        };
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        candles.push(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        });
    }
    Ok(CandleSeries::normalized(candles))
}

/// One-minute bars from Yahoo's public chart endpoint.
pub struct YahooSource {
    client: Client,
    aliases: HashMap<String, String>,
    last_request: Option<Instant>,
    cache: HashMap<String, (Instant, CandleSeries)>,
    cache_ttl: Duration,
}

impl YahooSource {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            aliases: cfg.symbol_aliases.clone(),
            last_request: None,
            cache: HashMap::new(),
            cache_ttl: Duration::from_secs(60),
        }
    }

    fn ticker(&self, symbol: &str) -> String {
        let key = symbol.trim().to_uppercase();
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    async fn rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn fetch(
        &mut self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CandleSeries> {
        let cache_key = format!("{}_{}_{}", ticker, start.timestamp(), end.timestamp());
        if let Some((cached_at, series)) = self.cache.get(&cache_key) {
            if cached_at.elapsed() < self.cache_ttl {
                return Ok(series.clone());
            }
        }

        self.rate_limit().await;

        // period2 is exclusive upstream.
        let resp = self
            .client
            .get(format!("{}/{}", BASE_URL, ticker))
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", (end.timestamp() + 60).to_string()),
                ("interval", "1m".to_string()),
            ])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!("Yahoo returned {} for {}", status, ticker);
            // Error payloads carry a description worth surfacing.
            return match parse_chart(&body) {
                Err(e) => Err(e),
                Ok(_) => Err(JournalError::ExternalSource(format!(
                    "Yahoo API error {} for {}",
                    status, ticker
                ))),
            };
        }

        let series = parse_chart(&body)?;
        debug!("Fetched {} bars for {}", series.len(), ticker);
        self.prune_cache();
        self.cache
            .insert(cache_key, (Instant::now(), series.clone()));
        Ok(series)
    }

    /// Drops entries older than the cache TTL.
    fn prune_cache(&mut self) {
        let ttl = self.cache_ttl;
        self.cache.retain(|_, (cached_at, _)| cached_at.elapsed() < ttl);
    }
}

#[async_trait]
impl PriceSource for YahooSource {
    async fn get_window(
        &mut self,
        symbol: &str,
        center: DateTime<Utc>,
        minutes_before: i64,
        minutes_after: i64,
    ) -> Result<CandleSeries> {
        let (start, end) = window_bounds(center, minutes_before, minutes_after);
        let ticker = self.ticker(symbol);
        let series = self.fetch(&ticker, start, end).await?;
        Ok(series.window(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::default_test_config;

    const PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "GC=F"},
                "timestamp": [1705320120, 1705320060, 1705320180],
                "indicators": {"quote": [{
                    "open":   [2001.0, 2000.0, null],
                    "high":   [2003.0, 2002.0, 2004.0],
                    "low":    [2000.5, 1999.0, 2001.0],
                    "close":  [2002.5, 2001.0, 2003.0],
                    "volume": [12, null, 9]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_sorts_and_skips_gaps() {
        let series = parse_chart(PAYLOAD).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp.timestamp(), 1705320060);
        assert_eq!(series[0].volume, 0.0);
        assert_eq!(series[1].open, 2001.0);
    }

    #[test]
    fn upstream_error_is_external_source() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        match err {
            JournalError::ExternalSource(msg) => assert!(msg.contains("delisted")),
            other => panic!("expected external source error, got {:?}", other),
        }
    }

    #[test]
    fn missing_result_is_empty() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(parse_chart(body).unwrap().is_empty());
        assert!(parse_chart("not json").is_err());
    }

    #[test]
    fn symbols_resolve_through_aliases() {
        let src = YahooSource::new(&default_test_config());
        assert_eq!(src.ticker("xauusd"), "GC=F");
        assert_eq!(src.ticker("SPY"), "SPY");
    }

    #[test]
    fn expired_windows_are_pruned() {
        let mut src = YahooSource::new(&default_test_config());
        let stale = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        src.cache
            .insert("GC=F_old".to_string(), (stale, CandleSeries::default()));
        src.cache.insert(
            "GC=F_new".to_string(),
            (Instant::now(), CandleSeries::default()),
        );

        src.prune_cache();
        assert_eq!(src.cache.len(), 1);
        assert!(src.cache.contains_key("GC=F_new"));
    }
}
