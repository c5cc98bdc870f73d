use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Candle, CandleSeries};
use crate::price_source::{window_bounds, PriceSource};

/// Serves pre-loaded bars from memory.
#[derive(Debug, Default)]
pub struct HistoricalSource {
    data: HashMap<String, CandleSeries>,
}

impl HistoricalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the bars held for `symbol`.
    pub fn load(&mut self, symbol: &str, candles: Vec<Candle>) {
        self.data
            .insert(symbol.to_uppercase(), CandleSeries::normalized(candles));
    }
}

#[async_trait]
impl PriceSource for HistoricalSource {
    async fn get_window(
        &mut self,
        symbol: &str,
        center: DateTime<Utc>,
        minutes_before: i64,
        minutes_after: i64,
    ) -> Result<CandleSeries> {
        let (start, end) = window_bounds(center, minutes_before, minutes_after);
        Ok(self
            .data
            .get(&symbol.to_uppercase())
            .map(|s| s.window(start, end))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{base_time, make_candles};
    use chrono::Duration;

    #[tokio::test]
    async fn window_includes_both_bounds() {
        let data: Vec<(f64, f64, f64, f64)> = (0..30)
            .map(|i| {
                let v = 100.0 + i as f64;
                (v, v + 1.0, v - 1.0, v + 0.5)
            })
            .collect();
        let mut src = HistoricalSource::new();
        src.load("eurusd", make_candles(&data).into_iter().collect());

        let center = base_time() + Duration::minutes(10);
        let w = src.get_window("EURUSD", center, 5, 3).await.unwrap();
        assert_eq!(w.len(), 9);
        assert_eq!(w.first().unwrap().timestamp, center - Duration::minutes(5));
        assert_eq!(w.last().unwrap().timestamp, center + Duration::minutes(3));
    }

    #[tokio::test]
    async fn unknown_symbol_yields_empty_window() {
        let mut src = HistoricalSource::new();
        let w = src.get_window("GBPUSD", base_time(), 90, 30).await.unwrap();
        assert!(w.is_empty());
    }
}
