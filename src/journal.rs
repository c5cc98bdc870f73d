use std::path::PathBuf;
use tracing::{info, warn};

use crate::chart;
use crate::config::{Config, PriceSourceKind};
use crate::error::{JournalError, Result};
use crate::models::{Trade, TradeForm};
use crate::price_source::{from_wall_clock, CsvSource, PriceSource, YahooSource};
use crate::store::analytics::{ConditionWinrate, SessionWinrate};
use crate::store::TradeStore;

/// Outcome of a bulk chart run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenTally {
    pub ok: usize,
    pub failed: usize,
}

pub struct Journal {
    cfg: Config,
    store: TradeStore,
    prices: Box<dyn PriceSource>,
}

impl Journal {
    /// Seeds the default checklist conditions into `store`.
    pub fn new(cfg: Config, store: TradeStore, prices: Box<dyn PriceSource>) -> Result<Self> {
        store.ensure_default_items(&cfg.default_conditions)?;
        Ok(Self { cfg, store, prices })
    }

    /// Opens the configured database and price source.
    pub fn open(cfg: Config) -> Result<Self> {
        let store = TradeStore::open(&cfg.db_path)?;
        let prices: Box<dyn PriceSource> = match cfg.price_source {
            PriceSourceKind::Yahoo => Box::new(YahooSource::new(&cfg)),
            PriceSourceKind::Csv => Box::new(CsvSource::new(cfg.data_dir.clone())),
        };
        Self::new(cfg, store, prices)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn store(&self) -> &TradeStore {
        &self.store
    }

    pub fn log_trade(&mut self, form: TradeForm) -> Result<Trade> {
        let (new_trade, conditions) = form.derive()?;
        let id = self.store.record_trade(&new_trade, &conditions)?;
        self.store.get_trade(id)
    }

    /// Where the chart for `trade` is written.
    pub fn chart_path(&self, trade: &Trade) -> PathBuf {
        self.cfg.chart_dir.join(format!(
            "{}_{}_{}.svg",
            trade.symbol,
            trade.id,
            trade.entry_time.format("%Y%m%d_%H%M")
        ))
    }

    /// Fetches bars around the trade's entry, renders them and saves the chart.
    pub async fn chart_trade(&mut self, id: i64) -> Result<PathBuf> {
        let trade = self.store.get_trade(id)?;
        let center = from_wall_clock(&trade.entry_time, self.cfg.timezone)?;
        let bars = self
            .prices
            .get_window(
                &trade.symbol,
                center,
                self.cfg.minutes_before,
                self.cfg.minutes_after,
            )
            .await?;
        if bars.is_empty() {
            return Err(JournalError::EmptyInput(format!(
                "no bars for {} around {}",
                trade.symbol, trade.entry_time
            )));
        }

        let image = chart::render(&bars, &trade, self.cfg.timezone)?;
        let path = self.chart_path(&trade);
        image.save(&path)?;
        info!("Chart for trade #{} written to {}", trade.id, path.display());
        Ok(path)
    }

    /// Re-renders charts for the most recent `limit` trades. A failing trade
    /// is logged and counted; the rest still run.
    pub async fn regenerate_charts(&mut self, limit: usize) -> Result<RegenTally> {
        let trades = self.store.list_trades(limit, true)?;
        let mut tally = RegenTally::default();
        for trade in trades {
            match self.chart_trade(trade.id).await {
                Ok(_) => tally.ok += 1,
                Err(e) => {
                    warn!("Chart for trade #{} failed: {}", trade.id, e);
                    tally.failed += 1;
                }
            }
        }
        info!(
            "Regenerated charts: {} ok, {} failed",
            tally.ok, tally.failed
        );
        Ok(tally)
    }

    pub fn session_report(&self) -> Result<Vec<SessionWinrate>> {
        self.store.aggregate_winrate_by_session()
    }

    pub fn condition_report(&self) -> Result<Vec<ConditionWinrate>> {
        self.store
            .aggregate_winrate_by_condition(self.cfg.min_condition_trades)
    }
}
