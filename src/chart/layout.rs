use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::fmt;
use tracing::warn;

use crate::error::{JournalError, Result};
use crate::models::{CandleSeries, Trade};

const PRICE_PADDING: f64 = 0.05;
/// Floor for the padding, relative to the price level, so a flat window still
/// gets a visible y-range.
const MIN_PADDING: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Entry,
    Stop,
    Exit,
    Target,
}

impl LevelKind {
    pub fn style(&self) -> LineStyle {
        match self {
            LevelKind::Entry => LineStyle::Dashed,
            LevelKind::Stop => LineStyle::Dotted,
            LevelKind::Exit => LineStyle::DashDot,
            LevelKind::Target => LineStyle::Solid,
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKind::Entry => write!(f, "entry"),
            LevelKind::Stop => write!(f, "stop"),
            LevelKind::Exit => write!(f, "exit"),
            LevelKind::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub kind: LevelKind,
    pub price: f64,
    pub style: LineStyle,
}

/// A bar on the wall clock the chart is drawn in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotBar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub up: bool,
}

impl PlotBar {
    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }
}

/// Everything the drawing step needs, resolved ahead of time.
#[derive(Debug, Clone)]
pub struct ChartLayout {
    pub title: String,
    pub bars: Vec<PlotBar>,
    pub lines: Vec<ReferenceLine>,
    pub entry_marker: Option<NaiveDateTime>,
    pub price_range: (f64, f64),
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

pub fn to_wall_clock(ts: &DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    ts.with_timezone(&tz).naive_local()
}

impl ChartLayout {
    pub fn build(bars: &CandleSeries, trade: &Trade, tz: Tz) -> Result<Self> {
        if bars.is_empty() {
            return Err(JournalError::EmptyInput(format!(
                "no price bars for trade {} ({})",
                trade.id, trade.symbol
            )));
        }

        let mut plot_bars: Vec<PlotBar> = Vec::with_capacity(bars.len());
        let mut dropped = 0usize;
        for c in bars {
            if !c.is_finite() {
                dropped += 1;
                continue;
            }
            plot_bars.push(PlotBar {
                time: to_wall_clock(&c.timestamp, tz),
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                up: c.is_up(),
            });
        }
        if dropped > 0 {
            warn!(
                "Dropped {} malformed bars while charting trade {}",
                dropped, trade.id
            );
        }
        if plot_bars.is_empty() {
            return Err(JournalError::EmptyInput(format!(
                "all {} bars for trade {} were malformed",
                bars.len(),
                trade.id
            )));
        }
        plot_bars.sort_by_key(|b| b.time);

        let mut lines = Vec::new();
        let levels = [
            (LevelKind::Entry, trade.entry_price),
            (LevelKind::Stop, trade.stop_price),
            (LevelKind::Exit, trade.exit_price),
            (LevelKind::Target, trade.target_price()),
        ];
        for (kind, price) in levels {
            if let Some(price) = price.filter(|p| p.is_finite()) {
                lines.push(ReferenceLine {
                    kind,
                    price,
                    style: kind.style(),
                });
            }
        }

        let start = plot_bars[0].time;
        let end = plot_bars[plot_bars.len() - 1].time;
        let entry_marker = Some(trade.entry_time).filter(|t| *t >= start && *t <= end);

        let lo = plot_bars
            .iter()
            .map(|b| b.low)
            .chain(lines.iter().map(|l| l.price))
            .fold(f64::INFINITY, f64::min);
        let hi = plot_bars
            .iter()
            .map(|b| b.high)
            .chain(lines.iter().map(|l| l.price))
            .fold(f64::NEG_INFINITY, f64::max);
        let pad = ((hi - lo) * PRICE_PADDING).max(hi.abs().max(1.0) * MIN_PADDING);

        Ok(Self {
            title: format!(
                "{} {} {}",
                trade.symbol,
                trade.direction,
                trade.entry_time.format("%Y-%m-%d %H:%M")
            ),
            bars: plot_bars,
            lines,
            entry_marker,
            price_range: (lo - pad, hi + pad),
            start,
            end,
        })
    }

    pub fn line(&self, kind: LevelKind) -> Option<&ReferenceLine> {
        self.lines.iter().find(|l| l.kind == kind)
    }

    /// Minutes since the first bar.
    pub fn x_of(&self, t: NaiveDateTime) -> f64 {
        (t - self.start).num_seconds() as f64 / 60.0
    }

    pub fn x_range(&self) -> (f64, f64) {
        (-0.5, self.x_of(self.end).max(1.0) + 0.5)
    }
}
