pub mod layout;

use chrono::Duration;
use chrono_tz::Tz;
use plotters::coord::types::RangedCoordf64;
use plotters::element::{DashedPathElement, DottedPathElement};
use plotters::prelude::*;
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

use crate::error::{JournalError, Result};
use crate::models::{CandleSeries, Trade};

pub use layout::{ChartLayout, LevelKind, LineStyle, ReferenceLine};

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 420;
const BODY_WIDTH: u32 = 5;
const LEVEL_WIDTH: u32 = 2;

// Pattern lengths in pixels.
const DASH: u32 = 8;
const DASH_GAP: u32 = 5;
const DOT_SPACING: u32 = 6;
const LONG_DASH: u32 = 12;
const LONG_DASH_GAP: u32 = 10;

const UP_COLOR: RGBColor = RGBColor(38, 166, 154);
const DOWN_COLOR: RGBColor = RGBColor(239, 83, 80);
const MARKER_COLOR: RGBColor = RGBColor(120, 120, 120);

fn level_color(kind: LevelKind) -> RGBColor {
    match kind {
        LevelKind::Entry => RGBColor(33, 150, 243),
        LevelKind::Stop => RGBColor(211, 47, 47),
        LevelKind::Exit => RGBColor(123, 31, 162),
        LevelKind::Target => RGBColor(56, 142, 60),
    }
}

/// A rendered chart, held in memory as SVG.
#[derive(Debug, Clone)]
pub struct ChartImage {
    svg: String,
}

impl ChartImage {
    pub fn as_svg(&self) -> &str {
        &self.svg
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.svg)?;
        Ok(())
    }
}

/// Candles around a trade with its entry, stop, exit and target levels.
pub fn render(bars: &CandleSeries, trade: &Trade, tz: Tz) -> Result<ChartImage> {
    let layout = ChartLayout::build(bars, trade, tz)?;
    debug!(
        "Charting trade {}: {} bars, {} levels",
        trade.id,
        layout.bars.len(),
        layout.lines.len()
    );
    draw(&layout)
}

fn render_err(e: impl Display) -> JournalError {
    JournalError::Render(e.to_string())
}

type PriceChart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Strokes the straight segment `from -> to` in `style`.
fn draw_stroke(
    chart: &mut PriceChart<'_, '_>,
    from: (f64, f64),
    to: (f64, f64),
    style: LineStyle,
    color: RGBColor,
    width: u32,
) -> Result<()> {
    let stroke = color.stroke_width(width);
    let dot = move |c: (i32, i32)| Circle::new(c, width, color.filled());
    match style {
        LineStyle::Solid => {
            chart
                .draw_series(std::iter::once(PathElement::new(vec![from, to], stroke)))
                .map_err(render_err)?;
        }
        LineStyle::Dashed => {
            chart
                .draw_series(std::iter::once(DashedPathElement::new(
                    vec![from, to],
                    DASH,
                    DASH_GAP,
                    stroke,
                )))
                .map_err(render_err)?;
        }
        LineStyle::Dotted => {
            chart
                .draw_series(std::iter::once(DottedPathElement::new(
                    vec![from, to],
                    0,
                    DOT_SPACING,
                    dot,
                )))
                .map_err(render_err)?;
        }
        LineStyle::DashDot => {
            // One dot centred in every gap between long dashes.
            chart
                .draw_series(std::iter::once(DashedPathElement::new(
                    vec![from, to],
                    LONG_DASH,
                    LONG_DASH_GAP,
                    stroke,
                )))
                .map_err(render_err)?;
            chart
                .draw_series(std::iter::once(DottedPathElement::new(
                    vec![from, to],
                    LONG_DASH + LONG_DASH_GAP / 2,
                    LONG_DASH + LONG_DASH_GAP,
                    dot,
                )))
                .map_err(render_err)?;
        }
    }
    Ok(())
}

fn draw(layout: &ChartLayout) -> Result<ChartImage> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let (x0, x1) = layout.x_range();
        let (y0, y1) = layout.price_range;

        let mut chart = ChartBuilder::on(&root)
            .caption(&layout.title, ("sans-serif", 18).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(70)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(render_err)?;

        let start = layout.start;
        let x_fmt = |x: &f64| {
            (start + Duration::seconds((x * 60.0).round() as i64))
                .format("%H:%M")
                .to_string()
        };
        let y_fmt = |y: &f64| format!("{:.2}", y);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(8)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .draw()
            .map_err(render_err)?;

        // Wicks first so bodies sit on top.
        chart
            .draw_series(layout.bars.iter().map(|b| {
                let x = layout.x_of(b.time);
                let color = if b.up { UP_COLOR } else { DOWN_COLOR };
                PathElement::new(vec![(x, b.low), (x, b.high)], color.stroke_width(1))
            }))
            .map_err(render_err)?;
        chart
            .draw_series(layout.bars.iter().map(|b| {
                let x = layout.x_of(b.time);
                let color = if b.up { UP_COLOR } else { DOWN_COLOR };
                PathElement::new(
                    vec![(x, b.body_bottom()), (x, b.body_top())],
                    color.stroke_width(BODY_WIDTH),
                )
            }))
            .map_err(render_err)?;

        for line in &layout.lines {
            let color = level_color(line.kind);
            let price = line.price;
            draw_stroke(
                &mut chart,
                (x0, price),
                (x1, price),
                line.style,
                color,
                LEVEL_WIDTH,
            )?;
            chart
                .draw_series(std::iter::once(Text::new(
                    format!("{} {:.2}", line.kind, price),
                    (x0, price),
                    ("sans-serif", 12).into_font().color(&color),
                )))
                .map_err(render_err)?;
        }

        if let Some(entry) = layout.entry_marker {
            let x = layout.x_of(entry);
            draw_stroke(&mut chart, (x, y0), (x, y1), LineStyle::Dashed, MARKER_COLOR, 1)?;
        }

        root.present().map_err(render_err)?;
    }
    Ok(ChartImage { svg })
}
