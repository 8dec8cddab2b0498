//! PNG charts through the plotters bitmap backend.
//!
//! Text is drawn with an embedded DejaVu Sans face registered in plotters'
//! `ab_glyph` font table, so rendering never looks up system fonts.

use std::fmt::Display;
use std::ops::Range;
use std::path::Path;

use once_cell::sync::Lazy;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::debug;

use super::{
    BarChart, BoxplotChart, ChartKind, ChartRenderer, GroupedBarChart, HeatmapChart,
    HeatmapScale, HistogramChart, QqChart, ScatterChart, TimelineChart, TrendChart,
};
use crate::error::{EdaError, Result};
use crate::utils::format_date;

const FONT_FAMILY: &str = "sans-serif";
const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

static FONT_READY: Lazy<bool> =
    Lazy::new(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT_DATA).is_ok());

const MARGIN: u32 = 16;
const CAPTION_SIZE: i32 = 20;
const PANEL_CAPTION_SIZE: i32 = 14;
const LABEL_SIZE: i32 = 13;
const X_LABEL_AREA: u32 = 44;
const Y_LABEL_AREA: u32 = 60;
/// Axis tick labels longer than this are cut with an ellipsis.
const MAX_TICK_CHARS: usize = 14;
/// Heatmaps with more cells than this are drawn without printed values.
const MAX_ANNOTATED_CELLS: usize = 144;

const BAR_COLOR: RGBColor = RGBColor(70, 130, 180);
const REFERENCE_COLOR: RGBColor = RGBColor(192, 57, 43);
const UNDEFINED_COLOR: RGBColor = RGBColor(200, 200, 200);
const PALETTE: [RGBColor; 4] = [
    RGBColor(70, 130, 180),
    RGBColor(230, 126, 34),
    RGBColor(46, 139, 87),
    RGBColor(155, 89, 182),
];

/// Default [`ChartRenderer`] writing fixed-size PNG files.
#[derive(Debug, Clone, Copy)]
pub struct PlottersRenderer {
    width: u32,
    height: u32,
}

impl PlottersRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn canvas<'a>(
        &self,
        path: &'a Path,
        size: (u32, u32),
        kind: ChartKind,
    ) -> Result<DrawingArea<BitMapBackend<'a>, Shift>> {
        if !*FONT_READY {
            return Err(EdaError::chart(
                kind.display_name(),
                "embedded font could not be loaded",
            ));
        }
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(failed(kind))?;
        Ok(root)
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for PlottersRenderer {
    fn default() -> Self {
        Self::new(800, 500)
    }
}

fn failed<E: Display>(kind: ChartKind) -> impl Fn(E) -> EdaError {
    move |e| EdaError::chart(kind.display_name(), e)
}

fn padded_range(min: f64, max: f64) -> Range<f64> {
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

fn count_range(max_count: usize) -> Range<f64> {
    0.0..(max_count as f64 * 1.1).max(1.0)
}

/// Axis over `n` categories placed at `0, 1, .., n - 1`.
fn category_range(n: usize) -> Range<f64> {
    -0.5..(n as f64 - 0.5)
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn shorten(label: &str) -> String {
    if label.chars().count() <= MAX_TICK_CHARS {
        return label.to_string();
    }
    let kept: String = label.chars().take(MAX_TICK_CHARS - 1).collect();
    format!("{kept}…")
}

/// Tick text for a category axis: the label when `value` sits on a category.
fn category_label(labels: &[String], value: f64) -> String {
    let nearest = value.round();
    if nearest < 0.0 || (value - nearest).abs() > 1e-6 {
        return String::new();
    }
    labels
        .get(nearest as usize)
        .map(|label| shorten(label))
        .unwrap_or_default()
}

fn lerp(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        channel(from.0, to.0),
        channel(from.1, to.1),
        channel(from.2, to.2),
    )
}

/// Fill colour of a heatmap cell and whether its printed value needs light text.
fn cell_color(value: Option<f64>, scale: HeatmapScale) -> (RGBColor, bool) {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return (UNDEFINED_COLOR, false);
    };
    match scale {
        HeatmapScale::Diverging => {
            let t = value.clamp(-1.0, 1.0);
            let end = if t >= 0.0 {
                RGBColor(178, 24, 43)
            } else {
                RGBColor(33, 102, 172)
            };
            (lerp(WHITE, end, t.abs()), t.abs() > 0.6)
        }
        HeatmapScale::Sequential => {
            let t = value.clamp(0.0, 1.0);
            (lerp(WHITE, RGBColor(44, 62, 80), t), t > 0.6)
        }
    }
}

impl ChartRenderer for PlottersRenderer {
    fn histogram(&self, path: &Path, chart: &HistogramChart) -> Result<()> {
        let kind = ChartKind::Histogram;
        let (Some(first), Some(last)) = (chart.bins.first(), chart.bins.last()) else {
            return Err(EdaError::chart(kind.display_name(), "no bins to draw"));
        };
        let max_count = chart.bins.iter().map(|b| b.count).max().unwrap_or(0);

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(first.start..last.end, count_range(max_count))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .disable_x_mesh()
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc(chart.x_label.as_str())
            .y_desc("Count")
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(chart.bins.iter().map(|bin| {
            Rectangle::new(
                [(bin.start, 0.0), (bin.end, bin.count as f64)],
                BAR_COLOR.mix(0.8).filled(),
            )
        }))
        .map_err(failed(kind))?;
        cc.draw_series(chart.bins.iter().map(|bin| {
            Rectangle::new(
                [(bin.start, 0.0), (bin.end, bin.count as f64)],
                WHITE.stroke_width(1),
            )
        }))
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn bar_chart(&self, path: &Path, chart: &BarChart) -> Result<()> {
        let kind = ChartKind::Bar;
        if chart.bars.is_empty() {
            return Err(EdaError::chart(kind.display_name(), "no categories to draw"));
        }
        let max_count = chart.bars.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let labels: Vec<String> = chart.bars.iter().map(|(label, _)| label.clone()).collect();
        let tick = |v: &f64| category_label(&labels, *v);

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(category_range(labels.len()), count_range(max_count))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len().min(20))
            .x_label_formatter(&tick)
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc(chart.x_label.as_str())
            .y_desc("Count")
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(chart.bars.iter().enumerate().map(|(i, (_, count))| {
            let x = i as f64;
            Rectangle::new(
                [(x - 0.35, 0.0), (x + 0.35, *count as f64)],
                PALETTE[i % PALETTE.len()].filled(),
            )
        }))
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn timeline(&self, path: &Path, chart: &TimelineChart) -> Result<()> {
        let kind = ChartKind::Timeline;
        if chart.points.is_empty() {
            return Err(EdaError::chart(kind.display_name(), "no time buckets to draw"));
        }
        let max_count = chart.points.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let labels: Vec<String> = chart.points.iter().map(|(label, _)| label.clone()).collect();
        let tick = |v: &f64| category_label(&labels, *v);
        let points: Vec<(f64, f64)> = chart
            .points
            .iter()
            .enumerate()
            .map(|(i, (_, count))| (i as f64, *count as f64))
            .collect();

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(category_range(points.len()), count_range(max_count))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .x_labels(labels.len().min(12))
            .x_label_formatter(&tick)
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc("Period")
            .y_desc("Count")
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(LineSeries::new(points.clone(), BAR_COLOR.stroke_width(2)))
            .map_err(failed(kind))?;
        cc.draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, 3, BAR_COLOR.filled())),
        )
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn boxplot(&self, path: &Path, chart: &BoxplotChart) -> Result<()> {
        let kind = ChartKind::Boxplot;
        if chart.groups.is_empty() || chart.groups.iter().any(|(_, values)| values.is_empty()) {
            return Err(EdaError::chart(kind.display_name(), "every group needs values"));
        }
        let Some((lo, hi)) = extent(chart.groups.iter().flat_map(|(_, v)| v.iter().copied()))
        else {
            return Err(EdaError::chart(kind.display_name(), "no values to draw"));
        };
        let y_range = padded_range(lo, hi);
        let labels: Vec<String> = chart.groups.iter().map(|(label, _)| label.clone()).collect();
        let tick = |v: &f64| category_label(&labels, *v);
        let quartiles: Vec<Quartiles> = chart
            .groups
            .iter()
            .map(|(_, values)| Quartiles::new(values.as_slice()))
            .collect();

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(
                category_range(quartiles.len()),
                y_range.start as f32..y_range.end as f32,
            )
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len().min(20))
            .x_label_formatter(&tick)
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(quartiles.iter().enumerate().map(|(i, q)| {
            Boxplot::new_vertical(i as f64, q)
                .width(40)
                .whisker_width(0.5)
                .style(PALETTE[i % PALETTE.len()].stroke_width(2))
        }))
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn scatter(&self, path: &Path, chart: &ScatterChart) -> Result<()> {
        let kind = ChartKind::Scatter;
        let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (
            extent(chart.points.iter().map(|p| p.0)),
            extent(chart.points.iter().map(|p| p.1)),
        ) else {
            return Err(EdaError::chart(kind.display_name(), "no points to draw"));
        };

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(padded_range(x_lo, x_hi), padded_range(y_lo, y_hi))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(
            chart
                .points
                .iter()
                .map(|&point| Circle::new(point, 3, BAR_COLOR.mix(0.7).filled())),
        )
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn grouped_bar(&self, path: &Path, chart: &GroupedBarChart) -> Result<()> {
        let kind = ChartKind::GroupedBar;
        if chart.categories.is_empty() || chart.series.is_empty() {
            return Err(EdaError::chart(kind.display_name(), "empty contingency table"));
        }
        let max_count = chart.counts.iter().flatten().copied().max().unwrap_or(0);
        let bar_width = 0.8 / chart.series.len() as f64;
        let tick = |v: &f64| category_label(&chart.categories, *v);

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(category_range(chart.categories.len()), count_range(max_count))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(chart.categories.len().min(20))
            .x_label_formatter(&tick)
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc(chart.x_label.as_str())
            .y_desc("Count")
            .draw()
            .map_err(failed(kind))?;
        for (k, name) in chart.series.iter().enumerate() {
            let color = PALETTE[k % PALETTE.len()];
            cc.draw_series(chart.counts.iter().enumerate().map(|(i, row)| {
                let count = row.get(k).copied().unwrap_or(0);
                let x0 = i as f64 - 0.4 + k as f64 * bar_width;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, count as f64)], color.filled())
            }))
            .map_err(failed(kind))?
            .label(format!("{} = {}", chart.series_label, shorten(name)))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }
        cc.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font((FONT_FAMILY, LABEL_SIZE))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn qq_plot(&self, path: &Path, chart: &QqChart) -> Result<()> {
        let kind = ChartKind::QqPlot;
        if chart.points.is_empty() {
            return Err(EdaError::chart(kind.display_name(), "no quantiles to draw"));
        }
        let ends = chart.reference;
        let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (
            extent(chart.points.iter().chain(&ends).map(|p| p.0)),
            extent(chart.points.iter().chain(&ends).map(|p| p.1)),
        ) else {
            return Err(EdaError::chart(kind.display_name(), "no quantiles to draw"));
        };

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(padded_range(x_lo, x_hi), padded_range(y_lo, y_hi))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .x_desc("Theoretical quantiles")
            .y_desc("Ordered values")
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(LineSeries::new(ends, REFERENCE_COLOR.stroke_width(2)))
            .map_err(failed(kind))?;
        cc.draw_series(
            chart
                .points
                .iter()
                .map(|&point| Circle::new(point, 3, BAR_COLOR.mix(0.7).filled())),
        )
        .map_err(failed(kind))?;
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn heatmap(&self, path: &Path, kind: ChartKind, chart: &HeatmapChart) -> Result<()> {
        let rows = chart.y_labels.len();
        let cols = chart.x_labels.len();
        if rows == 0 || cols == 0 {
            return Err(EdaError::chart(kind.display_name(), "empty grid"));
        }
        if chart.cells.len() != rows || chart.cells.iter().any(|row| row.len() != cols) {
            return Err(EdaError::chart(
                kind.display_name(),
                "cell grid does not match its labels",
            ));
        }
        // Row 0 is drawn at the top.
        let y_of = |row: usize| (rows - 1 - row) as f64;
        let x_tick = |v: &f64| category_label(&chart.x_labels, *v);
        let y_tick = |v: &f64| {
            let nearest = v.round();
            if nearest < 0.0 || nearest >= rows as f64 {
                return String::new();
            }
            category_label(&chart.y_labels, (rows - 1) as f64 - *v)
        };
        let annotate = chart.annotate && rows * cols <= MAX_ANNOTATED_CELLS;

        let root = self.canvas(path, self.size(), kind)?;
        let mut cc = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA + 40)
            .build_cartesian_2d(category_range(cols), category_range(rows))
            .map_err(failed(kind))?;
        cc.configure_mesh()
            .disable_mesh()
            .x_labels(cols.min(20))
            .y_labels(rows.min(20))
            .x_label_formatter(&x_tick)
            .y_label_formatter(&y_tick)
            .label_style((FONT_FAMILY, LABEL_SIZE))
            .draw()
            .map_err(failed(kind))?;
        cc.draw_series(chart.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().map(move |(c, value)| {
                let (x, y) = (c as f64, y_of(r));
                let (fill, _) = cell_color(*value, chart.scale);
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], fill.filled())
            })
        }))
        .map_err(failed(kind))?;
        if annotate {
            cc.draw_series(chart.cells.iter().enumerate().flat_map(|(r, row)| {
                row.iter().enumerate().filter_map(move |(c, value)| {
                    let value = value.filter(|v| v.is_finite())?;
                    let (_, light) = cell_color(Some(value), chart.scale);
                    let base = TextStyle::from((FONT_FAMILY, LABEL_SIZE))
                        .pos(Pos::new(HPos::Center, VPos::Center));
                    let style = if light { base.color(&WHITE) } else { base.color(&BLACK) };
                    Some(Text::new(format!("{value:.2}"), (c as f64, y_of(r)), style))
                })
            }))
            .map_err(failed(kind))?;
        }
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }

    fn trend(&self, path: &Path, chart: &TrendChart) -> Result<()> {
        let kind = ChartKind::Trend;
        if chart.panels.is_empty() || chart.panels.iter().any(|p| p.points.is_empty()) {
            return Err(EdaError::chart(kind.display_name(), "every panel needs points"));
        }
        let cols = if chart.panels.len() > 1 { 2 } else { 1 };
        let rows = chart.panels.len().div_ceil(cols);
        let height = self.height.max(rows as u32 * self.height * 3 / 5);

        let root = self.canvas(path, (self.width, height), kind)?;
        let body = root
            .titled(&chart.title, (FONT_FAMILY, CAPTION_SIZE))
            .map_err(failed(kind))?;
        let date_tick = |v: &f64| format_date(*v as i64);
        for (area, panel) in body.split_evenly((rows, cols)).iter().zip(&chart.panels) {
            let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (
                extent(panel.points.iter().map(|p| p.0 as f64)),
                extent(panel.points.iter().map(|p| p.1)),
            ) else {
                continue;
            };
            let points: Vec<(f64, f64)> =
                panel.points.iter().map(|&(t, v)| (t as f64, v)).collect();
            let mut cc = ChartBuilder::on(area)
                .caption(
                    format!("{} over {}", panel.y_label, panel.x_label),
                    (FONT_FAMILY, PANEL_CAPTION_SIZE),
                )
                .margin(8)
                .x_label_area_size(X_LABEL_AREA)
                .y_label_area_size(Y_LABEL_AREA)
                .build_cartesian_2d(padded_range(x_lo, x_hi), padded_range(y_lo, y_hi))
                .map_err(failed(kind))?;
            cc.configure_mesh()
                .x_labels(4)
                .x_label_formatter(&date_tick)
                .label_style((FONT_FAMILY, LABEL_SIZE - 2))
                .x_desc(panel.x_label.as_str())
                .y_desc(panel.y_label.as_str())
                .draw()
                .map_err(failed(kind))?;
            cc.draw_series(LineSeries::new(points.clone(), BAR_COLOR.stroke_width(2)))
                .map_err(failed(kind))?;
            cc.draw_series(
                points
                    .iter()
                    .map(|&point| Circle::new(point, 2, BAR_COLOR.filled())),
            )
            .map_err(failed(kind))?;
        }
        root.present().map_err(failed(kind))?;
        debug!(title = %chart.title, path = %path.display(), "Chart written");
        Ok(())
    }
}
