//! Chart rendering seam.
//!
//! The pipeline describes each chart as plain data and hands it to a
//! [`ChartRenderer`], which writes one PNG per call. [`PlottersRenderer`] is
//! the default implementation; tests and embedders can inject their own.

mod plotters_renderer;

use std::path::Path;

use crate::error::Result;
use crate::utils::HistogramBin;

pub use plotters_renderer::PlottersRenderer;

/// Kinds of chart the pipeline produces, used in image file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Histogram,
    Bar,
    Timeline,
    Boxplot,
    Scatter,
    GroupedBar,
    QqPlot,
    CorrelationHeatmap,
    MissingValues,
    Trend,
}

impl ChartKind {
    /// Suffix in `<NN>_<column>_<suffix>.png`, or the whole stem of a
    /// dataset-level image.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Bar => "bar",
            Self::Timeline => "timeline",
            Self::Boxplot => "boxplot",
            Self::Scatter => "scatter",
            Self::GroupedBar => "grouped_bar",
            Self::QqPlot => "qq",
            Self::CorrelationHeatmap => "correlation_heatmap",
            Self::MissingValues => "missing_values",
            Self::Trend => "numeric_over_time",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Bar => "bar chart",
            Self::Timeline => "line chart",
            Self::Boxplot => "grouped boxplot",
            Self::Scatter => "scatter plot",
            Self::GroupedBar => "grouped bar chart",
            Self::QqPlot => "Q-Q plot",
            Self::CorrelationHeatmap => "correlation heatmap",
            Self::MissingValues => "missing-value map",
            Self::Trend => "line plots over time",
        }
    }
}

/// Distribution of a continuous column.
#[derive(Debug, Clone)]
pub struct HistogramChart {
    pub title: String,
    pub x_label: String,
    pub bins: Vec<HistogramBin>,
}

/// Counts per category.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub bars: Vec<(String, usize)>,
}

/// Counts per ordered time bucket.
#[derive(Debug, Clone)]
pub struct TimelineChart {
    pub title: String,
    pub points: Vec<(String, usize)>,
}

/// One box per group.
#[derive(Debug, Clone)]
pub struct BoxplotChart {
    pub title: String,
    /// Column holding the group labels.
    pub x_label: String,
    /// Column holding the values.
    pub y_label: String,
    pub groups: Vec<(String, Vec<f64>)>,
}

/// Paired observations of two continuous columns.
#[derive(Debug, Clone)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
}

/// Contingency counts: one cluster per category, one bar per series.
#[derive(Debug, Clone)]
pub struct GroupedBarChart {
    pub title: String,
    /// Column whose levels form the clusters.
    pub x_label: String,
    /// Column whose levels form the bars inside each cluster.
    pub series_label: String,
    pub categories: Vec<String>,
    pub series: Vec<String>,
    /// `counts[category][series]`
    pub counts: Vec<Vec<usize>>,
}

/// Sample quantiles against standard normal quantiles.
#[derive(Debug, Clone)]
pub struct QqChart {
    pub title: String,
    /// `(theoretical, sample)` pairs in ascending order.
    pub points: Vec<(f64, f64)>,
    /// End points of the reference line.
    pub reference: [(f64, f64); 2],
}

/// Colour scale of a heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapScale {
    /// Values in `[-1, 1]`, blue through white to red.
    Diverging,
    /// Values in `[0, 1]`, white to dark.
    Sequential,
}

/// A grid of cells; `cells[row][column]`, `None` drawn as undefined.
#[derive(Debug, Clone)]
pub struct HeatmapChart {
    pub title: String,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
    pub scale: HeatmapScale,
    /// Print each value inside its cell.
    pub annotate: bool,
}

/// One continuous column over one datetime column.
#[derive(Debug, Clone)]
pub struct TrendPanel {
    pub x_label: String,
    pub y_label: String,
    /// `(timestamp in ms, value)` sorted by time.
    pub points: Vec<(i64, f64)>,
}

/// Several trend panels in one image.
#[derive(Debug, Clone)]
pub struct TrendChart {
    pub title: String,
    pub panels: Vec<TrendPanel>,
}

/// Writes chart images.
///
/// Every method writes exactly one image at `path` or returns
/// [`crate::EdaError::ChartFailed`]; callers treat failures as recoverable.
pub trait ChartRenderer: Send + Sync {
    fn histogram(&self, path: &Path, chart: &HistogramChart) -> Result<()>;

    fn bar_chart(&self, path: &Path, chart: &BarChart) -> Result<()>;

    fn timeline(&self, path: &Path, chart: &TimelineChart) -> Result<()>;

    fn boxplot(&self, path: &Path, chart: &BoxplotChart) -> Result<()>;

    fn scatter(&self, path: &Path, chart: &ScatterChart) -> Result<()>;

    fn grouped_bar(&self, path: &Path, chart: &GroupedBarChart) -> Result<()>;

    fn qq_plot(&self, path: &Path, chart: &QqChart) -> Result<()>;

    fn heatmap(&self, path: &Path, kind: ChartKind, chart: &HeatmapChart) -> Result<()>;

    fn trend(&self, path: &Path, chart: &TrendChart) -> Result<()>;
}
