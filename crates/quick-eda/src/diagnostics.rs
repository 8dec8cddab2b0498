//! Dataset-level diagnostics drawn after the per-column summaries.
//!
//! - Missing values per column and a banded missing-value map
//! - Pairwise Pearson correlations between continuous columns
//! - Normal Q-Q plots of summarized continuous columns
//! - Continuous columns plotted against datetime columns
//!
//! None of these views can abort a run: a view that cannot be computed or
//! drawn is logged, recorded as a warning and left out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, warn};

use crate::charts::{
    ChartKind, ChartRenderer, HeatmapChart, HeatmapScale, QqChart, TrendChart, TrendPanel,
};
use crate::config::{EdaConfig, VISUALS_DIR_NAME};
use crate::error::{EdaError, Result, ResultExt};
use crate::stats::pearson_correlation;
use crate::types::{
    Classification, ColumnChart, ColumnRole, CorrelationMatrix, DatasetDiagnostics,
    DescriptiveSection, MissingCount, MissingValueSummary, SummaryStats, TrendOverview,
};
use crate::utils::{chart_file_name, missing_mask, numeric_values, timestamp_values};

/// The missing-value map merges rows so it never has more bands than this.
const MAX_MISSING_BANDS: usize = 200;
/// Panels beyond this many (datetime, continuous) pairs are not drawn.
const MAX_TREND_PANELS: usize = 12;

/// Diagnostics plus warnings raised while drawing them.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsOutput {
    pub diagnostics: DatasetDiagnostics,
    pub warnings: Vec<String>,
}

/// Computes and draws the dataset-level views.
pub struct DiagnosticsAnalyzer<'a> {
    config: &'a EdaConfig,
    renderer: &'a dyn ChartRenderer,
}

impl<'a> DiagnosticsAnalyzer<'a> {
    pub fn new(config: &'a EdaConfig, renderer: &'a dyn ChartRenderer) -> Self {
        Self { config, renderer }
    }

    /// Compute every view for `df`.
    ///
    /// Q-Q plots are drawn only for columns in `summarized`, so each one sits
    /// next to an existing descriptive section.
    pub fn analyze(
        &self,
        df: &DataFrame,
        classification: &Classification,
        summarized: &[DescriptiveSection],
    ) -> DiagnosticsOutput {
        let mut output = DiagnosticsOutput::default();

        match self.missing_values(df) {
            Ok(missing) => output.diagnostics.missing = missing,
            Err(e) => skip(&mut output.warnings, "Missing-value summary", e),
        }
        let missing_chart =
            self.draw_missing_map(df, &output.diagnostics.missing, &mut output.warnings);
        output.diagnostics.missing.chart = missing_chart;

        match self.correlation_matrix(df, classification) {
            Ok(matrix) => output.diagnostics.correlation = matrix,
            Err(e) => skip(&mut output.warnings, "Correlation matrix", e),
        }
        let correlation_chart = output
            .diagnostics
            .correlation
            .as_ref()
            .and_then(|matrix| self.draw_correlation(matrix, &mut output.warnings));
        if let Some(matrix) = output.diagnostics.correlation.as_mut() {
            matrix.chart = correlation_chart;
        }

        for section in summarized {
            let SummaryStats::Continuous(stats) = &section.stats else {
                continue;
            };
            let Some(column) = classification.get(&section.column) else {
                continue;
            };
            let file_name = chart_file_name(column.index, &column.name, "qq");
            let drawn = self
                .qq_chart(df, &column.name, stats.mean, stats.std_dev)
                .and_then(|chart| match chart {
                    Some(chart) => self.render(&file_name, |path| {
                        self.renderer.qq_plot(path, &chart)
                    }),
                    None => Ok(None),
                });
            match drawn {
                Ok(Some(chart)) => output.diagnostics.qq_plots.push(ColumnChart {
                    column: column.name.clone(),
                    chart,
                }),
                Ok(None) => debug!(column = %column.name, "No Q-Q plot for two-valued column"),
                Err(e) => {
                    warn!(column = %column.name, "Q-Q plot skipped: {e}");
                    output.warnings.push(format!("'{}': {e}", column.name));
                }
            }
        }

        match self.trend(df, classification) {
            Ok(Some((panels, chart))) => {
                let file_name = format!("{}.png", ChartKind::Trend.file_suffix());
                let drawn = self.render(&file_name, |path| self.renderer.trend(path, &chart));
                let chart = drawn.unwrap_or_else(|e| {
                    skip(&mut output.warnings, "Line plots over time", e);
                    None
                });
                output.diagnostics.trend = Some(TrendOverview { panels, chart });
            }
            Ok(None) => {}
            Err(e) => skip(&mut output.warnings, "Line plots over time", e),
        }

        debug!(
            images = output.diagnostics.image_count(),
            "Dataset diagnostics computed"
        );
        output
    }

    // ------------------------------------------------------------------
    // Missing values
    // ------------------------------------------------------------------

    fn missing_values(&self, df: &DataFrame) -> Result<MissingValueSummary> {
        let rows = df.height();
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let name = column.name().as_str();
            let mask = missing_mask(column.as_materialized_series())
                .context(format!("Reading missing values of '{name}'"))?;
            let missing = mask.iter().filter(|m| **m).count();
            columns.push(MissingCount {
                column: name.to_string(),
                missing,
                percentage: percentage(missing, rows),
            });
        }
        Ok(MissingValueSummary {
            columns,
            rows_per_band: rows.div_ceil(MAX_MISSING_BANDS).max(1),
            chart: None,
        })
    }

    fn draw_missing_map(
        &self,
        df: &DataFrame,
        summary: &MissingValueSummary,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        if summary.columns.is_empty() {
            return None;
        }
        let chart = missing_map(df, summary.rows_per_band);
        let file_name = format!("{}.png", ChartKind::MissingValues.file_suffix());
        let drawn = chart.and_then(|chart| {
            self.render(&file_name, |path| {
                self.renderer.heatmap(path, ChartKind::MissingValues, &chart)
            })
        });
        drawn.unwrap_or_else(|e| {
            skip(warnings, "Missing-value map", e);
            None
        })
    }

    // ------------------------------------------------------------------
    // Correlations
    // ------------------------------------------------------------------

    fn correlation_matrix(
        &self,
        df: &DataFrame,
        classification: &Classification,
    ) -> Result<Option<CorrelationMatrix>> {
        let continuous: Vec<&str> = classification
            .with_role(ColumnRole::Continuous)
            .map(|c| c.name.as_str())
            .collect();
        if continuous.len() < 2 {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(continuous.len());
        for name in &continuous {
            values.push(read_numeric(df, name)?);
        }
        Ok(Some(CorrelationMatrix {
            columns: continuous.iter().map(|c| c.to_string()).collect(),
            coefficients: correlation_grid(&values),
            chart: None,
        }))
    }

    fn draw_correlation(
        &self,
        matrix: &CorrelationMatrix,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        let chart = HeatmapChart {
            title: "Correlation matrix (Pearson r)".to_string(),
            x_labels: matrix.columns.clone(),
            y_labels: matrix.columns.clone(),
            cells: matrix.coefficients.clone(),
            scale: HeatmapScale::Diverging,
            annotate: true,
        };
        let file_name = format!("{}.png", ChartKind::CorrelationHeatmap.file_suffix());
        self.render(&file_name, |path| {
            self.renderer
                .heatmap(path, ChartKind::CorrelationHeatmap, &chart)
        })
        .unwrap_or_else(|e| {
            skip(warnings, "Correlation heatmap", e);
            None
        })
    }

    // ------------------------------------------------------------------
    // Q-Q plots
    // ------------------------------------------------------------------

    /// `None` when the column has two or fewer distinct values.
    fn qq_chart(
        &self,
        df: &DataFrame,
        name: &str,
        mean: f64,
        std_dev: f64,
    ) -> Result<Option<QqChart>> {
        let mut sorted: Vec<f64> = read_numeric(df, name)?.into_iter().flatten().collect();
        sorted.sort_by(f64::total_cmp);
        let mut distinct = sorted.clone();
        distinct.dedup();
        if distinct.len() <= 2 {
            return Ok(None);
        }

        let theoretical =
            normal_quantiles(sorted.len()).map_err(|e| EdaError::chart("Q-Q plot", e))?;
        let (Some(&low), Some(&high)) = (theoretical.first(), theoretical.last()) else {
            return Ok(None);
        };
        Ok(Some(QqChart {
            title: format!("Normal Q-Q plot of {name}"),
            points: theoretical.into_iter().zip(sorted).collect(),
            reference: [
                (low, mean + std_dev * low),
                (high, mean + std_dev * high),
            ],
        }))
    }

    // ------------------------------------------------------------------
    // Trends
    // ------------------------------------------------------------------

    fn trend(
        &self,
        df: &DataFrame,
        classification: &Classification,
    ) -> Result<Option<(Vec<(String, String)>, TrendChart)>> {
        let datetimes: Vec<&str> = classification
            .with_role(ColumnRole::Datetime)
            .map(|c| c.name.as_str())
            .collect();
        let continuous: Vec<&str> = classification
            .with_role(ColumnRole::Continuous)
            .map(|c| c.name.as_str())
            .collect();
        if datetimes.is_empty() || continuous.is_empty() {
            return Ok(None);
        }

        let mut numeric = Vec::with_capacity(continuous.len());
        for name in &continuous {
            numeric.push(read_numeric(df, name)?);
        }

        let mut names = Vec::new();
        let mut panels = Vec::new();
        'outer: for time_column in &datetimes {
            let times = timestamp_values(column_series(df, time_column)?)
                .map_err(|e| diagnostics_error(time_column, e))?;
            for (value_column, values) in continuous.iter().zip(&numeric) {
                if panels.len() == MAX_TREND_PANELS {
                    warn!("Only the first {MAX_TREND_PANELS} time series are drawn");
                    break 'outer;
                }
                let points = mean_per_timestamp(&times, values);
                if points.len() < 2 {
                    continue;
                }
                names.push((time_column.to_string(), value_column.to_string()));
                panels.push(TrendPanel {
                    x_label: time_column.to_string(),
                    y_label: value_column.to_string(),
                    points,
                });
            }
        }

        if panels.is_empty() {
            return Ok(None);
        }
        Ok(Some((
            names,
            TrendChart {
                title: "Numeric columns over time".to_string(),
                panels,
            },
        )))
    }

    /// Draw into `_visuals/<file_name>`; a failed draw leaves no file behind.
    fn render(
        &self,
        file_name: &str,
        draw: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<Option<PathBuf>> {
        let path = self.config.visuals_dir().join(file_name);
        match draw(&path) {
            Ok(()) => Ok(Some(PathBuf::from(VISUALS_DIR_NAME).join(file_name))),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }
}

fn skip(warnings: &mut Vec<String>, view: &str, e: EdaError) {
    warn!("{view} skipped: {e}");
    warnings.push(format!("{view}: {e}"));
}

fn diagnostics_error(column: &str, reason: impl std::fmt::Display) -> EdaError {
    EdaError::StatisticsFailed {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

fn column_series<'df>(df: &'df DataFrame, name: &str) -> Result<&'df Series> {
    Ok(df
        .column(name)
        .map_err(|e| diagnostics_error(name, e))?
        .as_materialized_series())
}

fn read_numeric(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    numeric_values(column_series(df, name)?).map_err(|e| diagnostics_error(name, e))
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Fraction of missing entries per band of `rows_per_band` rows and column.
fn missing_map(df: &DataFrame, rows_per_band: usize) -> Result<HeatmapChart> {
    let rows = df.height();
    let bands = rows.div_ceil(rows_per_band).max(1);
    let mut cells = vec![vec![Some(0.0); df.width()]; bands];
    let mut x_labels = Vec::with_capacity(df.width());

    for (col, column) in df.get_columns().iter().enumerate() {
        let name = column.name().as_str();
        x_labels.push(name.to_string());
        let mask = missing_mask(column.as_materialized_series())
            .map_err(|e| diagnostics_error(name, e))?;
        for (band, chunk) in mask.chunks(rows_per_band).enumerate() {
            let missing = chunk.iter().filter(|m| **m).count();
            cells[band][col] = Some(missing as f64 / chunk.len() as f64);
        }
    }

    let y_labels = (0..bands)
        .map(|band| (band * rows_per_band).to_string())
        .collect();
    Ok(HeatmapChart {
        title: "Missing values by row".to_string(),
        x_labels,
        y_labels,
        cells,
        scale: HeatmapScale::Sequential,
        annotate: false,
    })
}

/// Symmetric grid of pairwise-complete Pearson coefficients.
fn correlation_grid(columns: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
    let n = columns.len();
    let mut grid = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let (x, y): (Vec<f64>, Vec<f64>) = columns[i]
                .iter()
                .zip(&columns[j])
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .unzip();
            let r = pearson_correlation(&x, &y).ok().map(|t| t.statistic);
            grid[i][j] = r;
            grid[j][i] = r;
        }
    }
    grid
}

/// Standard normal quantiles at Filliben's plotting positions.
fn normal_quantiles(n: usize) -> std::result::Result<Vec<f64>, String> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| e.to_string())?;
    let last = 0.5_f64.powf(1.0 / n as f64);
    Ok((1..=n)
        .map(|i| {
            let position = if i == 1 {
                1.0 - last
            } else if i == n {
                last
            } else {
                (i as f64 - 0.3175) / (n as f64 + 0.365)
            };
            normal.inverse_cdf(position)
        })
        .collect())
}

/// Mean value per timestamp over rows holding both, in time order.
fn mean_per_timestamp(times: &[Option<i64>], values: &[Option<f64>]) -> Vec<(i64, f64)> {
    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (time, value) in times.iter().zip(values) {
        if let (Some(time), Some(value)) = (time, value) {
            let entry = sums.entry(*time).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(time, (sum, count))| (time, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{
        BarChart, BoxplotChart, GroupedBarChart, HistogramChart, PlottersRenderer,
        ScatterChart, TimelineChart,
    };
    use crate::profiler::ColumnClassifier;
    use crate::summarizer::DescriptiveSummarizer;
    use pretty_assertions::assert_eq;

    fn config(dir: &Path) -> EdaConfig {
        EdaConfig::builder()
            .target_column("group")
            .output_dir(dir)
            .chart_size(240, 160)
            .build()
            .unwrap()
    }

    fn sample_df() -> DataFrame {
        let day = 86_400_000i64;
        let visits: Vec<i64> = (0..8).map(|i| i * day).collect();
        let mut df = df! {
            "age" => &[
                Some(21.0), Some(35.0), None, Some(52.0),
                Some(33.0), Some(47.0), Some(29.0), Some(41.0),
            ],
            "score" => &[3.1, 4.0, 4.4, 6.2, 3.9, 5.8, 3.5, 5.0],
            "group" => &["A", "B", "A", "B", "A", "B", "A", "B"],
            "visit" => &visits,
        }
        .unwrap();
        let visit = df
            .column("visit")
            .unwrap()
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        df.with_column(visit).unwrap();
        df
    }

    fn setup(dir: &Path, df: &DataFrame) -> (EdaConfig, Classification) {
        let config = config(dir);
        std::fs::create_dir_all(config.visuals_dir()).unwrap();
        let classification = ColumnClassifier::classify_dataset(df, None).unwrap();
        (config, classification)
    }

    fn summaries(
        config: &EdaConfig,
        df: &DataFrame,
        classification: &Classification,
    ) -> Vec<DescriptiveSection> {
        let renderer = PlottersRenderer::new(240, 160);
        let summarizer = DescriptiveSummarizer::new(config, &renderer);
        classification
            .columns
            .iter()
            .filter_map(|c| summarizer.summarize(df, c).ok())
            .collect()
    }

    struct FailingRenderer;

    impl ChartRenderer for FailingRenderer {
        fn histogram(&self, _: &Path, _: &HistogramChart) -> Result<()> {
            Err(EdaError::chart("histogram", "disabled"))
        }
        fn bar_chart(&self, _: &Path, _: &BarChart) -> Result<()> {
            Err(EdaError::chart("bar chart", "disabled"))
        }
        fn timeline(&self, _: &Path, _: &TimelineChart) -> Result<()> {
            Err(EdaError::chart("line chart", "disabled"))
        }
        fn boxplot(&self, _: &Path, _: &BoxplotChart) -> Result<()> {
            Err(EdaError::chart("grouped boxplot", "disabled"))
        }
        fn scatter(&self, _: &Path, _: &ScatterChart) -> Result<()> {
            Err(EdaError::chart("scatter plot", "disabled"))
        }
        fn grouped_bar(&self, _: &Path, _: &GroupedBarChart) -> Result<()> {
            Err(EdaError::chart("grouped bar chart", "disabled"))
        }
        fn qq_plot(&self, _: &Path, _: &QqChart) -> Result<()> {
            Err(EdaError::chart("Q-Q plot", "disabled"))
        }
        fn heatmap(&self, _: &Path, kind: ChartKind, _: &HeatmapChart) -> Result<()> {
            Err(EdaError::chart(kind.display_name(), "disabled"))
        }
        fn trend(&self, _: &Path, _: &TrendChart) -> Result<()> {
            Err(EdaError::chart("line plots over time", "disabled"))
        }
    }

    #[test]
    fn test_normal_quantiles_are_symmetric() {
        let q = normal_quantiles(5).unwrap();
        assert_eq!(q.len(), 5);
        assert!(q[2].abs() < 1e-9);
        for i in 0..5 {
            assert!((q[i] + q[4 - i]).abs() < 1e-9);
        }
        assert!(q.windows(2).all(|w| w[0] < w[1]));
        // Filliben's first position for n = 5 is 1 - 0.5^(1/5).
        let first = Normal::new(0.0, 1.0)
            .unwrap()
            .inverse_cdf(1.0 - 0.5_f64.powf(0.2));
        assert!((q[0] - first).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_grid_uses_complete_pairs() {
        let grid = correlation_grid(&[
            vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
            vec![Some(2.0), Some(4.0), Some(100.0), Some(8.0), Some(10.0)],
            vec![Some(7.0), Some(7.0), Some(7.0), Some(7.0), Some(7.0)],
        ]);
        // The row with a missing value in the first column is skipped.
        assert!((grid[0][1].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(grid[0][1], grid[1][0]);
        assert!((grid[0][0].unwrap() - 1.0).abs() < 1e-12);
        // A constant column has no defined coefficient.
        assert_eq!(grid[2][0], None);
        assert_eq!(grid[2][2], None);
    }

    #[test]
    fn test_mean_per_timestamp_merges_duplicates() {
        let times = [Some(20), Some(10), Some(20), None, Some(30)];
        let values = [Some(1.0), Some(5.0), Some(3.0), Some(9.0), None];
        assert_eq!(
            mean_per_timestamp(&times, &values),
            vec![(10, 5.0), (20, 2.0)]
        );
    }

    #[test]
    fn test_missing_map_bands() {
        let df = df! {
            "a" => &[Some(1.0), None, Some(3.0), Some(f64::NAN), Some(5.0)],
            "b" => &[Some("x"), Some("y"), Some("x"), Some("y"), None],
        }
        .unwrap();
        let chart = missing_map(&df, 2).unwrap();
        assert_eq!(chart.y_labels, vec!["0", "2", "4"]);
        assert_eq!(chart.x_labels, vec!["a", "b"]);
        assert_eq!(chart.cells[0], vec![Some(0.5), Some(0.0)]);
        assert_eq!(chart.cells[1], vec![Some(0.5), Some(0.0)]);
        assert_eq!(chart.cells[2], vec![Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_analyze_writes_every_view() {
        let dir = tempfile::tempdir().unwrap();
        let df = sample_df();
        let (config, classification) = setup(dir.path(), &df);
        let summarized = summaries(&config, &df, &classification);
        let renderer = PlottersRenderer::new(240, 160);

        let output =
            DiagnosticsAnalyzer::new(&config, &renderer).analyze(&df, &classification, &summarized);
        let diagnostics = &output.diagnostics;

        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
        let age = &diagnostics.missing.columns[0];
        assert_eq!((age.column.as_str(), age.missing), ("age", 1));
        assert_eq!(diagnostics.missing.total_missing(), 1);
        assert_eq!(diagnostics.missing.rows_per_band, 1);

        let matrix = diagnostics.correlation.as_ref().unwrap();
        assert_eq!(matrix.columns, vec!["age", "score"]);
        assert!(matrix.coefficients[0][1].unwrap() > 0.5);

        let qq: Vec<&str> = diagnostics.qq_plots.iter().map(|q| q.column.as_str()).collect();
        assert_eq!(qq, vec!["age", "score"]);
        assert_eq!(
            diagnostics.qq_plot("age"),
            Some(Path::new("_visuals/00_age_qq.png"))
        );

        let trend = diagnostics.trend.as_ref().unwrap();
        assert_eq!(
            trend.panels,
            vec![
                ("visit".to_string(), "age".to_string()),
                ("visit".to_string(), "score".to_string())
            ]
        );

        assert_eq!(diagnostics.image_count(), 5);
        for name in [
            "missing_values.png",
            "correlation_heatmap.png",
            "00_age_qq.png",
            "01_score_qq.png",
            "numeric_over_time.png",
        ] {
            assert!(config.visuals_dir().join(name).is_file(), "{name} missing");
        }
    }

    #[test]
    fn test_two_valued_column_has_no_qq_plot() {
        let dir = tempfile::tempdir().unwrap();
        let df = df! {
            "dose" => &[0.0, 1.0, 0.0, 1.0, 1.0],
            "group" => &["A", "B", "A", "B", "A"],
        }
        .unwrap();
        let (config, classification) = setup(dir.path(), &df);
        let summarized = summaries(&config, &df, &classification);
        let renderer = PlottersRenderer::new(240, 160);

        let output =
            DiagnosticsAnalyzer::new(&config, &renderer).analyze(&df, &classification, &summarized);
        assert!(output.diagnostics.qq_plots.is_empty());
        assert!(output.diagnostics.correlation.is_none());
        assert!(output.diagnostics.trend.is_none());
        assert!(output.diagnostics.missing.chart.is_some());
    }

    #[test]
    fn test_chart_failures_keep_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let df = sample_df();
        let (config, classification) = setup(dir.path(), &df);
        let summarized = summaries(&config, &df, &classification);

        let output = DiagnosticsAnalyzer::new(&config, &FailingRenderer).analyze(
            &df,
            &classification,
            &summarized,
        );
        let diagnostics = &output.diagnostics;

        assert_eq!(diagnostics.image_count(), 0);
        assert_eq!(diagnostics.missing.columns.len(), 4);
        assert!(diagnostics.correlation.as_ref().unwrap().chart.is_none());
        assert!(diagnostics.trend.as_ref().unwrap().chart.is_none());
        // Missing map, heatmap, two Q-Q plots and the trend chart.
        assert_eq!(output.warnings.len(), 5);
    }
}
