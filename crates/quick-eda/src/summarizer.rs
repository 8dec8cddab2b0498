//! Descriptive summaries: one statistics block and one chart per column.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::charts::{BarChart, ChartKind, ChartRenderer, HistogramChart, TimelineChart};
use crate::config::{EdaConfig, VISUALS_DIR_NAME};
use crate::error::{EdaError, Result, ResultExt};
use crate::profiler::{categorical_stats, continuous_stats, datetime_stats};
use crate::types::{ClassifiedColumn, ColumnRole, DescriptiveSection, SummaryStats};
use crate::utils::{
    build_histogram, chart_file_name, numeric_values, string_values, timestamp_values,
};

/// Builds the descriptive section of a classified column.
pub struct DescriptiveSummarizer<'a> {
    config: &'a EdaConfig,
    renderer: &'a dyn ChartRenderer,
}

impl<'a> DescriptiveSummarizer<'a> {
    pub fn new(config: &'a EdaConfig, renderer: &'a dyn ChartRenderer) -> Self {
        Self { config, renderer }
    }

    /// Compute statistics for `column` and write its default chart.
    ///
    /// Statistic and chart failures come back as non-fatal errors; the caller
    /// drops the section and keeps going.
    pub fn summarize(
        &self,
        df: &DataFrame,
        column: &ClassifiedColumn,
    ) -> Result<DescriptiveSection> {
        let name = column.name.as_str();
        let series = df
            .column(name)
            .context(format!("Reading column '{name}'"))?
            .as_materialized_series();

        let kind = match column.role {
            ColumnRole::Continuous => ChartKind::Histogram,
            ColumnRole::BinaryCategorical => ChartKind::Bar,
            ColumnRole::Datetime => ChartKind::Timeline,
            ColumnRole::Identifier | ColumnRole::Unclassified => {
                return Err(stats_error(
                    name,
                    format!("{} columns have no descriptive summary", column.role),
                ));
            }
        };
        let file_name = chart_file_name(column.index, name, kind.file_suffix());
        let path = self.config.visuals_dir().join(&file_name);

        let stats = match column.role {
            ColumnRole::Continuous => {
                let values = numeric_values(series).map_err(|e| stats_error(name, e))?;
                let stats = continuous_stats(name, &values, self.config.significance_level)?;
                self.render_histogram(&path, name, &values)?;
                SummaryStats::Continuous(stats)
            }
            ColumnRole::BinaryCategorical => {
                let values = string_values(series).map_err(|e| stats_error(name, e))?;
                let stats = categorical_stats(name, &values)?;
                self.renderer.bar_chart(
                    &path,
                    &BarChart {
                        title: format!("Frequencies of {name}"),
                        x_label: name.to_string(),
                        bars: stats
                            .frequencies
                            .iter()
                            .map(|f| (f.value.clone(), f.count))
                            .collect(),
                    },
                )?;
                SummaryStats::Categorical(stats)
            }
            _ => {
                let values = timestamp_values(series).map_err(|e| stats_error(name, e))?;
                let stats = datetime_stats(name, &values)?;
                self.renderer.timeline(
                    &path,
                    &TimelineChart {
                        title: format!("Observations of {name} per {}", stats.granularity),
                        points: stats
                            .buckets
                            .iter()
                            .map(|b| (b.label.clone(), b.count))
                            .collect(),
                    },
                )?;
                SummaryStats::Datetime(stats)
            }
        };
        debug!(column = name, chart = %file_name, "Summarized column");

        Ok(DescriptiveSection {
            column: column.name.clone(),
            role: column.role,
            stats,
            chart: PathBuf::from(VISUALS_DIR_NAME).join(file_name),
        })
    }

    fn render_histogram(&self, path: &Path, name: &str, values: &[Option<f64>]) -> Result<()> {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        sorted.sort_by(f64::total_cmp);
        self.renderer.histogram(
            path,
            &HistogramChart {
                title: format!("Distribution of {name}"),
                x_label: name.to_string(),
                bins: build_histogram(&sorted, self.config.histogram_bins),
            },
        )
    }
}

fn stats_error(column: &str, reason: impl std::fmt::Display) -> EdaError {
    EdaError::StatisticsFailed {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}
