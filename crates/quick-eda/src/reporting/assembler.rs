use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::document::{
    ReportDocument, correlation_section, descriptive_section, missing_values_section,
    overview_section, relationship_section, trend_section,
};
use super::html::render_html;
use crate::config::EdaConfig;
use crate::error::{EdaError, Result};
use crate::types::{AnalysisStage, EdaReport, ExcludedColumn};

/// Turns an [`EdaReport`] into the HTML document on disk.
pub struct ReportAssembler {
    output_dir: PathBuf,
    document_path: PathBuf,
    title: String,
}

impl ReportAssembler {
    pub fn new(config: &EdaConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            document_path: config.document_path(),
            title: format!("Exploratory data analysis: {}", config.target_column),
        }
    }

    /// Build the ordered document.
    ///
    /// Images that are not on disk are left out: a descriptive section whose
    /// chart is missing is dropped and recorded as excluded, a relationship
    /// keeps its statistics without the figure, and so do the dataset
    /// diagnostics. Each omission adds a warning.
    pub fn assemble(&self, report: &mut EdaReport) -> ReportDocument {
        self.drop_missing_images(report);

        let present = |path: &Path| self.exists(path);
        let alpha = report.significance_level;
        let target = report.target.column.clone();

        let diagnostics = &report.diagnostics;
        let mut sections = vec![overview_section(report)];
        if !diagnostics.missing.columns.is_empty() {
            sections.push(missing_values_section(&diagnostics.missing, &present));
        }
        if let Some(matrix) = &diagnostics.correlation {
            sections.push(correlation_section(matrix, &present));
        }
        if let Some(trend) = &diagnostics.trend {
            sections.extend(trend_section(trend, &present));
        }
        sections.extend(report.descriptive.iter().map(|section| {
            let qq = diagnostics.qq_plot(&section.column);
            descriptive_section(section, alpha, qq, &present)
        }));
        sections.extend(
            report
                .relationships
                .iter()
                .filter_map(|result| relationship_section(result, &target, alpha, &present)),
        );

        ReportDocument {
            title: self.title.clone(),
            generated_at: report.generated_at.clone(),
            sections,
        }
    }

    /// Render and write the document, replacing any previous one.
    pub fn write(&self, document: &ReportDocument) -> Result<PathBuf> {
        let failed = |e: std::io::Error| {
            EdaError::ReportGenerationFailed(format!("{}: {e}", self.document_path.display()))
        };
        fs::create_dir_all(&self.output_dir).map_err(failed)?;

        let mut file = File::create(&self.document_path).map_err(failed)?;
        file.write_all(render_html(document).as_bytes())
            .map_err(failed)?;

        info!("Report saved: {}", self.document_path.display());
        Ok(self.document_path.clone())
    }

    fn exists(&self, relative: &Path) -> bool {
        self.output_dir.join(relative).is_file()
    }

    fn drop_missing_images(&self, report: &mut EdaReport) {
        let mut warnings = Vec::new();
        let mut excluded = Vec::new();

        report.descriptive.retain(|section| {
            if self.exists(&section.chart) {
                return true;
            }
            let reason = format!("chart image {} is missing", section.chart.display());
            warn!(column = %section.column, "{reason}");
            warnings.push(format!("'{}': {reason}; section omitted", section.column));
            excluded.push(ExcludedColumn::new(
                section.column.clone(),
                AnalysisStage::Summary,
                reason,
            ));
            false
        });

        for result in &mut report.relationships {
            let missing = result
                .chart
                .as_deref()
                .is_some_and(|chart| !self.exists(chart));
            if missing {
                if let Some(chart) = result.chart.take() {
                    warn!(
                        column = %result.column,
                        "Relationship chart {} is missing",
                        chart.display()
                    );
                    warnings.push(format!(
                        "'{}': chart image {} is missing; figure omitted",
                        result.column,
                        chart.display()
                    ));
                }
            }
        }

        // Q-Q plots are only shown inside their column's section.
        let summarized: Vec<String> =
            report.descriptive.iter().map(|s| s.column.clone()).collect();
        let diagnostics = &mut report.diagnostics;
        diagnostics.qq_plots.retain(|qq| {
            if !summarized.contains(&qq.column) {
                return false;
            }
            if self.exists(&qq.chart) {
                return true;
            }
            warn!(column = %qq.column, "Q-Q plot {} is missing", qq.chart.display());
            warnings.push(format!(
                "'{}': chart image {} is missing; Q-Q plot omitted",
                qq.column,
                qq.chart.display()
            ));
            false
        });

        let mut dataset_charts = vec![&mut diagnostics.missing.chart];
        if let Some(matrix) = diagnostics.correlation.as_mut() {
            dataset_charts.push(&mut matrix.chart);
        }
        if let Some(trend) = diagnostics.trend.as_mut() {
            dataset_charts.push(&mut trend.chart);
        }
        for slot in dataset_charts {
            let missing = slot.as_deref().is_some_and(|chart| !self.exists(chart));
            if missing {
                if let Some(chart) = slot.take() {
                    warn!("Dataset chart {} is missing", chart.display());
                    warnings.push(format!(
                        "chart image {} is missing; figure omitted",
                        chart.display()
                    ));
                }
            }
        }

        report.classification.excluded.extend(excluded);
        report.warnings.extend(warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CategoricalStats, CategoryCount, Classification, ColumnChart, ColumnRole,
        CorrelationMatrix, DatasetDiagnostics, DescriptiveSection, MissingCount,
        MissingValueSummary, SummaryStats, TargetSpec,
    };

    fn report(dir: &Path) -> EdaReport {
        EdaReport {
            generated_at: "2024-01-01 00:00:00".to_string(),
            document_path: dir.join("EDA.html"),
            visuals_dir: dir.join("_visuals"),
            rows: 4,
            columns: 1,
            target: TargetSpec {
                column: "group".to_string(),
                role: Some(ColumnRole::BinaryCategorical),
                identifier: None,
            },
            significance_level: 0.05,
            classification: Classification::default(),
            descriptive: vec![DescriptiveSection {
                column: "group".to_string(),
                role: ColumnRole::BinaryCategorical,
                stats: SummaryStats::Categorical(CategoricalStats {
                    count: 4,
                    missing: 0,
                    mode: "A".to_string(),
                    frequencies: vec![CategoryCount {
                        value: "A".to_string(),
                        count: 4,
                        percentage: 100.0,
                    }],
                }),
                chart: PathBuf::from("_visuals").join("00_group_bar.png"),
            }],
            relationships: Vec::new(),
            diagnostics: DatasetDiagnostics::default(),
            warnings: Vec::new(),
        }
    }

    fn config(dir: &Path) -> EdaConfig {
        EdaConfig::builder()
            .target_column("group")
            .output_dir(dir)
            .file_name("EDA")
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_image_drops_section_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = report(dir.path());

        let document = ReportAssembler::new(&config(dir.path())).assemble(&mut report);

        assert!(report.descriptive.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.excluded()[0].stage, AnalysisStage::Summary);
        assert_eq!(document.images().count(), 0);
        assert_eq!(document.sections.len(), 1);
    }

    #[test]
    fn test_write_overwrites_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let visuals = dir.path().join("_visuals");
        fs::create_dir_all(&visuals).unwrap();
        fs::write(visuals.join("00_group_bar.png"), b"png").unwrap();
        fs::write(dir.path().join("EDA.html"), "stale").unwrap();

        let assembler = ReportAssembler::new(&config(dir.path()));
        let mut report = report(dir.path());
        let document = assembler.assemble(&mut report);
        let path = assembler.write(&document).unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert_eq!(path, dir.path().join("EDA.html"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("src=\"_visuals/00_group_bar.png\""));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_diagnostics_sections_follow_overview() {
        let dir = tempfile::tempdir().unwrap();
        let visuals = dir.path().join("_visuals");
        fs::create_dir_all(&visuals).unwrap();
        fs::write(visuals.join("00_group_bar.png"), b"png").unwrap();
        fs::write(visuals.join("missing_values.png"), b"png").unwrap();

        let mut report = report(dir.path());
        report.diagnostics = DatasetDiagnostics {
            missing: MissingValueSummary {
                columns: vec![MissingCount {
                    column: "group".to_string(),
                    missing: 0,
                    percentage: 0.0,
                }],
                rows_per_band: 1,
                chart: Some(PathBuf::from("_visuals").join("missing_values.png")),
            },
            correlation: Some(CorrelationMatrix {
                columns: vec!["a".to_string(), "b".to_string()],
                coefficients: vec![vec![Some(1.0), Some(0.5)], vec![Some(0.5), Some(1.0)]],
                chart: Some(PathBuf::from("_visuals").join("correlation_heatmap.png")),
            }),
            qq_plots: vec![ColumnChart {
                column: "dropped".to_string(),
                chart: PathBuf::from("_visuals").join("05_dropped_qq.png"),
            }],
            trend: None,
        };

        let document = ReportAssembler::new(&config(dir.path())).assemble(&mut report);

        let headings: Vec<&str> = document.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings[1], "Missing values");
        assert_eq!(headings[2], "Correlation matrix");
        // The heatmap file was never written; its table stays.
        let matrix = report.diagnostics.correlation.as_ref().unwrap();
        assert!(matrix.chart.is_none());
        assert_eq!(document.sections[2].tables[0].rows.len(), 2);
        assert!(report.diagnostics.qq_plots.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(document.images().count(), 2);
    }
}
