//! Integration tests for the EDA pipeline.
//!
//! These tests run the pipeline end to end on small CSV fixtures and check
//! both the returned report and the files written to disk.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use quick_eda::charts::{
    BarChart, BoxplotChart, ChartKind, GroupedBarChart, HeatmapChart, HistogramChart, QqChart,
    ScatterChart, TimelineChart, TrendChart,
};
use quick_eda::{
    AnalysisStage, ChartRenderer, ColumnRole, EdaConfig, EdaError, EdaPipeline, EdaReport,
    PairingPolicy, PairingStatus, TestKind, run_eda,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn config(output: &Path, target: &str, identifier: Option<&str>) -> EdaConfig {
    let mut builder = EdaConfig::builder()
        .target_column(target)
        .output_dir(output)
        .chart_size(240, 160);
    if let Some(id) = identifier {
        builder = builder.identifier_column(id);
    }
    builder.build().expect("valid config")
}

fn run(df: &DataFrame, config: EdaConfig) -> EdaReport {
    EdaPipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run(df)
        .unwrap()
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Renderer whose every call fails.
struct FailingRenderer;

impl ChartRenderer for FailingRenderer {
    fn histogram(&self, _: &Path, _: &HistogramChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("histogram", "renderer unavailable"))
    }

    fn bar_chart(&self, _: &Path, _: &BarChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("bar chart", "renderer unavailable"))
    }

    fn timeline(&self, _: &Path, _: &TimelineChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("line chart", "renderer unavailable"))
    }

    fn boxplot(&self, _: &Path, _: &BoxplotChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("grouped boxplot", "renderer unavailable"))
    }

    fn scatter(&self, _: &Path, _: &ScatterChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("scatter plot", "renderer unavailable"))
    }

    fn grouped_bar(&self, _: &Path, _: &GroupedBarChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("grouped bar chart", "renderer unavailable"))
    }

    fn qq_plot(&self, _: &Path, _: &QqChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("Q-Q plot", "renderer unavailable"))
    }

    fn heatmap(&self, _: &Path, kind: ChartKind, _: &HeatmapChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart(kind.display_name(), "renderer unavailable"))
    }

    fn trend(&self, _: &Path, _: &TrendChart) -> quick_eda::EdaResult<()> {
        Err(EdaError::chart("line plots over time", "renderer unavailable"))
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_end_to_end_age_by_group_with_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv")
        .select(["age", "group", "id"])
        .unwrap();

    let report = run(&df, config(dir.path(), "group", Some("id")));

    assert_eq!(report.descriptive_section("age").unwrap().role, ColumnRole::Continuous);
    let age = report.relationship("age").expect("age compared with group");
    assert_eq!(age.test, TestKind::PairedTTest);
    assert_eq!(age.pairing, PairingStatus::Paired { pairs: 6 });
    let p = age.p_value().unwrap();
    assert!((0.0..=1.0).contains(&p));

    assert!(report.relationship("id").is_none());
    assert_eq!(report.classification.role_of("id"), Some(ColumnRole::Identifier));

    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("age vs group"));
    assert!(!html.contains("id vs group"));
    assert!(html.contains("Paired t-test"));
}

#[test]
fn test_continuous_feature_without_identifier_uses_two_sample_t_test() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv");

    let report = run(&df, config(dir.path(), "group", None));

    let age = report.relationship("age").unwrap();
    assert_eq!(
        age.test,
        TestKind::IndependentTTest {
            equal_variance: true
        }
    );
    assert_eq!(age.pairing, PairingStatus::NotRequested);
    assert!((0.0..=1.0).contains(&age.p_value().unwrap()));
    assert!(report.relationship("id").is_some_and(|r| r.test != TestKind::PairedTTest));
}

#[test]
fn test_full_fixture_roles_and_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv");

    let report = run(&df, config(dir.path(), "group", Some("id")));
    let role = |name: &str| report.classification.role_of(name);

    assert_eq!(role("age"), Some(ColumnRole::Continuous));
    assert_eq!(role("smoker"), Some(ColumnRole::BinaryCategorical));
    assert_eq!(role("visit_date"), Some(ColumnRole::Datetime));
    assert_eq!(role("city"), Some(ColumnRole::Unclassified));

    let smoker = report.relationship("smoker").unwrap();
    assert_eq!(smoker.test, TestKind::ChiSquareIndependence);
    assert!(smoker.is_computed());

    let excluded = report.excluded();
    let stage_of = |name: &str| {
        excluded
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.stage)
    };
    assert_eq!(stage_of("comment"), Some(AnalysisStage::Classification));
    assert_eq!(stage_of("city"), Some(AnalysisStage::Classification));
    assert_eq!(stage_of("visit_date"), Some(AnalysisStage::Relationship));
    assert!(report.descriptive_section("visit_date").is_some());
}

#[test]
fn test_all_missing_column_is_excluded_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv");

    let report = run(&df, config(dir.path(), "group", None));

    assert!(report.classification.get("comment").is_none());
    assert!(report.descriptive_section("comment").is_none());
    assert!(report.relationship("comment").is_none());
    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("comment"));
}

#[test]
fn test_continuous_target() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("continuous_target.csv");

    let report = run(&df, config(dir.path(), "height", None));

    let weight = report.relationship("weight").unwrap();
    assert_eq!(weight.test, TestKind::PearsonCorrelation);
    assert!(weight.statistic().unwrap() > 0.9);
    assert!(weight.is_significant());

    let sex = report.relationship("sex").unwrap();
    assert!(matches!(sex.test, TestKind::IndependentTTest { .. }));
    assert_eq!(sex.groups.len(), 2);
}

// ============================================================================
// Pairing fallback
// ============================================================================

#[test]
fn test_duplicate_identifier_falls_back_to_unpaired_test() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("duplicate_ids.csv");

    let report = run(&df, config(dir.path(), "group", Some("id")));

    let age = report.relationship("age").unwrap();
    assert!(age.fell_back_to_unpaired());
    assert!(matches!(age.test, TestKind::IndependentTTest { .. }));
    assert!(age.is_computed());

    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("independent two-sample test was used"));
}

#[test]
fn test_drop_unmatched_policy_pairs_remaining_rows() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv").head(Some(11));
    let config = EdaConfig::builder()
        .target_column("group")
        .identifier_column("id")
        .output_dir(dir.path())
        .pairing_policy(PairingPolicy::DropUnmatched)
        .chart_size(240, 160)
        .build()
        .unwrap();

    let report = run(&df, config);

    let age = report.relationship("age").unwrap();
    assert_eq!(age.pairing, PairingStatus::Paired { pairs: 5 });
}

#[test]
fn test_missing_identifier_falls_back_under_strict_pairing() {
    let dir = tempfile::tempdir().unwrap();
    let df = df! {
        "id" => &[Some(1i64), Some(2), Some(3), None, Some(5), Some(6),
                  Some(1), Some(2), Some(3), Some(4), Some(5), Some(6)],
        "age" => &[30.5, 41.2, 25.0, 36.8, 29.9, 45.3, 32.0, 41.0, 27.5, 38.1, 31.4, 46.0],
        "group" => &["A", "A", "A", "A", "A", "A", "B", "B", "B", "B", "B", "B"],
    }
    .unwrap();

    let report = run(&df, config(dir.path(), "group", Some("id")));

    let age = report.relationship("age").unwrap();
    assert!(age.fell_back_to_unpaired());
    assert!(matches!(age.test, TestKind::IndependentTTest { .. }));
    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("independent two-sample test was used"));
}

#[test]
fn test_missing_identifier_row_is_dropped_when_unmatched_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let df = df! {
        "id" => &[Some(1i64), Some(2), Some(3), None, Some(5), Some(6),
                  Some(1), Some(2), Some(3), Some(4), Some(5), Some(6)],
        "age" => &[30.5, 41.2, 25.0, 36.8, 29.9, 45.3, 32.0, 41.0, 27.5, 38.1, 31.4, 46.0],
        "group" => &["A", "A", "A", "A", "A", "A", "B", "B", "B", "B", "B", "B"],
    }
    .unwrap();
    let config = EdaConfig::builder()
        .target_column("group")
        .identifier_column("id")
        .output_dir(dir.path())
        .pairing_policy(PairingPolicy::DropUnmatched)
        .chart_size(240, 160)
        .build()
        .unwrap();

    let report = run(&df, config);

    let age = report.relationship("age").unwrap();
    assert_eq!(age.pairing, PairingStatus::Paired { pairs: 5 });
}

// ============================================================================
// Dataset diagnostics
// ============================================================================

#[test]
fn test_dataset_diagnostics_are_written_and_linked() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv");

    let report = run(&df, config(dir.path(), "group", Some("id")));
    let diagnostics = &report.diagnostics;

    let comment = diagnostics
        .missing
        .columns
        .iter()
        .find(|c| c.column == "comment")
        .unwrap();
    assert_eq!(comment.missing, 12);
    assert_eq!(diagnostics.missing.rows_per_band, 1);

    let matrix = diagnostics.correlation.as_ref().expect("age and score");
    assert_eq!(matrix.columns, vec!["age", "score"]);
    assert_eq!(matrix.coefficients[0][0], Some(1.0));
    let r = matrix.coefficients[0][1].unwrap();
    assert!(r < 0.0 && r >= -1.0);

    let trend = diagnostics.trend.as_ref().expect("visit_date with numbers");
    assert_eq!(
        trend.panels,
        vec![
            ("visit_date".to_string(), "age".to_string()),
            ("visit_date".to_string(), "score".to_string()),
        ]
    );

    let visuals = dir.path().join("_visuals");
    for file in [
        "missing_values.png",
        "correlation_heatmap.png",
        "numeric_over_time.png",
        "01_age_qq.png",
        "03_score_qq.png",
    ] {
        assert!(visuals.join(file).is_file(), "{file} not written");
    }
    assert!(diagnostics.qq_plot("smoker").is_none());

    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("<h2>Missing values</h2>"));
    assert!(html.contains("<h2>Correlation matrix</h2>"));
    assert!(html.contains("<h2>Numeric columns over time</h2>"));
    assert!(html.contains("src=\"_visuals/01_age_qq.png\""));
    assert!(html.contains("Normal Q-Q plot of score"));
}

#[test]
fn test_outlier_rows_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let df = df! {
        "value" => &[1.0, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 100.0],
        "label" => &["x", "y", "x", "y", "x", "y", "x", "y"],
    }
    .unwrap();

    let report = run(&df, config(dir.path(), "label", None));

    let section = report.descriptive_section("value").unwrap();
    let quick_eda::types::SummaryStats::Continuous(stats) = &section.stats else {
        panic!("value should be continuous");
    };
    assert_eq!(stats.outliers.len(), 1);
    assert_eq!(stats.outliers[0].row, 7);
    let html = fs::read_to_string(&report.document_path).unwrap();
    assert!(html.contains("Outlier records"));
}

// ============================================================================
// Determinism and output layout
// ============================================================================

#[test]
fn test_two_runs_produce_identical_results() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let df = load_csv("paired_groups.csv");

    let first = run(&df, config(first_dir.path(), "group", Some("id")));
    let second = run(&df, config(second_dir.path(), "group", Some("id")));

    assert_eq!(first.relationships, second.relationships);
    assert_eq!(first.excluded(), second.excluded());
    let stats = |r: &EdaReport| {
        r.descriptive
            .iter()
            .map(|d| (d.column.clone(), d.stats.clone(), d.chart.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(stats(&first), stats(&second));
}

#[test]
fn test_missing_output_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("eda");
    let df = load_csv("paired_groups.csv");

    let report = run(&df, config(&output, "group", Some("id")));

    assert_eq!(files_with_extension(&output, "html"), vec![output.join("EDA.html")]);
    let entries: Vec<_> = fs::read_dir(&output).unwrap().collect();
    assert_eq!(entries.len(), 2);

    let images = files_with_extension(&output.join("_visuals"), "png");
    assert_eq!(images.len(), report.image_count());
    // age, group, score, smoker, visit_date + three comparison charts
    // + missing-value map, correlation heatmap, two Q-Q plots, trend chart
    assert_eq!(images.len(), 13);

    let html = fs::read_to_string(output.join("EDA.html")).unwrap();
    for image in &images {
        let name = image.file_name().unwrap().to_string_lossy();
        assert!(html.contains(&format!("src=\"_visuals/{name}\"")));
    }
}

#[test]
fn test_stale_visuals_are_cleared() {
    let dir = tempfile::tempdir().unwrap();
    let visuals = dir.path().join("_visuals");
    fs::create_dir_all(&visuals).unwrap();
    fs::write(visuals.join("99_old_histogram.png"), b"old").unwrap();
    fs::write(visuals.join("notes.txt"), b"keep me").unwrap();
    let df = load_csv("continuous_target.csv");

    run(&df, config(dir.path(), "height", None));

    assert!(!visuals.join("99_old_histogram.png").exists());
    assert!(visuals.join("notes.txt").exists());
}

#[test]
fn test_stale_visuals_kept_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let visuals = dir.path().join("_visuals");
    fs::create_dir_all(&visuals).unwrap();
    fs::write(visuals.join("99_old_histogram.png"), b"old").unwrap();
    let df = load_csv("continuous_target.csv");
    let config = EdaConfig::builder()
        .target_column("height")
        .output_dir(dir.path())
        .clear_stale_visuals(false)
        .chart_size(240, 160)
        .build()
        .unwrap();

    run(&df, config);

    assert!(visuals.join("99_old_histogram.png").exists());
}

#[test]
fn test_existing_report_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("EDA.html"), "previous run").unwrap();
    let df = load_csv("continuous_target.csv");

    run(&df, config(dir.path(), "height", None));

    let html = fs::read_to_string(dir.path().join("EDA.html")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
}

// ============================================================================
// Chart failures
// ============================================================================

#[test]
fn test_failing_renderer_keeps_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("continuous_target.csv");
    let pipeline = EdaPipeline::builder()
        .config(config(dir.path(), "height", None))
        .renderer(Arc::new(FailingRenderer))
        .build()
        .unwrap();

    let report = pipeline.run(&df).unwrap();

    assert!(report.descriptive.is_empty());
    assert!(report.relationship("weight").unwrap().is_computed());
    assert!(report.relationships.iter().all(|r| r.chart.is_none()));
    assert_eq!(report.image_count(), 0);
    assert!(!report.warnings.is_empty());
    assert!(report.document_path.is_file());
    assert!(files_with_extension(&report.visuals_dir, "png").is_empty());
}

// ============================================================================
// Fatal errors
// ============================================================================

#[test]
fn test_run_eda_writes_named_document() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("continuous_target.csv");

    run_eda(&df, "height", None, dir.path(), 0.05, "body").unwrap();

    assert!(dir.path().join("body.html").is_file());
    assert!(dir.path().join("_visuals").is_dir());
}

#[test]
fn test_run_eda_unknown_target() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let df = load_csv("continuous_target.csv");

    let err = run_eda(&df, "age", None, &output, 0.05, "EDA").unwrap_err();

    assert!(matches!(err, EdaError::ColumnNotFound(ref c) if c == "age"));
    assert!(!output.exists());
}

#[test]
fn test_run_eda_unknown_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("continuous_target.csv");

    let err = run_eda(&df, "height", Some("subject"), dir.path(), 0.05, "EDA").unwrap_err();

    assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
}

#[test]
fn test_run_eda_target_equals_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let df = load_csv("continuous_target.csv");

    let err = run_eda(&df, "height", Some("height"), &output, 0.05, "EDA").unwrap_err();

    assert_eq!(err.error_code(), "INVALID_CONFIG");
    assert!(!output.exists());
}

#[test]
fn test_run_eda_invalid_significance_level() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let df = load_csv("continuous_target.csv");

    for alpha in [0.0, 1.0, -0.1, f64::NAN] {
        let err = run_eda(&df, "height", None, &output, alpha, "EDA").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
    assert!(!output.exists());
}

#[test]
fn test_run_eda_empty_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let df = load_csv("continuous_target.csv").head(Some(0));

    let err = run_eda(&df, "height", None, &output, 0.05, "EDA").unwrap_err();

    assert!(matches!(err, EdaError::EmptyDataset { rows: 0, .. }));
    assert!(!output.exists());
}

#[test]
fn test_report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let df = load_csv("continuous_target.csv");

    let report = run(&df, config(dir.path(), "height", None));
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["target"]["column"], "height");
    assert_eq!(json["rows"], 8);
    assert!(json["relationships"].as_array().unwrap().len() >= 2);
}
