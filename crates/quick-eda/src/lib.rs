//! Automated Exploratory Data Analysis
//!
//! One call turns a tabular dataset and a designated target column into an
//! HTML report plus a folder of PNG charts.
//!
//! # Overview
//!
//! A run goes through five stages:
//!
//! - **Column classification**: every column gets a role (continuous,
//!   binary-categorical, datetime, identifier, unclassified) from its declared
//!   type and cardinality
//! - **Descriptive summaries**: statistics, outlier rows and one default chart
//!   per column
//! - **Dataset diagnostics**: missing-value map, correlation heatmap, normal
//!   Q-Q plots and continuous columns over time
//! - **Relationship analysis**: each column is compared with the target using
//!   the test its role pair calls for (t-test, paired t-test, Pearson
//!   correlation, chi-square test of independence)
//! - **Report assembly**: everything is written to `<output>/<name>.html`,
//!   with images under `<output>/_visuals/`
//!
//! Column-level problems never abort a run; they are recorded in the report.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quick_eda::run_eda;
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! run_eda(&df, "group", Some("id"), "eda_output", 0.05, "EDA")?;
//! ```
//!
//! # Configuration
//!
//! Use [`EdaConfig`] and [`EdaPipeline`] for the full set of options and to
//! get the in-memory [`EdaReport`] back:
//!
//! ```rust,ignore
//! use quick_eda::{EdaConfig, EdaPipeline, PairingPolicy};
//!
//! let config = EdaConfig::builder()
//!     .target_column("group")
//!     .identifier_column("id")
//!     .pairing_policy(PairingPolicy::DropUnmatched)
//!     .equal_variance(false)              // Welch's t-test
//!     .build()?;
//!
//! let report = EdaPipeline::builder().config(config).build()?.run(&df)?;
//! for result in &report.relationships {
//!     println!("{}: p = {:?}", result.column, result.p_value());
//! }
//! ```
//!
//! # Charts
//!
//! Charts go through the [`charts::ChartRenderer`] trait. The default
//! [`charts::PlottersRenderer`] writes PNG files with `plotters`; a custom
//! renderer can be passed to [`EdaPipelineBuilder::renderer`].

pub mod charts;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod profiler;
pub mod relationships;
pub mod reporting;
pub mod stats;
pub mod summarizer;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use charts::{ChartRenderer, PlottersRenderer};
pub use config::{ConfigValidationError, EdaConfig, EdaConfigBuilder, PairingPolicy};
pub use diagnostics::DiagnosticsAnalyzer;
pub use error::{EdaError, Result as EdaResult, ResultExt};
pub use pipeline::{EdaPipeline, EdaPipelineBuilder, run_eda};
pub use profiler::ColumnClassifier;
pub use relationships::RelationshipAnalyzer;
pub use reporting::{ReportAssembler, ReportDocument};
pub use summarizer::DescriptiveSummarizer;
pub use types::{
    AnalysisResult, AnalysisStage, ColumnRole, DatasetDiagnostics, DeclaredType,
    DescriptiveSection, EdaReport, ExcludedColumn, PairingStatus, SummaryStats, TestKind,
    TestOutcome, TestStatistic,
};
