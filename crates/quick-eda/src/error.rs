//! Custom error types for the EDA pipeline.
//!
//! Only fatal conditions surface as errors from [`crate::EdaPipeline::run`].
//! Column-level problems (an unclassifiable column, a chart that cannot be
//! drawn, a test whose preconditions fail) are recovered inside the pipeline
//! and recorded in the report instead.
//!
//! Errors are serializable so the CLI can emit them as JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the EDA pipeline.
#[derive(Error, Debug)]
pub enum EdaError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dataset has no rows or no columns.
    #[error("Dataset is empty ({rows} rows x {columns} columns)")]
    EmptyDataset { rows: usize, columns: usize },

    /// The output location cannot be created or written.
    #[error("Output path '{}' is not writable: {reason}", path.display())]
    OutputNotWritable { path: PathBuf, reason: String },

    /// A statistic could not be computed.
    #[error("Failed to compute statistics for column '{column}': {reason}")]
    StatisticsFailed { column: String, reason: String },

    /// A chart could not be rendered.
    #[error("Failed to render {chart}: {reason}")]
    ChartFailed { chart: String, reason: String },

    /// Report generation failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EdaError>,
    },
}

impl EdaError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EdaError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a chart error from any displayable backend error.
    pub fn chart(chart: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EdaError::ChartFailed {
            chart: chart.into(),
            reason: reason.to_string(),
        }
    }

    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EmptyDataset { .. } => "EMPTY_DATASET",
            Self::OutputNotWritable { .. } => "OUTPUT_NOT_WRITABLE",
            Self::StatisticsFailed { .. } => "STATISTICS_FAILED",
            Self::ChartFailed { .. } => "CHART_FAILED",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error aborts a run.
    ///
    /// Statistics and chart errors are recovered per column; everything else
    /// is raised to the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::StatisticsFailed { .. } | Self::ChartFailed { .. } => false,
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => true,
        }
    }
}

impl Serialize for EdaError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EdaError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for EDA operations.
pub type Result<T> = std::result::Result<T, EdaError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EdaError::Polars(e).with_context(context))
    }
}
