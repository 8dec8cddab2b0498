//! Configuration types for the EDA pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the image folder created next to the report document.
pub const VISUALS_DIR_NAME: &str = "_visuals";

/// How strictly observations must pair up before a paired t-test is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PairingPolicy {
    /// Every identifier must appear exactly once in each of the two groups.
    /// Any duplicate, unmatched or missing identifier falls back to the
    /// independent test.
    #[default]
    Strict,
    /// Identifiers without a counterpart are dropped; the paired test runs
    /// as long as at least two complete pairs remain.
    DropUnmatched,
}

/// Configuration for the EDA pipeline.
///
/// Use [`EdaConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use quick_eda::config::{EdaConfig, PairingPolicy};
///
/// let config = EdaConfig::builder()
///     .target_column("group")
///     .identifier_column("id")
///     .output_dir("reports")
///     .significance_level(0.01)
///     .pairing_policy(PairingPolicy::DropUnmatched)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaConfig {
    /// Column every other column is compared against.
    pub target_column: String,

    /// Column used to pair observations for paired tests.
    /// It is never analyzed as a feature.
    /// Default: None
    pub identifier_column: Option<String>,

    /// Directory receiving the report document and the `_visuals` folder.
    /// Created if absent.
    /// Default: "eda_output"
    pub output_dir: PathBuf,

    /// Report file name without extension.
    /// Default: "EDA"
    pub file_name: String,

    /// Threshold for flagging a relationship as significant (`p < alpha`).
    /// Must lie strictly between 0.0 and 1.0.
    /// Default: 0.05
    pub significance_level: f64,

    /// Pairing rules for paired t-tests.
    /// Default: Strict
    pub pairing_policy: PairingPolicy,

    /// Use Student's pooled-variance t-test (true) or Welch's test (false)
    /// for independent samples.
    /// Default: true
    pub equal_variance: bool,

    /// Apply Yates' continuity correction to 2x2 chi-square tests.
    /// Default: true
    pub yates_correction: bool,

    /// Number of histogram bins for continuous columns.
    /// Default: 20
    pub histogram_bins: usize,

    /// Chart width in pixels.
    /// Default: 800
    pub chart_width: u32,

    /// Chart height in pixels.
    /// Default: 500
    pub chart_height: u32,

    /// Remove `*.png` files left in `_visuals` by earlier runs before
    /// writing new images.
    /// Default: true
    pub clear_stale_visuals: bool,
}

impl EdaConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EdaConfigBuilder {
        EdaConfigBuilder::default()
    }

    /// Path of the HTML document this configuration produces.
    pub fn document_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.html", self.file_name))
    }

    /// Path of the image folder this configuration produces.
    pub fn visuals_dir(&self) -> PathBuf {
        self.output_dir.join(VISUALS_DIR_NAME)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::MissingTarget);
        }

        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ConfigValidationError::InvalidSignificanceLevel(
                self.significance_level,
            ));
        }

        if self
            .identifier_column
            .as_deref()
            .is_some_and(|id| id == self.target_column)
        {
            return Err(ConfigValidationError::TargetIsIdentifier(
                self.target_column.clone(),
            ));
        }

        let name = self.file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigValidationError::InvalidFileName(
                self.file_name.clone(),
            ));
        }

        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::InvalidHistogramBins(
                self.histogram_bins,
            ));
        }

        if self.chart_width < 100 || self.chart_height < 100 {
            return Err(ConfigValidationError::InvalidChartSize {
                width: self.chart_width,
                height: self.chart_height,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("A target column must be specified")]
    MissingTarget,

    #[error("Invalid significance level: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidSignificanceLevel(f64),

    #[error("Column '{0}' cannot be both the target and the identifier")]
    TargetIsIdentifier(String),

    #[error("Invalid report file name '{0}' (must be non-empty and contain no path separators)")]
    InvalidFileName(String),

    #[error("Invalid histogram bins: {0} (must be at least 1)")]
    InvalidHistogramBins(usize),

    #[error("Invalid chart size {width}x{height} (each side must be at least 100 pixels)")]
    InvalidChartSize { width: u32, height: u32 },
}

/// Builder for [`EdaConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EdaConfigBuilder {
    target_column: Option<String>,
    identifier_column: Option<String>,
    output_dir: Option<PathBuf>,
    file_name: Option<String>,
    significance_level: Option<f64>,
    pairing_policy: Option<PairingPolicy>,
    equal_variance: Option<bool>,
    yates_correction: Option<bool>,
    histogram_bins: Option<usize>,
    chart_width: Option<u32>,
    chart_height: Option<u32>,
    clear_stale_visuals: Option<bool>,
}

impl EdaConfigBuilder {
    /// Set the target column (required).
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Set the identifier column used for paired tests.
    pub fn identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = Some(column.into());
        self
    }

    /// Set the output directory for the report and its images.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the report file name (without extension).
    ///
    /// An existing document with the same name is overwritten.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the significance level.
    ///
    /// # Arguments
    /// * `alpha` - Value strictly between 0.0 and 1.0 (e.g., 0.05)
    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = Some(alpha);
        self
    }

    /// Set the pairing policy for paired t-tests.
    pub fn pairing_policy(mut self, policy: PairingPolicy) -> Self {
        self.pairing_policy = Some(policy);
        self
    }

    /// Choose between Student's (true) and Welch's (false) independent t-test.
    pub fn equal_variance(mut self, equal: bool) -> Self {
        self.equal_variance = Some(equal);
        self
    }

    /// Enable or disable Yates' continuity correction.
    pub fn yates_correction(mut self, enable: bool) -> Self {
        self.yates_correction = Some(enable);
        self
    }

    /// Set the number of histogram bins.
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Set the chart size in pixels.
    pub fn chart_size(mut self, width: u32, height: u32) -> Self {
        self.chart_width = Some(width);
        self.chart_height = Some(height);
        self
    }

    /// Enable or disable removal of images left over from earlier runs.
    pub fn clear_stale_visuals(mut self, clear: bool) -> Self {
        self.clear_stale_visuals = Some(clear);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EdaConfig` or an error if validation fails.
    pub fn build(self) -> Result<EdaConfig, ConfigValidationError> {
        let config = EdaConfig {
            target_column: self.target_column.unwrap_or_default(),
            identifier_column: self.identifier_column,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("eda_output")),
            file_name: self.file_name.unwrap_or_else(|| "EDA".to_string()),
            significance_level: self.significance_level.unwrap_or(0.05),
            pairing_policy: self.pairing_policy.unwrap_or_default(),
            equal_variance: self.equal_variance.unwrap_or(true),
            yates_correction: self.yates_correction.unwrap_or(true),
            histogram_bins: self.histogram_bins.unwrap_or(20),
            chart_width: self.chart_width.unwrap_or(800),
            chart_height: self.chart_height.unwrap_or(500),
            clear_stale_visuals: self.clear_stale_visuals.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EdaConfig::builder().target_column("y").build().unwrap();
        assert_eq!(config.target_column, "y");
        assert_eq!(config.identifier_column, None);
        assert_eq!(config.output_dir, PathBuf::from("eda_output"));
        assert_eq!(config.file_name, "EDA");
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.pairing_policy, PairingPolicy::Strict);
        assert!(config.equal_variance);
        assert!(config.yates_correction);
        assert_eq!(config.histogram_bins, 20);
        assert!(config.clear_stale_visuals);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EdaConfig::builder()
            .target_column("group")
            .identifier_column("id")
            .output_dir("out")
            .file_name("report")
            .significance_level(0.01)
            .pairing_policy(PairingPolicy::DropUnmatched)
            .equal_variance(false)
            .yates_correction(false)
            .histogram_bins(12)
            .chart_size(640, 480)
            .clear_stale_visuals(false)
            .build()
            .unwrap();

        assert_eq!(config.identifier_column.as_deref(), Some("id"));
        assert_eq!(config.significance_level, 0.01);
        assert_eq!(config.pairing_policy, PairingPolicy::DropUnmatched);
        assert!(!config.equal_variance);
        assert_eq!((config.chart_width, config.chart_height), (640, 480));
        assert_eq!(config.document_path(), PathBuf::from("out/report.html"));
        assert_eq!(config.visuals_dir(), PathBuf::from("out/_visuals"));
    }

    #[test]
    fn test_validation_missing_target() {
        let result = EdaConfig::builder().build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MissingTarget
        ));
    }

    #[test]
    fn test_validation_significance_bounds() {
        for alpha in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let result = EdaConfig::builder()
                .target_column("y")
                .significance_level(alpha)
                .build();
            assert!(
                matches!(
                    result,
                    Err(ConfigValidationError::InvalidSignificanceLevel(_))
                ),
                "alpha {alpha} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_target_is_identifier() {
        let result = EdaConfig::builder()
            .target_column("id")
            .identifier_column("id")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::TargetIsIdentifier(_)
        ));
    }

    #[test]
    fn test_validation_file_name_with_separator() {
        let result = EdaConfig::builder()
            .target_column("y")
            .file_name("nested/report")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidFileName(_)
        ));
    }

    #[test]
    fn test_validation_chart_size() {
        let result = EdaConfig::builder()
            .target_column("y")
            .chart_size(50, 500)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidChartSize { .. }
        ));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "target_column": "outcome",
            "identifier_column": "subject",
            "output_dir": "custom_output",
            "file_name": "trial",
            "significance_level": 0.1,
            "pairing_policy": "DropUnmatched",
            "equal_variance": false,
            "yates_correction": true,
            "histogram_bins": 15,
            "chart_width": 1024,
            "chart_height": 768,
            "clear_stale_visuals": false
        }"#;

        let config: EdaConfig = serde_json::from_str(json).expect("Should deserialize");
        assert!(config.validate().is_ok());
        assert_eq!(config.target_column, "outcome");
        assert_eq!(config.identifier_column.as_deref(), Some("subject"));
        assert_eq!(config.pairing_policy, PairingPolicy::DropUnmatched);
        assert_eq!(config.output_dir.to_str().unwrap(), "custom_output");
        assert_eq!(config.histogram_bins, 15);
    }
}
