//! Main EDA pipeline module.
//!
//! This module provides the [`EdaPipeline`] struct and its builder, which
//! validate a run, prepare the output folder and drive the classifier,
//! summarizer, diagnostics, relationship analyzer and report assembler in
//! order.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use polars::prelude::*;
use tracing::{debug, error, info, warn};

use crate::charts::{ChartRenderer, PlottersRenderer};
use crate::config::EdaConfig;
use crate::diagnostics::DiagnosticsAnalyzer;
use crate::error::{EdaError, Result};
use crate::profiler::ColumnClassifier;
use crate::relationships::RelationshipAnalyzer;
use crate::reporting::ReportAssembler;
use crate::summarizer::DescriptiveSummarizer;
use crate::types::{
    AnalysisResult, AnalysisStage, Classification, ColumnRole, EdaReport, ExcludedColumn,
    TargetSpec,
};

const WRITE_CHECK: &str = ".quick-eda-write-check";

/// The EDA pipeline.
///
/// Use [`EdaPipeline::builder()`] to create a pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use quick_eda::{EdaConfig, EdaPipeline};
///
/// let config = EdaConfig::builder()
///     .target_column("group")
///     .identifier_column("id")
///     .output_dir("eda_output")
///     .build()?;
///
/// let report = EdaPipeline::builder().config(config).build()?.run(&df)?;
/// println!("{} images written", report.image_count());
/// ```
pub struct EdaPipeline {
    config: EdaConfig,
    renderer: Arc<dyn ChartRenderer>,
}

static_assertions::assert_impl_all!(EdaPipeline: Send, Sync);

impl EdaPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> EdaPipelineBuilder {
        EdaPipelineBuilder::default()
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &EdaConfig {
        &self.config
    }

    /// Run the analysis on `df` and write the report.
    ///
    /// # Errors
    ///
    /// Only fatal conditions are returned: an unknown target or identifier
    /// column, an empty dataset, an unreadable column, an unwritable output
    /// location, or a failure writing the document itself. All of them
    /// except the last are detected before anything is written.
    pub fn run(&self, df: &DataFrame) -> Result<EdaReport> {
        self.run_internal(df).inspect_err(|e| error!("EDA pipeline error: {}", e))
    }

    fn run_internal(&self, df: &DataFrame) -> Result<EdaReport> {
        let start_time = Instant::now();
        info!("Starting EDA pipeline...");

        self.validate_inputs(df)?;
        let config = &self.config;
        let mut warnings = Vec::new();

        // Step 1: Classify columns; the output folder is untouched until this succeeds
        info!("Step 1: Classifying {} columns...", df.width());
        let mut classification =
            ColumnClassifier::classify_dataset(df, config.identifier_column.as_deref())?;
        self.prepare_output()?;
        let target = TargetSpec {
            column: config.target_column.clone(),
            role: classification.role_of(&config.target_column),
            identifier: config.identifier_column.clone(),
        };
        match target.role {
            Some(role) => info!("Target '{}' classified as {}", target.column, role),
            None => warn!("Target '{}' could not be classified", target.column),
        }

        // Step 2: Descriptive summaries
        info!("Step 2: Summarizing columns...");
        let summarizer = DescriptiveSummarizer::new(config, self.renderer.as_ref());
        let mut descriptive = Vec::new();
        let columns = classification.columns.clone();
        for column in columns.iter().filter(|c| is_summarized(c.role)) {
            match summarizer.summarize(df, column) {
                Ok(section) => descriptive.push(section),
                Err(e) if !e.is_fatal() => {
                    warn!(column = %column.name, "Skipping summary: {}", e);
                    warnings.push(format!("'{}': {}", column.name, e));
                    classification.excluded.push(ExcludedColumn::new(
                        &column.name,
                        AnalysisStage::Summary,
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        debug!("{} descriptive sections", descriptive.len());

        // Step 3: Dataset diagnostics
        info!("Step 3: Computing dataset diagnostics...");
        let diagnostics = DiagnosticsAnalyzer::new(config, self.renderer.as_ref()).analyze(
            df,
            &classification,
            &descriptive,
        );
        warnings.extend(diagnostics.warnings);

        // Step 4: Relationships with the target
        info!("Step 4: Comparing columns with target '{}'...", target.column);
        let relationships =
            self.analyze_relationships(df, &mut classification, &mut warnings)?;
        debug!("{} comparisons", relationships.len());

        // Step 5: Assemble and write the report
        info!("Step 5: Writing report...");
        let mut report = EdaReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            document_path: config.document_path(),
            visuals_dir: config.visuals_dir(),
            rows: df.height(),
            columns: df.width(),
            target,
            significance_level: config.significance_level,
            classification,
            descriptive,
            relationships,
            diagnostics: diagnostics.diagnostics,
            warnings,
        };
        let assembler = ReportAssembler::new(config);
        let document = assembler.assemble(&mut report);
        assembler.write(&document)?;

        info!(
            "EDA pipeline completed in {} ms ({} images, {} warnings)",
            start_time.elapsed().as_millis(),
            report.image_count(),
            report.warnings.len()
        );
        Ok(report)
    }

    fn analyze_relationships(
        &self,
        df: &DataFrame,
        classification: &mut Classification,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<AnalysisResult>> {
        let config = &self.config;
        let mut results = Vec::new();

        let Some(target) = classification.get(&config.target_column).cloned() else {
            let reason = "target column could not be classified";
            warnings.push(format!("No comparisons: {reason}"));
            for column in classification.columns.clone() {
                if is_compared(column.role) {
                    classification.excluded.push(ExcludedColumn::new(
                        column.name,
                        AnalysisStage::Relationship,
                        reason,
                    ));
                }
            }
            return Ok(results);
        };

        let analyzer = RelationshipAnalyzer::new(config, self.renderer.as_ref());
        let features: Vec<_> = classification
            .columns
            .iter()
            .filter(|c| c.name != target.name && is_compared(c.role))
            .cloned()
            .collect();

        for feature in &features {
            match analyzer.analyze(df, feature, &target) {
                Ok(output) => {
                    if let Some(reason) = output.result.failure_reason() {
                        warn!(
                            column = %feature.name,
                            "{} not computed: {}",
                            output.result.test.display_name(),
                            reason
                        );
                    }
                    warnings.extend(output.warnings);
                    results.push(output.result);
                }
                Err(e) if !e.is_fatal() => {
                    debug!(column = %feature.name, "Not compared: {}", e);
                    classification.excluded.push(ExcludedColumn::new(
                        &feature.name,
                        AnalysisStage::Relationship,
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }

    /// Fatal checks; nothing has been written when these fail.
    fn validate_inputs(&self, df: &DataFrame) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| EdaError::InvalidConfig(e.to_string()))?;

        if df.height() == 0 || df.width() == 0 {
            return Err(EdaError::EmptyDataset {
                rows: df.height(),
                columns: df.width(),
            });
        }

        let has_column = |name: &str| df.get_column_names().iter().any(|c| c.as_str() == name);
        if !has_column(&self.config.target_column) {
            return Err(EdaError::ColumnNotFound(self.config.target_column.clone()));
        }
        if let Some(id) = self.config.identifier_column.as_deref() {
            if !has_column(id) {
                return Err(EdaError::ColumnNotFound(id.to_string()));
            }
        }
        Ok(())
    }

    /// Create the output folders, check they are writable and clear stale images.
    fn prepare_output(&self) -> Result<()> {
        let visuals = self.config.visuals_dir();
        let document = self.config.document_path();
        let not_writable = |path: &Path, reason: String| EdaError::OutputNotWritable {
            path: path.to_path_buf(),
            reason,
        };

        if document.is_dir() {
            return Err(not_writable(
                &document,
                "a directory exists at the report path".to_string(),
            ));
        }
        fs::create_dir_all(&visuals).map_err(|e| not_writable(&visuals, e.to_string()))?;

        let marker = self.config.output_dir.join(WRITE_CHECK);
        fs::write(&marker, b"").map_err(|e| not_writable(&self.config.output_dir, e.to_string()))?;
        if let Err(e) = fs::remove_file(&marker) {
            warn!("Could not remove {}: {}", marker.display(), e);
        }

        if self.config.clear_stale_visuals {
            let removed = clear_stale_images(&visuals)?;
            if removed > 0 {
                info!("Removed {} stale images from {}", removed, visuals.display());
            }
        }
        Ok(())
    }
}

fn is_summarized(role: ColumnRole) -> bool {
    matches!(
        role,
        ColumnRole::Continuous | ColumnRole::BinaryCategorical | ColumnRole::Datetime
    )
}

fn is_compared(role: ColumnRole) -> bool {
    !matches!(role, ColumnRole::Identifier | ColumnRole::Unclassified)
}

/// Delete `*.png` files directly inside `dir`; other entries are left alone.
fn clear_stale_images(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove stale image {}: {}", path.display(), e),
            }
        }
    }
    Ok(removed)
}

/// Builder for [`EdaPipeline`].
#[derive(Default)]
pub struct EdaPipelineBuilder {
    config: Option<EdaConfig>,
    renderer: Option<Arc<dyn ChartRenderer>>,
}

static_assertions::assert_impl_all!(EdaPipelineBuilder: Send);

impl EdaPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: EdaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom chart renderer instead of [`PlottersRenderer`].
    pub fn renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EdaError::InvalidConfig`] when no configuration was given or
    /// it fails validation.
    pub fn build(self) -> Result<EdaPipeline> {
        let config = self
            .config
            .ok_or_else(|| EdaError::InvalidConfig("a configuration is required".to_string()))?;
        config
            .validate()
            .map_err(|e| EdaError::InvalidConfig(e.to_string()))?;

        let renderer = self.renderer.unwrap_or_else(|| {
            Arc::new(PlottersRenderer::new(config.chart_width, config.chart_height))
        });
        Ok(EdaPipeline { config, renderer })
    }
}

/// Run the whole analysis with default settings and write the report.
///
/// Writes `<output_dir>/<file_name>.html` and the images under
/// `<output_dir>/_visuals/`.
pub fn run_eda(
    df: &DataFrame,
    target: &str,
    identifier: Option<&str>,
    output_dir: impl AsRef<Path>,
    significance_level: f64,
    file_name: &str,
) -> Result<()> {
    let mut builder = EdaConfig::builder()
        .target_column(target)
        .output_dir(output_dir.as_ref())
        .significance_level(significance_level)
        .file_name(file_name);
    if let Some(id) = identifier {
        builder = builder.identifier_column(id);
    }
    let config = builder
        .build()
        .map_err(|e| EdaError::InvalidConfig(e.to_string()))?;

    EdaPipeline::builder().config(config).build()?.run(df)?;
    Ok(())
}
