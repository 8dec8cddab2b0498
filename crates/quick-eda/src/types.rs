use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Column classification
// ============================================================================

/// Declared storage type of a column, reduced to what role inference needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Integer,
    Float,
    /// Free text or categorical labels.
    String,
    Boolean,
    /// Date or datetime.
    Datetime,
    /// Anything else (lists, structs, binary blobs, time-of-day...).
    Other(String),
}

impl DeclaredType {
    /// True for integer and floating point columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// True for columns holding labels (strings, categoricals, booleans).
    pub fn is_object(&self) -> bool {
        matches!(self, Self::String | Self::Boolean)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Boolean => f.write_str("boolean"),
            Self::Datetime => f.write_str("datetime"),
            Self::Other(name) => write!(f, "other ({name})"),
        }
    }
}

/// Statistical role of a column, derived once and matched on downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Continuous,
    BinaryCategorical,
    Datetime,
    /// Pairs observations for paired tests; never analyzed itself.
    Identifier,
    Unclassified,
}

impl ColumnRole {
    /// Human-readable name used in the report.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::BinaryCategorical => "binary-categorical",
            Self::Datetime => "datetime",
            Self::Identifier => "identifier",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A column with its inferred role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedColumn {
    /// Position of the column in the dataset.
    pub index: usize,
    pub name: String,
    pub declared_type: DeclaredType,
    pub role: ColumnRole,
    pub non_missing: usize,
    pub missing: usize,
    /// Distinct non-missing values.
    pub distinct: usize,
}

/// Pipeline stage at which a column dropped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Classification,
    Summary,
    Relationship,
}

impl AnalysisStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Summary => "descriptive summary",
            Self::Relationship => "relationship analysis",
        }
    }
}

/// A column left out of some stage, with the reason shown in the overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedColumn {
    pub name: String,
    pub stage: AnalysisStage,
    pub reason: String,
}

impl ExcludedColumn {
    pub fn new(name: impl Into<String>, stage: AnalysisStage, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage,
            reason: reason.into(),
        }
    }
}

/// Output of the column classifier.
///
/// `columns` keeps dataset order and includes unclassified columns so the
/// overview can count them; `excluded` lists columns that cannot be analyzed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub columns: Vec<ClassifiedColumn>,
    pub excluded: Vec<ExcludedColumn>,
}

impl Classification {
    /// Look up a classified column by name.
    pub fn get(&self, name: &str) -> Option<&ClassifiedColumn> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Role of a column, if it could be classified.
    pub fn role_of(&self, name: &str) -> Option<ColumnRole> {
        self.get(name).map(|col| col.role)
    }

    /// Columns carrying a given role, in dataset order.
    pub fn with_role(&self, role: ColumnRole) -> impl Iterator<Item = &ClassifiedColumn> {
        self.columns.iter().filter(move |col| col.role == role)
    }
}

/// The target column and the optional pairing identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub column: String,
    /// `None` when the target itself could not be classified.
    pub role: Option<ColumnRole>,
    pub identifier: Option<String>,
}

// ============================================================================
// Descriptive statistics
// ============================================================================

/// Outcome of a normality test on a continuous column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityCheck {
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    /// `p_value >= alpha`.
    pub consistent_with_normal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousStats {
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    /// `q1 - 1.5 * iqr`
    pub lower_fence: f64,
    /// `q3 + 1.5 * iqr`
    pub upper_fence: f64,
    /// Rows outside the fences, in row order. Columns with two or fewer
    /// distinct values have none.
    pub outliers: Vec<OutlierRecord>,
    pub normality: Vec<NormalityCheck>,
}

/// A value outside the 1.5 IQR fences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    /// Zero-based row position in the dataset.
    pub row: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub count: usize,
    pub missing: usize,
    pub mode: String,
    /// Sorted by descending count, ties broken by value.
    pub frequencies: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Bucket start as milliseconds since the Unix epoch.
    pub start_ms: i64,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeStats {
    pub count: usize,
    pub missing: usize,
    pub earliest: String,
    pub latest: String,
    pub range_days: f64,
    pub granularity: String,
    pub buckets: Vec<TimeBucket>,
}

/// Role-specific statistics of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryStats {
    Continuous(ContinuousStats),
    Categorical(CategoricalStats),
    Datetime(DatetimeStats),
}

/// Descriptive section of one column: statistics plus its default chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveSection {
    pub column: String,
    pub role: ColumnRole,
    pub stats: SummaryStats,
    /// Chart path relative to the report document.
    pub chart: PathBuf,
}

// ============================================================================
// Relationship analysis
// ============================================================================

/// Statistical comparison chosen for a (feature role, target role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum TestKind {
    IndependentTTest { equal_variance: bool },
    PairedTTest,
    PearsonCorrelation,
    ChiSquareIndependence,
}

impl TestKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::IndependentTTest {
                equal_variance: true,
            } => "Two-sample t-test (Student)",
            Self::IndependentTTest {
                equal_variance: false,
            } => "Two-sample t-test (Welch)",
            Self::PairedTTest => "Paired t-test",
            Self::PearsonCorrelation => "Pearson correlation",
            Self::ChiSquareIndependence => "Chi-square test of independence",
        }
    }
}

/// Raw numbers returned by a statistical test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestStatistic {
    pub statistic: f64,
    /// Two-sided p-value in `[0, 1]`.
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    /// Observations (or pairs) that entered the test.
    pub sample_size: usize,
    /// Test-specific effect estimate (the correlation coefficient for
    /// Pearson, the mean difference for t-tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
}

/// Result of running (or attempting) the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Computed {
        result: TestStatistic,
        /// `p_value < alpha`.
        significant: bool,
    },
    Failed {
        reason: String,
    },
}

/// Whether a requested pairing actually happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pairing", rename_all = "snake_case")]
pub enum PairingStatus {
    /// No identifier column, or the test does not use pairing.
    NotRequested,
    Paired { pairs: usize },
    /// Pairing preconditions failed and the independent test ran instead.
    FellBack { reason: String },
}

/// Per-group summary for group comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub level: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Non-parametric test reported next to a t-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionTest {
    pub name: String,
    pub result: TestStatistic,
    pub significant: bool,
}

/// Normalized record of one feature-vs-target comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub column: String,
    pub role: ColumnRole,
    pub target_role: ColumnRole,
    pub test: TestKind,
    pub outcome: TestOutcome,
    pub pairing: PairingStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub groups: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub companion: Option<CompanionTest>,
    /// Chart path relative to the report document.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart: Option<PathBuf>,
}

impl AnalysisResult {
    pub fn is_computed(&self) -> bool {
        matches!(self.outcome, TestOutcome::Computed { .. })
    }

    pub fn statistic(&self) -> Option<f64> {
        match &self.outcome {
            TestOutcome::Computed { result, .. } => Some(result.statistic),
            TestOutcome::Failed { .. } => None,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match &self.outcome {
            TestOutcome::Computed { result, .. } => Some(result.p_value),
            TestOutcome::Failed { .. } => None,
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(
            self.outcome,
            TestOutcome::Computed {
                significant: true,
                ..
            }
        )
    }

    /// Reason the test could not be computed, if it failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            TestOutcome::Failed { reason } => Some(reason),
            TestOutcome::Computed { .. } => None,
        }
    }

    /// True when pairing was requested but the independent test ran instead.
    pub fn fell_back_to_unpaired(&self) -> bool {
        matches!(self.pairing, PairingStatus::FellBack { .. })
    }
}

// ============================================================================
// Dataset diagnostics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
    pub percentage: f64,
}

/// Missing values of every dataset column and the map drawn from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingValueSummary {
    /// Every column in dataset order, including unclassified ones.
    pub columns: Vec<MissingCount>,
    /// Consecutive rows merged into one band of the map.
    pub rows_per_band: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart: Option<PathBuf>,
}

impl MissingValueSummary {
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }
}

/// Pairwise Pearson coefficients between continuous columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `coefficients[i][j]` over rows where both columns are present;
    /// `None` when fewer than three such rows exist or a column is constant.
    pub coefficients: Vec<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart: Option<PathBuf>,
}

/// A chart drawn for one column outside its descriptive section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChart {
    pub column: String,
    pub chart: PathBuf,
}

/// Continuous columns plotted against datetime columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendOverview {
    /// `(datetime column, continuous column)` per panel, in drawing order.
    pub panels: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart: Option<PathBuf>,
}

/// Dataset-level views computed after the per-column summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDiagnostics {
    pub missing: MissingValueSummary,
    /// Present when at least two continuous columns exist.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation: Option<CorrelationMatrix>,
    /// Normal Q-Q plots of summarized continuous columns.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub qq_plots: Vec<ColumnChart>,
    /// Present when the dataset has both continuous and datetime columns.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trend: Option<TrendOverview>,
}

impl DatasetDiagnostics {
    /// Q-Q plot of a column, if one was drawn.
    pub fn qq_plot(&self, column: &str) -> Option<&Path> {
        self.qq_plots
            .iter()
            .find(|q| q.column == column)
            .map(|q| q.chart.as_path())
    }

    pub fn image_count(&self) -> usize {
        [
            self.missing.chart.is_some(),
            self.correlation.as_ref().is_some_and(|c| c.chart.is_some()),
            self.trend.as_ref().is_some_and(|t| t.chart.is_some()),
        ]
        .into_iter()
        .filter(|drawn| *drawn)
        .count()
            + self.qq_plots.len()
    }
}

// ============================================================================
// Run output
// ============================================================================

/// Everything a run produced, returned alongside the files on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaReport {
    pub generated_at: String,
    pub document_path: PathBuf,
    pub visuals_dir: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub target: TargetSpec,
    pub significance_level: f64,
    pub classification: Classification,
    pub descriptive: Vec<DescriptiveSection>,
    pub relationships: Vec<AnalysisResult>,
    #[serde(default)]
    pub diagnostics: DatasetDiagnostics,
    pub warnings: Vec<String>,
}

impl EdaReport {
    /// Relationship result for a column, if it was compared.
    pub fn relationship(&self, column: &str) -> Option<&AnalysisResult> {
        self.relationships.iter().find(|r| r.column == column)
    }

    /// Descriptive section for a column, if it was summarized.
    pub fn descriptive_section(&self, column: &str) -> Option<&DescriptiveSection> {
        self.descriptive.iter().find(|d| d.column == column)
    }

    /// Columns excluded at any stage, in the order they were recorded.
    pub fn excluded(&self) -> &[ExcludedColumn] {
        &self.classification.excluded
    }

    /// Number of image files the report references.
    pub fn image_count(&self) -> usize {
        self.descriptive.len()
            + self
                .relationships
                .iter()
                .filter(|r| r.chart.is_some())
                .count()
            + self.diagnostics.image_count()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn computed(p_value: f64, significant: bool) -> AnalysisResult {
        AnalysisResult {
            column: "age".to_string(),
            role: ColumnRole::Continuous,
            target_role: ColumnRole::BinaryCategorical,
            test: TestKind::IndependentTTest {
                equal_variance: true,
            },
            outcome: TestOutcome::Computed {
                result: TestStatistic {
                    statistic: 2.5,
                    p_value,
                    degrees_of_freedom: Some(18.0),
                    sample_size: 20,
                    estimate: Some(4.0),
                },
                significant,
            },
            pairing: PairingStatus::NotRequested,
            groups: Vec::new(),
            companion: None,
            chart: Some(PathBuf::from("_visuals/00_age_boxplot.png")),
        }
    }

    #[test]
    fn test_role_display_names() {
        assert_eq!(ColumnRole::BinaryCategorical.to_string(), "binary-categorical");
        assert_eq!(ColumnRole::Identifier.display_name(), "identifier");
    }

    #[test]
    fn test_declared_type_predicates() {
        assert!(DeclaredType::Integer.is_numeric());
        assert!(DeclaredType::Float.is_numeric());
        assert!(!DeclaredType::String.is_numeric());
        assert!(DeclaredType::Boolean.is_object());
        assert!(!DeclaredType::Datetime.is_object());
        assert_eq!(DeclaredType::Other("List".into()).to_string(), "other (List)");
    }

    #[test]
    fn test_analysis_result_accessors() {
        let result = computed(0.02, true);
        assert!(result.is_computed());
        assert_eq!(result.p_value(), Some(0.02));
        assert_eq!(result.statistic(), Some(2.5));
        assert!(result.is_significant());
        assert!(result.failure_reason().is_none());
        assert!(!result.fell_back_to_unpaired());
    }

    #[test]
    fn test_failed_outcome_accessors() {
        let mut result = computed(0.5, false);
        result.outcome = TestOutcome::Failed {
            reason: "zero variance".to_string(),
        };
        assert!(!result.is_computed());
        assert_eq!(result.p_value(), None);
        assert!(!result.is_significant());
        assert_eq!(result.failure_reason(), Some("zero variance"));
    }

    #[test]
    fn test_test_kind_names() {
        assert_eq!(TestKind::PairedTTest.display_name(), "Paired t-test");
        assert_eq!(
            TestKind::IndependentTTest {
                equal_variance: false
            }
            .display_name(),
            "Two-sample t-test (Welch)"
        );
    }

    #[test]
    fn test_analysis_result_serialization() {
        let mut result = computed(0.3, false);
        result.pairing = PairingStatus::FellBack {
            reason: "duplicate identifier".to_string(),
        };
        let json = serde_json::to_string(&result).expect("Should serialize");
        assert!(json.contains("\"status\":\"computed\""));
        assert!(json.contains("\"pairing\":\"fell_back\""));
        assert!(json.contains("binary_categorical"));

        let back: AnalysisResult = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(back, result);
    }

    #[test]
    fn test_diagnostics_image_count() {
        let mut diagnostics = DatasetDiagnostics::default();
        assert_eq!(diagnostics.image_count(), 0);

        diagnostics.missing.chart = Some(PathBuf::from("_visuals/missing_values.png"));
        diagnostics.correlation = Some(CorrelationMatrix {
            columns: vec!["age".to_string(), "score".to_string()],
            coefficients: vec![vec![Some(1.0), None], vec![None, Some(1.0)]],
            chart: None,
        });
        diagnostics.qq_plots.push(ColumnChart {
            column: "age".to_string(),
            chart: PathBuf::from("_visuals/00_age_qq.png"),
        });
        assert_eq!(diagnostics.image_count(), 2);
        assert_eq!(
            diagnostics.qq_plot("age"),
            Some(Path::new("_visuals/00_age_qq.png"))
        );
        assert_eq!(diagnostics.qq_plot("score"), None);
    }

    #[test]
    fn test_classification_lookup() {
        let classification = Classification {
            columns: vec![ClassifiedColumn {
                index: 0,
                name: "age".to_string(),
                declared_type: DeclaredType::Float,
                role: ColumnRole::Continuous,
                non_missing: 10,
                missing: 0,
                distinct: 8,
            }],
            excluded: vec![ExcludedColumn::new(
                "notes",
                AnalysisStage::Classification,
                "only missing values",
            )],
        };
        assert_eq!(classification.role_of("age"), Some(ColumnRole::Continuous));
        assert_eq!(classification.role_of("notes"), None);
        assert_eq!(classification.with_role(ColumnRole::Continuous).count(), 1);
    }
}
