//! Report document model and the section builders that fill it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{
    AnalysisResult, ColumnRole, CorrelationMatrix, DescriptiveSection, EdaReport,
    MissingValueSummary, PairingStatus, SummaryStats, TestKind, TestOutcome, TrendOverview,
};
use crate::utils::format_number;

/// Datetime sections list at most this many buckets.
const MAX_BUCKET_ROWS: usize = 60;
/// Outlier tables list at most this many rows.
const MAX_OUTLIER_ROWS: usize = 50;

/// Where a section sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Overview,
    Descriptive,
    Relationship,
}

/// A table with optional caption; `headers` may be empty for key/value tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn key_value(rows: Vec<(&str, String)>) -> Self {
        Self {
            caption: None,
            headers: Vec::new(),
            rows: rows
                .into_iter()
                .map(|(k, v)| vec![k.to_string(), v])
                .collect(),
        }
    }

    fn with_headers(caption: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            caption: Some(caption.to_string()),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }
}

/// An image embedded by relative path.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub caption: String,
}

impl ImageRef {
    /// Path as written into the document, always with forward slashes.
    pub fn src(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub heading: String,
    pub tables: Vec<Table>,
    pub notes: Vec<String>,
    pub images: Vec<ImageRef>,
}

impl ReportSection {
    fn new(kind: SectionKind, heading: impl Into<String>) -> Self {
        Self {
            kind,
            heading: heading.into(),
            tables: Vec::new(),
            notes: Vec::new(),
            images: Vec::new(),
        }
    }
}

/// Ordered report content, rendered once to HTML.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: String,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    /// Every image the document references.
    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        self.sections.iter().flat_map(|s| s.images.iter())
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

fn image(path: &Path, present: &dyn Fn(&Path) -> bool, caption: String) -> Option<ImageRef> {
    present(path).then(|| ImageRef {
        path: path.to_path_buf(),
        caption,
    })
}

// ============================================================================
// Overview
// ============================================================================

pub(crate) fn overview_section(report: &EdaReport) -> ReportSection {
    let mut section = ReportSection::new(SectionKind::Overview, "Dataset overview");
    let target_role = report
        .target
        .role
        .map(|r| r.display_name().to_string())
        .unwrap_or_else(|| "not classifiable".to_string());

    section.tables.push(Table::key_value(vec![
        ("Rows", report.rows.to_string()),
        ("Columns", report.columns.to_string()),
        ("Target", format!("{} ({target_role})", report.target.column)),
        (
            "Identifier",
            report
                .target
                .identifier
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        ),
        ("Significance level", format!("{}", report.significance_level)),
        ("Generated at", report.generated_at.clone()),
    ]));

    let mut role_counts: BTreeMap<ColumnRole, usize> = BTreeMap::new();
    for column in &report.classification.columns {
        *role_counts.entry(column.role).or_insert(0) += 1;
    }
    section.tables.push(Table::with_headers(
        "Column roles",
        &["Role", "Columns"],
        role_counts
            .iter()
            .map(|(role, count)| vec![role.display_name().to_string(), count.to_string()])
            .collect(),
    ));

    let excluded = report.excluded();
    if !excluded.is_empty() {
        section.tables.push(Table::with_headers(
            "Excluded columns",
            &["Column", "Stage", "Reason"],
            excluded
                .iter()
                .map(|e| {
                    vec![
                        e.name.clone(),
                        e.stage.display_name().to_string(),
                        e.reason.clone(),
                    ]
                })
                .collect(),
        ));
    }

    let failed: Vec<Vec<String>> = report
        .relationships
        .iter()
        .filter_map(|r| {
            r.failure_reason().map(|reason| {
                vec![
                    r.column.clone(),
                    r.test.display_name().to_string(),
                    reason.to_string(),
                ]
            })
        })
        .collect();
    if !failed.is_empty() {
        section.tables.push(Table::with_headers(
            "Comparisons that could not be computed",
            &["Column", "Test", "Reason"],
            failed,
        ));
    }

    section.notes.extend(report.warnings.iter().cloned());
    section
}

// ============================================================================
// Descriptive sections
// ============================================================================

/// `qq` is the column's Q-Q plot, shown under its main chart.
pub(crate) fn descriptive_section(
    section: &DescriptiveSection,
    alpha: f64,
    qq: Option<&Path>,
    present: &dyn Fn(&Path) -> bool,
) -> ReportSection {
    let mut out = ReportSection::new(
        SectionKind::Descriptive,
        format!("{} ({})", section.column, section.role),
    );

    let caption = match &section.stats {
        SummaryStats::Continuous(s) => {
            out.tables.push(Table::key_value(vec![
                ("Count", s.count.to_string()),
                ("Missing", s.missing.to_string()),
                ("Mean", format_number(s.mean)),
                ("Std. deviation", format_number(s.std_dev)),
                ("Min", format_number(s.min)),
                ("Q1", format_number(s.q1)),
                ("Median", format_number(s.median)),
                ("Q3", format_number(s.q3)),
                ("Max", format_number(s.max)),
                ("IQR", format_number(s.iqr)),
                ("Skewness", format_number(s.skewness)),
                ("Excess kurtosis", format_number(s.kurtosis)),
                (
                    "Outlier fences (1.5 IQR)",
                    format!(
                        "{} to {}",
                        format_number(s.lower_fence),
                        format_number(s.upper_fence)
                    ),
                ),
                ("Outliers", s.outliers.len().to_string()),
            ]));
            if !s.outliers.is_empty() {
                out.tables.push(Table::with_headers(
                    "Outlier records",
                    &["Row", "Value", "Side"],
                    s.outliers
                        .iter()
                        .take(MAX_OUTLIER_ROWS)
                        .map(|o| {
                            let side = if o.value < s.lower_fence { "low" } else { "high" };
                            vec![o.row.to_string(), format_number(o.value), side.to_string()]
                        })
                        .collect(),
                ));
                if s.outliers.len() > MAX_OUTLIER_ROWS {
                    out.notes.push(format!(
                        "Showing the first {MAX_OUTLIER_ROWS} of {} outliers.",
                        s.outliers.len()
                    ));
                }
            }
            if !s.normality.is_empty() {
                out.tables.push(Table::with_headers(
                    "Normality tests",
                    &["Test", "Statistic", "p-value", "Verdict"],
                    s.normality
                        .iter()
                        .map(|check| {
                            let verdict = if check.consistent_with_normal {
                                "consistent with a normal distribution"
                            } else {
                                "not consistent with a normal distribution"
                            };
                            vec![
                                check.test.clone(),
                                format_number(check.statistic),
                                format_number(check.p_value),
                                format!("{verdict} at alpha = {alpha}"),
                            ]
                        })
                        .collect(),
                ));
            }
            format!("Histogram of {}", section.column)
        }
        SummaryStats::Categorical(s) => {
            out.tables.push(Table::key_value(vec![
                ("Count", s.count.to_string()),
                ("Missing", s.missing.to_string()),
                ("Mode", s.mode.clone()),
            ]));
            out.tables.push(Table::with_headers(
                "Frequencies",
                &["Value", "Count", "Percent"],
                s.frequencies
                    .iter()
                    .map(|f| {
                        vec![
                            f.value.clone(),
                            f.count.to_string(),
                            format!("{:.1}%", f.percentage),
                        ]
                    })
                    .collect(),
            ));
            format!("Bar chart of {} frequencies", section.column)
        }
        SummaryStats::Datetime(s) => {
            out.tables.push(Table::key_value(vec![
                ("Count", s.count.to_string()),
                ("Missing", s.missing.to_string()),
                ("Earliest", s.earliest.clone()),
                ("Latest", s.latest.clone()),
                ("Range (days)", format!("{:.2}", s.range_days)),
                ("Bucket", s.granularity.clone()),
            ]));
            out.tables.push(Table::with_headers(
                "Observations per bucket",
                &["Bucket start", "Count"],
                s.buckets
                    .iter()
                    .take(MAX_BUCKET_ROWS)
                    .map(|b| vec![b.label.clone(), b.count.to_string()])
                    .collect(),
            ));
            if s.buckets.len() > MAX_BUCKET_ROWS {
                out.notes.push(format!(
                    "Showing the first {MAX_BUCKET_ROWS} of {} buckets.",
                    s.buckets.len()
                ));
            }
            format!("Observations of {} per {}", section.column, s.granularity)
        }
    };

    out.images.extend(image(&section.chart, present, caption));
    if let Some(qq) = qq {
        let caption = format!(
            "Normal Q-Q plot of {}; the line is a normal distribution with the sample mean \
             and standard deviation",
            section.column
        );
        out.images.extend(image(qq, present, caption));
    }
    out
}

// ============================================================================
// Dataset diagnostics
// ============================================================================

pub(crate) fn missing_values_section(
    summary: &MissingValueSummary,
    present: &dyn Fn(&Path) -> bool,
) -> ReportSection {
    let mut out = ReportSection::new(SectionKind::Overview, "Missing values");
    out.tables.push(Table::with_headers(
        "Missing values per column",
        &["Column", "Missing", "Percent"],
        summary
            .columns
            .iter()
            .map(|c| {
                vec![
                    c.column.clone(),
                    c.missing.to_string(),
                    format!("{:.1}%", c.percentage),
                ]
            })
            .collect(),
    ));
    if summary.total_missing() == 0 {
        out.notes.push("The dataset has no missing values.".to_string());
    }
    if let Some(chart) = &summary.chart {
        let caption = if summary.rows_per_band > 1 {
            format!(
                "Share of missing values per column, rows merged in bands of {}",
                summary.rows_per_band
            )
        } else {
            "Missing values by row and column".to_string()
        };
        out.images.extend(image(chart, present, caption));
    }
    out
}

pub(crate) fn correlation_section(
    matrix: &CorrelationMatrix,
    present: &dyn Fn(&Path) -> bool,
) -> ReportSection {
    let mut out = ReportSection::new(SectionKind::Overview, "Correlation matrix");
    let mut headers = vec![""];
    headers.extend(matrix.columns.iter().map(String::as_str));
    out.tables.push(Table::with_headers(
        "Pearson r over rows where both columns are present",
        &headers,
        matrix
            .columns
            .iter()
            .zip(&matrix.coefficients)
            .map(|(name, row)| {
                let mut cells = vec![name.clone()];
                cells.extend(row.iter().map(|r| match r {
                    Some(r) => format!("{r:.2}"),
                    None => "n/a".to_string(),
                }));
                cells
            })
            .collect(),
    ));
    if matrix.coefficients.iter().flatten().any(Option::is_none) {
        out.notes.push(
            "n/a: fewer than three complete rows, or one of the columns is constant.".to_string(),
        );
    }
    if let Some(chart) = &matrix.chart {
        let caption = "Heatmap of the correlation matrix".to_string();
        out.images.extend(image(chart, present, caption));
    }
    out
}

/// `None` when the chart was not drawn; the panels alone carry no numbers.
pub(crate) fn trend_section(
    trend: &TrendOverview,
    present: &dyn Fn(&Path) -> bool,
) -> Option<ReportSection> {
    let chart = trend.chart.as_deref()?;
    let mut out = ReportSection::new(SectionKind::Overview, "Numeric columns over time");
    let caption = format!(
        "{} as mean value per timestamp",
        trend
            .panels
            .iter()
            .map(|(time, value)| format!("{value} over {time}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    out.images.push(image(chart, present, caption)?);
    Some(out)
}

// ============================================================================
// Relationship sections
// ============================================================================

pub(crate) fn relationship_section(
    result: &AnalysisResult,
    target: &str,
    alpha: f64,
    present: &dyn Fn(&Path) -> bool,
) -> Option<ReportSection> {
    let TestOutcome::Computed {
        result: stat,
        significant,
    } = &result.outcome
    else {
        return None;
    };

    let mut out = ReportSection::new(
        SectionKind::Relationship,
        format!("{} vs {}", result.column, target),
    );

    let mut rows = vec![
        ("Test", result.test.display_name().to_string()),
        ("Feature role", result.role.display_name().to_string()),
        ("Target role", result.target_role.display_name().to_string()),
        ("Statistic", format_number(stat.statistic)),
        ("p-value", format_number(stat.p_value)),
    ];
    if let Some(df) = stat.degrees_of_freedom {
        rows.push(("Degrees of freedom", format_number(df)));
    }
    rows.push(("Sample size", stat.sample_size.to_string()));
    if let Some(estimate) = stat.estimate {
        let label = match result.test {
            TestKind::PearsonCorrelation => "Correlation (r)",
            _ => "Mean difference",
        };
        rows.push((label, format_number(estimate)));
    }
    rows.push(("Significant at alpha", format!("{} ({alpha})", yes_no(*significant))));
    out.tables.push(Table::key_value(rows));

    match &result.pairing {
        PairingStatus::NotRequested => {}
        PairingStatus::Paired { pairs } => {
            out.notes.push(format!("Observations paired by identifier ({pairs} pairs)."));
        }
        PairingStatus::FellBack { reason } => {
            out.notes.push(format!(
                "Paired test not possible ({reason}); the independent two-sample test was used."
            ));
        }
    }

    if !result.groups.is_empty() {
        out.tables.push(Table::with_headers(
            "Groups",
            &["Level", "Count", "Mean", "Std. deviation"],
            result
                .groups
                .iter()
                .map(|g| {
                    vec![
                        g.level.clone(),
                        g.count.to_string(),
                        format_number(g.mean),
                        format_number(g.std_dev),
                    ]
                })
                .collect(),
        ));
    }

    if let Some(companion) = &result.companion {
        out.tables.push(Table::with_headers(
            "Non-parametric companion",
            &["Test", "Statistic", "p-value", "Significant"],
            vec![vec![
                companion.name.clone(),
                format_number(companion.result.statistic),
                format_number(companion.result.p_value),
                yes_no(companion.significant),
            ]],
        ));
    }

    if let Some(chart) = &result.chart {
        let caption = match result.test {
            TestKind::PearsonCorrelation => {
                format!("Scatter plot of {} against {target}", result.column)
            }
            TestKind::ChiSquareIndependence => {
                format!("Counts of {target} within each level of {}", result.column)
            }
            _ => match result.groups.as_slice() {
                [first, second] => format!(
                    "Boxplots for groups '{}' (left) and '{}' (right)",
                    first.level, second.level
                ),
                _ => "Grouped boxplot".to_string(),
            },
        };
        out.images.extend(image(chart, present, caption));
    }

    Some(out)
}
