//! Feature-versus-target comparisons.
//!
//! Each testable column gets exactly one test chosen from its role and the
//! target's role:
//!
//! | feature            | target             | test                          |
//! |--------------------|--------------------|-------------------------------|
//! | continuous         | binary-categorical | two-sample or paired t-test   |
//! | binary-categorical | continuous         | two-sample or paired t-test   |
//! | continuous         | continuous         | Pearson correlation           |
//! | binary-categorical | binary-categorical | chi-square independence       |
//!
//! Rows missing either value are dropped for that comparison only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::charts::{BoxplotChart, ChartKind, ChartRenderer, GroupedBarChart, ScatterChart};
use crate::config::{EdaConfig, PairingPolicy, VISUALS_DIR_NAME};
use crate::error::{EdaError, Result};
use crate::stats::{
    ContingencyTable, StatResult, chi_square_independence, independent_t_test, mann_whitney_u,
    paired_t_test, pearson_correlation, wilcoxon_signed_rank,
};
use crate::types::{
    AnalysisResult, ClassifiedColumn, ColumnRole, CompanionTest, GroupSummary, PairingStatus,
    TestKind, TestOutcome, TestStatistic,
};
use crate::utils::{chart_file_name, mean, numeric_values, sample_variance, string_values};

/// Family of test a (feature, target) role pair calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Compare the means of a continuous column across two groups.
    /// `groups_from_feature` is true when the feature holds the labels.
    GroupMeans { groups_from_feature: bool },
    Correlation,
    Contingency,
}

/// Pick the comparison for a role pair, or explain why there is none.
pub fn plan_comparison(
    feature: ColumnRole,
    target: ColumnRole,
) -> std::result::Result<Comparison, String> {
    use ColumnRole::*;

    match (feature, target) {
        (Continuous, BinaryCategorical) => Ok(Comparison::GroupMeans {
            groups_from_feature: false,
        }),
        (BinaryCategorical, Continuous) => Ok(Comparison::GroupMeans {
            groups_from_feature: true,
        }),
        (Continuous, Continuous) => Ok(Comparison::Correlation),
        (BinaryCategorical, BinaryCategorical) => Ok(Comparison::Contingency),
        (feature, BinaryCategorical | Continuous) => {
            Err(format!("no test is defined for {feature} features"))
        }
        (_, target) => Err(format!("no test is defined against a {target} target")),
    }
}

/// A computed comparison plus warnings raised while charting it.
#[derive(Debug, Clone)]
pub struct ComparisonOutput {
    pub result: AnalysisResult,
    pub warnings: Vec<String>,
}

/// One complete row of a group comparison.
#[derive(Debug, Clone)]
struct Observation {
    level: String,
    value: f64,
    id: Option<String>,
}

/// Runs feature-versus-target tests and draws their charts.
pub struct RelationshipAnalyzer<'a> {
    config: &'a EdaConfig,
    renderer: &'a dyn ChartRenderer,
}

impl<'a> RelationshipAnalyzer<'a> {
    pub fn new(config: &'a EdaConfig, renderer: &'a dyn ChartRenderer) -> Self {
        Self { config, renderer }
    }

    /// Compare `feature` against `target`.
    ///
    /// An error means the pair is not testable at all (untestable roles or
    /// unreadable values); a test whose preconditions fail still produces a
    /// result with [`TestOutcome::Failed`].
    pub fn analyze(
        &self,
        df: &DataFrame,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
    ) -> Result<ComparisonOutput> {
        let comparison = plan_comparison(feature.role, target.role)
            .map_err(|reason| relationship_error(&feature.name, reason))?;
        debug!(column = %feature.name, ?comparison, "Comparing with target");

        match comparison {
            Comparison::GroupMeans {
                groups_from_feature,
            } => self.compare_groups(df, feature, target, groups_from_feature),
            Comparison::Correlation => self.correlate(df, feature, target),
            Comparison::Contingency => self.cross_tabulate(df, feature, target),
        }
    }

    // ------------------------------------------------------------------
    // t-tests
    // ------------------------------------------------------------------

    fn compare_groups(
        &self,
        df: &DataFrame,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
        groups_from_feature: bool,
    ) -> Result<ComparisonOutput> {
        let (value_column, group_column) = if groups_from_feature {
            (target, feature)
        } else {
            (feature, target)
        };

        let values = read_numeric(df, &value_column.name, &feature.name)?;
        let labels = read_labels(df, &group_column.name, &feature.name)?;
        let ids = match self.config.identifier_column.as_deref() {
            Some(id) => Some(read_labels(df, id, &feature.name)?),
            None => None,
        };

        let observations: Vec<Observation> = values
            .iter()
            .zip(labels.iter())
            .enumerate()
            .filter_map(|(row, (value, label))| {
                let (Some(value), Some(label)) = (value, label) else {
                    return None;
                };
                Some(Observation {
                    level: label.clone(),
                    value: *value,
                    id: ids.as_ref().and_then(|ids| ids[row].clone()),
                })
            })
            .collect();

        let mut by_level: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for obs in &observations {
            by_level.entry(obs.level.as_str()).or_default().push(obs.value);
        }

        let independent = TestKind::IndependentTTest {
            equal_variance: self.config.equal_variance,
        };
        let levels: Vec<&str> = by_level.keys().copied().collect();
        if levels.len() != 2 {
            let reason = format!(
                "'{}' has {} group(s) with complete observations; 2 are needed",
                group_column.name,
                levels.len()
            );
            let groups = by_level
                .iter()
                .map(|(level, values)| summarize_group(level, values))
                .collect();
            let result = self.failed(feature, target, independent, reason, groups);
            return Ok(ComparisonOutput {
                result,
                warnings: Vec::new(),
            });
        }
        let (first_level, second_level) = (levels[0], levels[1]);
        let first = &by_level[first_level];
        let second = &by_level[second_level];

        let paired = ids.is_some().then(|| {
            pair_by_identifier(&observations, first_level, self.config.pairing_policy)
        });
        let (test, main, companion, pairing, used) = match paired {
            Some(Ok((a, b))) => (
                TestKind::PairedTTest,
                paired_t_test(&a, &b),
                ("Wilcoxon signed-rank", wilcoxon_signed_rank(&a, &b)),
                PairingStatus::Paired { pairs: a.len() },
                (a, b),
            ),
            Some(Err(reason)) => {
                warn!(
                    column = %feature.name,
                    "Paired test not possible, using independent test: {reason}"
                );
                (
                    independent,
                    independent_t_test(first, second, self.config.equal_variance),
                    ("Mann-Whitney U", mann_whitney_u(first, second)),
                    PairingStatus::FellBack { reason },
                    (first.clone(), second.clone()),
                )
            }
            None => (
                independent,
                independent_t_test(first, second, self.config.equal_variance),
                ("Mann-Whitney U", mann_whitney_u(first, second)),
                PairingStatus::NotRequested,
                (first.clone(), second.clone()),
            ),
        };

        // Group summaries describe the values the test actually saw.
        let groups = vec![
            summarize_group(first_level, &used.0),
            summarize_group(second_level, &used.1),
        ];
        let mut result = self.build_result(feature, target, test, main, groups);
        result.pairing = pairing;
        result.companion = companion
            .1
            .ok()
            .filter(|_| result.is_computed())
            .map(|stat| CompanionTest {
                name: companion.0.to_string(),
                significant: stat.p_value < self.config.significance_level,
                result: stat,
            });

        let chart = BoxplotChart {
            title: format!("{} by {}", value_column.name, group_column.name),
            x_label: group_column.name.clone(),
            y_label: value_column.name.clone(),
            groups: vec![
                (first_level.to_string(), used.0),
                (second_level.to_string(), used.1),
            ],
        };
        let warnings = self.attach_chart(&mut result, feature, ChartKind::Boxplot, |path| {
            self.renderer.boxplot(path, &chart)
        });
        Ok(ComparisonOutput { result, warnings })
    }

    // ------------------------------------------------------------------
    // Correlation
    // ------------------------------------------------------------------

    fn correlate(
        &self,
        df: &DataFrame,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
    ) -> Result<ComparisonOutput> {
        let x = read_numeric(df, &feature.name, &feature.name)?;
        let y = read_numeric(df, &target.name, &feature.name)?;
        let points: Vec<(f64, f64)> = x
            .iter()
            .zip(y.iter())
            .filter_map(|pair| match pair {
                (Some(a), Some(b)) => Some((*a, *b)),
                _ => None,
            })
            .collect();
        let (xs, ys): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();

        let mut result = self.build_result(
            feature,
            target,
            TestKind::PearsonCorrelation,
            pearson_correlation(&xs, &ys),
            Vec::new(),
        );

        let chart = ScatterChart {
            title: format!("{} vs {}", feature.name, target.name),
            x_label: feature.name.clone(),
            y_label: target.name.clone(),
            points,
        };
        let warnings = self.attach_chart(&mut result, feature, ChartKind::Scatter, |path| {
            self.renderer.scatter(path, &chart)
        });
        Ok(ComparisonOutput { result, warnings })
    }

    // ------------------------------------------------------------------
    // Chi-square
    // ------------------------------------------------------------------

    fn cross_tabulate(
        &self,
        df: &DataFrame,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
    ) -> Result<ComparisonOutput> {
        let rows = read_labels(df, &feature.name, &feature.name)?;
        let columns = read_labels(df, &target.name, &feature.name)?;
        let table = ContingencyTable::from_pairs(rows.iter().zip(columns.iter()).filter_map(
            |pair| match pair {
                (Some(a), Some(b)) => Some((a.as_str(), b.as_str())),
                _ => None,
            },
        ));

        let mut result = self.build_result(
            feature,
            target,
            TestKind::ChiSquareIndependence,
            chi_square_independence(&table, self.config.yates_correction),
            Vec::new(),
        );

        let chart = GroupedBarChart {
            title: format!("{} by {}", target.name, feature.name),
            x_label: feature.name.clone(),
            series_label: target.name.clone(),
            categories: table.row_labels.clone(),
            series: table.column_labels.clone(),
            counts: table.counts.clone(),
        };
        let warnings = self.attach_chart(&mut result, feature, ChartKind::GroupedBar, |path| {
            self.renderer.grouped_bar(path, &chart)
        });
        Ok(ComparisonOutput { result, warnings })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn build_result(
        &self,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
        test: TestKind,
        outcome: StatResult<TestStatistic>,
        groups: Vec<GroupSummary>,
    ) -> AnalysisResult {
        match outcome {
            Ok(stat) => AnalysisResult {
                column: feature.name.clone(),
                role: feature.role,
                target_role: target.role,
                test,
                outcome: TestOutcome::Computed {
                    significant: stat.p_value < self.config.significance_level,
                    result: stat,
                },
                pairing: PairingStatus::NotRequested,
                groups,
                companion: None,
                chart: None,
            },
            Err(e) => self.failed(feature, target, test, e.to_string(), groups),
        }
    }

    fn failed(
        &self,
        feature: &ClassifiedColumn,
        target: &ClassifiedColumn,
        test: TestKind,
        reason: String,
        groups: Vec<GroupSummary>,
    ) -> AnalysisResult {
        warn!(column = %feature.name, test = test.display_name(), "Test not computed: {reason}");
        AnalysisResult {
            column: feature.name.clone(),
            role: feature.role,
            target_role: target.role,
            test,
            outcome: TestOutcome::Failed { reason },
            pairing: PairingStatus::NotRequested,
            groups,
            companion: None,
            chart: None,
        }
    }

    /// Draw the comparison chart of a computed result.
    ///
    /// Failed tests get no chart; a rendering error leaves the result intact
    /// and comes back as a warning.
    fn attach_chart(
        &self,
        result: &mut AnalysisResult,
        feature: &ClassifiedColumn,
        kind: ChartKind,
        draw: impl FnOnce(&std::path::Path) -> Result<()>,
    ) -> Vec<String> {
        if !result.is_computed() {
            return Vec::new();
        }

        let file_name = chart_file_name(feature.index, &feature.name, kind.file_suffix());
        let path = self.config.visuals_dir().join(&file_name);
        match draw(&path) {
            Ok(()) => {
                result.chart = Some(PathBuf::from(VISUALS_DIR_NAME).join(file_name));
                Vec::new()
            }
            Err(e) => {
                warn!(column = %feature.name, "Chart skipped: {e}");
                // A partially written image must not linger.
                let _ = std::fs::remove_file(&path);
                vec![format!("'{}': {e}", feature.name)]
            }
        }
    }
}

/// Pair group observations through the identifier.
///
/// Returns the paired values of `first_level` and the other level in
/// identifier order, or the reason pairing is not possible.
fn pair_by_identifier(
    observations: &[Observation],
    first_level: &str,
    policy: PairingPolicy,
) -> std::result::Result<(Vec<f64>, Vec<f64>), String> {
    let mut sides: [BTreeMap<&str, f64>; 2] = [BTreeMap::new(), BTreeMap::new()];

    let without_id = observations.iter().filter(|obs| obs.id.is_none()).count();
    if policy == PairingPolicy::Strict && without_id > 0 {
        return Err(format!("{without_id} observation(s) have no identifier"));
    }

    for obs in observations {
        // Only reachable under DropUnmatched: such rows sit out the paired test.
        let Some(id) = obs.id.as_deref() else {
            continue;
        };
        let side = usize::from(obs.level != first_level);
        if sides[side].insert(id, obs.value).is_some() {
            return Err(format!(
                "identifier '{id}' appears more than once in group '{}'",
                obs.level
            ));
        }
    }

    let unmatched = sides[0]
        .keys()
        .filter(|id| !sides[1].contains_key(*id))
        .count()
        + sides[1]
            .keys()
            .filter(|id| !sides[0].contains_key(*id))
            .count();

    if policy == PairingPolicy::Strict && unmatched > 0 {
        return Err(format!(
            "{unmatched} identifier(s) lack an observation in the other group"
        ));
    }

    let (first, second): (Vec<f64>, Vec<f64>) = sides[0]
        .iter()
        .filter_map(|(id, a)| sides[1].get(id).map(|b| (*a, *b)))
        .unzip();
    if first.len() < 2 {
        return Err(format!(
            "only {} complete pair(s); at least 2 are needed",
            first.len()
        ));
    }
    Ok((first, second))
}

fn summarize_group(level: &str, values: &[f64]) -> GroupSummary {
    GroupSummary {
        level: level.to_string(),
        count: values.len(),
        mean: mean(values),
        std_dev: sample_variance(values).sqrt(),
    }
}

fn relationship_error(column: &str, reason: impl std::fmt::Display) -> EdaError {
    EdaError::StatisticsFailed {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

fn read_numeric(df: &DataFrame, name: &str, feature: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|e| relationship_error(feature, e))?;
    numeric_values(column.as_materialized_series()).map_err(|e| relationship_error(feature, e))
}

fn read_labels(df: &DataFrame, name: &str, feature: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|e| relationship_error(feature, e))?;
    string_values(column.as_materialized_series()).map_err(|e| relationship_error(feature, e))
}
