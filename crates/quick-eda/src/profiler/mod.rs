//! Column classification for dataset analysis.
//!
//! This module inspects each column once and decides how the rest of the
//! pipeline treats it:
//! - Declared type mapping (integer, float, string, boolean, datetime)
//! - Role inference (continuous, binary-categorical, datetime, identifier)
//! - Descriptive statistics per role

mod role_inference;
mod statistics;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{Result, ResultExt};
use crate::types::{
    AnalysisStage, Classification, ClassifiedColumn, ColumnRole, ExcludedColumn,
};
use crate::utils::{declared_type, distinct_count, non_missing_count};

pub use role_inference::{RoleDecision, classify_role};
pub(crate) use role_inference::unclassified_reason;
pub(crate) use statistics::{categorical_stats, continuous_stats, datetime_stats};

/// Assigns a statistical role to every column of a dataset.
pub struct ColumnClassifier;

impl ColumnClassifier {
    /// Classify every column, in dataset order.
    ///
    /// Columns that cannot be analyzed are recorded in
    /// [`Classification::excluded`]; this never fails because of a single
    /// column's content.
    pub fn classify_dataset(df: &DataFrame, identifier: Option<&str>) -> Result<Classification> {
        let mut classification = Classification::default();

        for (index, column) in df.get_columns().iter().enumerate() {
            let name = column.name().as_str();
            let series = column.as_materialized_series();
            let is_identifier = identifier == Some(name);

            let declared = declared_type(series.dtype());
            let non_missing =
                non_missing_count(series).context(format!("Counting values of '{name}'"))?;
            let distinct =
                distinct_count(series).context(format!("Counting distinct values of '{name}'"))?;

            match classify_role(&declared, distinct, non_missing, is_identifier) {
                RoleDecision::Assigned(role) => {
                    debug!(column = name, %declared, %role, distinct, "Classified column");
                    if role == ColumnRole::Unclassified {
                        let reason = unclassified_reason(&declared, distinct);
                        warn!(column = name, "Skipping column: {reason}");
                        classification.excluded.push(ExcludedColumn::new(
                            name,
                            AnalysisStage::Classification,
                            reason,
                        ));
                    }
                    classification.columns.push(ClassifiedColumn {
                        index,
                        name: name.to_string(),
                        declared_type: declared,
                        role,
                        non_missing,
                        missing: series.len() - non_missing,
                        distinct,
                    });
                }
                RoleDecision::Excluded(reason) => {
                    warn!(column = name, "Excluding column: {reason}");
                    classification.excluded.push(ExcludedColumn::new(
                        name,
                        AnalysisStage::Classification,
                        reason,
                    ));
                }
            }
        }

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df! {
            "age" => &[Some(21.0), Some(35.5), None, Some(40.0)],
            "group" => &["A", "B", "A", "B"],
            "id" => &[1i64, 2, 3, 4],
            "city" => &["Oslo", "Lima", "Pune", "Oslo"],
            "empty" => &[None::<f64>, None, None, None],
            "flag" => &[true, false, true, true],
        }
        .unwrap()
    }

    #[test]
    fn test_classify_dataset_roles() {
        let df = sample_df();
        let classification = ColumnClassifier::classify_dataset(&df, Some("id")).unwrap();

        assert_eq!(classification.role_of("age"), Some(ColumnRole::Continuous));
        assert_eq!(
            classification.role_of("group"),
            Some(ColumnRole::BinaryCategorical)
        );
        assert_eq!(classification.role_of("id"), Some(ColumnRole::Identifier));
        assert_eq!(classification.role_of("city"), Some(ColumnRole::Unclassified));
        assert_eq!(
            classification.role_of("flag"),
            Some(ColumnRole::BinaryCategorical)
        );
        assert_eq!(classification.role_of("empty"), None);
    }

    #[test]
    fn test_classify_dataset_records_exclusions() {
        let df = sample_df();
        let classification = ColumnClassifier::classify_dataset(&df, None).unwrap();

        let excluded: Vec<&str> = classification
            .excluded
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(excluded, vec!["city", "empty"]);
        assert!(
            classification
                .excluded
                .iter()
                .all(|e| e.stage == AnalysisStage::Classification)
        );
    }

    #[test]
    fn test_integer_without_identifier_is_continuous() {
        let df = sample_df();
        let classification = ColumnClassifier::classify_dataset(&df, None).unwrap();
        assert_eq!(classification.role_of("id"), Some(ColumnRole::Continuous));
    }

    #[test]
    fn test_counts_are_recorded() {
        let df = sample_df();
        let classification = ColumnClassifier::classify_dataset(&df, None).unwrap();
        let age = classification.get("age").unwrap();
        assert_eq!(age.index, 0);
        assert_eq!(age.non_missing, 3);
        assert_eq!(age.missing, 1);
        assert_eq!(age.distinct, 3);
    }
}
