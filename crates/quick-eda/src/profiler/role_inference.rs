//! Role inference logic for column classification.

use crate::types::{ColumnRole, DeclaredType};

/// Minimum non-missing values for a column to be analyzed at all.
pub(crate) const MIN_NON_MISSING: usize = 2;

/// Outcome of classifying a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDecision {
    Assigned(ColumnRole),
    /// The column cannot be analyzed; the reason goes into the overview.
    Excluded(String),
}

/// Infer the role of a column from its declared type and counts.
///
/// The identifier override wins over every other rule. Otherwise columns with
/// fewer than two observed values are excluded, numeric types are continuous,
/// date/datetime types are datetime, and string or boolean columns are binary
/// categorical only when they hold exactly two distinct values.
pub fn classify_role(
    declared: &DeclaredType,
    distinct: usize,
    non_missing: usize,
    is_identifier: bool,
) -> RoleDecision {
    if is_identifier {
        return RoleDecision::Assigned(ColumnRole::Identifier);
    }

    if non_missing < MIN_NON_MISSING {
        let reason = if non_missing == 0 {
            "column contains only missing values".to_string()
        } else {
            format!("only {non_missing} non-missing value (at least {MIN_NON_MISSING} needed)")
        };
        return RoleDecision::Excluded(reason);
    }

    let role = if declared.is_numeric() {
        ColumnRole::Continuous
    } else if *declared == DeclaredType::Datetime {
        ColumnRole::Datetime
    } else if declared.is_object() && distinct == 2 {
        // Booleans are labels here, not 0/1 numbers: a two-valued boolean
        // gets frequencies and chi-square/t-tests like any binary label.
        ColumnRole::BinaryCategorical
    } else {
        ColumnRole::Unclassified
    };

    RoleDecision::Assigned(role)
}

/// Explain why a column ended up unclassified.
pub(crate) fn unclassified_reason(declared: &DeclaredType, distinct: usize) -> String {
    match declared {
        DeclaredType::Other(dtype) => {
            format!("unsupported data type '{dtype}'; encode it manually to include it")
        }
        _ => format!(
            "{declared} column with {distinct} distinct values is not binary; \
             encode it manually to include it"
        ),
    }
}
