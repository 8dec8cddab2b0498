//! Chi-square test of independence on a contingency table.

use std::collections::{BTreeMap, BTreeSet};

use super::{StatResult, StatTestError, chi2_upper_p};
use crate::types::TestStatistic;

/// Observed counts for two label columns.
///
/// Row and column labels are kept in lexicographic order.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `counts[row][column]`
    pub counts: Vec<Vec<usize>>,
}

impl ContingencyTable {
    /// Cross-tabulate paired labels.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut cells: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        let mut rows: BTreeSet<&str> = BTreeSet::new();
        let mut columns: BTreeSet<&str> = BTreeSet::new();
        for (row, column) in pairs {
            *cells.entry((row, column)).or_insert(0) += 1;
            rows.insert(row);
            columns.insert(column);
        }

        let row_labels: Vec<String> = rows.iter().map(|s| s.to_string()).collect();
        let column_labels: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        let counts = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| cells.get(&(*row, *column)).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Self {
            row_labels,
            column_labels,
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn row_totals(&self) -> Vec<f64> {
        self.counts
            .iter()
            .map(|row| row.iter().sum::<usize>() as f64)
            .collect()
    }

    fn column_totals(&self) -> Vec<f64> {
        (0..self.column_labels.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum::<usize>() as f64)
            .collect()
    }
}

/// Pearson chi-square test of independence.
///
/// With `yates_correction` and a single degree of freedom each observed count
/// moves up to 0.5 towards its expected count before the statistic is summed.
pub fn chi_square_independence(
    table: &ContingencyTable,
    yates_correction: bool,
) -> StatResult<TestStatistic> {
    let rows = table.row_labels.len();
    let columns = table.column_labels.len();
    if rows < 2 || columns < 2 {
        return Err(StatTestError::DegenerateTable(format!(
            "{rows}x{columns} table; both variables need two observed levels"
        )));
    }

    let total = table.total() as f64;
    let row_totals = table.row_totals();
    let column_totals = table.column_totals();
    let df = ((rows - 1) * (columns - 1)) as f64;
    let correct = yates_correction && rows == 2 && columns == 2;

    let mut statistic = 0.0;
    for (i, row) in table.counts.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_totals[i] * column_totals[j] / total;
            if expected <= 0.0 {
                return Err(StatTestError::DegenerateTable(
                    "an expected count is zero".to_string(),
                ));
            }
            let mut deviation = (observed as f64 - expected).abs();
            if correct {
                deviation -= deviation.min(0.5);
            }
            statistic += deviation * deviation / expected;
        }
    }

    Ok(TestStatistic {
        statistic,
        p_value: chi2_upper_p(statistic, df)?,
        degrees_of_freedom: Some(df),
        sample_size: table.total(),
        estimate: None,
    })
}
