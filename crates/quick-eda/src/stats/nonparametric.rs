//! Rank-based companions of the t-tests.
//!
//! Both tests use the normal approximation with a tie-corrected variance.

use super::{StatResult, StatTestError, require, z_two_sided_p};
use crate::types::TestStatistic;
use crate::utils::average_ranks;

/// Mann-Whitney U test for two independent samples.
///
/// The statistic is `U` of the first sample. A continuity correction of 0.5
/// is applied to the z score.
pub fn mann_whitney_u(first: &[f64], second: &[f64]) -> StatResult<TestStatistic> {
    require(1, first.len())?;
    require(1, second.len())?;

    let n1 = first.len() as f64;
    let n2 = second.len() as f64;
    let n = n1 + n2;

    let combined: Vec<f64> = first.iter().chain(second.iter()).copied().collect();
    let (ranks, tie_term) = average_ranks(&combined);
    let rank_sum: f64 = ranks[..first.len()].iter().sum();
    let u = rank_sum - n1 * (n1 + 1.0) / 2.0;

    let mean_u = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance.is_nan() || variance <= 0.0 {
        return Err(StatTestError::ZeroVariance(
            "all observations are tied".to_string(),
        ));
    }

    let deviation = ((u - mean_u).abs() - 0.5).max(0.0);
    let z = deviation / variance.sqrt();

    Ok(TestStatistic {
        statistic: u,
        p_value: z_two_sided_p(z)?,
        degrees_of_freedom: None,
        sample_size: first.len() + second.len(),
        estimate: None,
    })
}

/// Wilcoxon signed-rank test on paired samples.
///
/// Zero differences are dropped before ranking. The statistic is the sum of
/// ranks of the positive differences.
pub fn wilcoxon_signed_rank(first: &[f64], second: &[f64]) -> StatResult<TestStatistic> {
    let diffs: Vec<f64> = first
        .iter()
        .zip(second.iter())
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    require(1, diffs.len())?;

    let magnitudes: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, tie_term) = average_ranks(&magnitudes);
    let w_plus: f64 = diffs
        .iter()
        .zip(ranks.iter())
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();

    let n = diffs.len() as f64;
    let mean_w = n * (n + 1.0) / 4.0;
    let variance = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_term / 48.0;
    if variance.is_nan() || variance <= 0.0 {
        return Err(StatTestError::ZeroVariance(
            "signed ranks have no spread".to_string(),
        ));
    }

    let z = (w_plus - mean_w) / variance.sqrt();
    Ok(TestStatistic {
        statistic: w_plus,
        p_value: z_two_sided_p(z)?,
        degrees_of_freedom: None,
        sample_size: diffs.len(),
        estimate: None,
    })
}
