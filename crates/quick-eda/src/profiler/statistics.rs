//! Descriptive statistics per column role.

use normality::{anderson_darling, shapiro_wilk};
use std::collections::BTreeMap;

use crate::error::{EdaError, Result};
use crate::types::{
    CategoricalStats, CategoryCount, ContinuousStats, DatetimeStats, NormalityCheck,
    OutlierRecord, TimeBucket,
};
use crate::utils::{
    bucket_timestamps, format_timestamp, infer_time_granularity, mean, quantile_sorted,
    sample_variance,
};

/// Sample sizes for which normality tests are reported.
const NORMALITY_MIN_N: usize = 3;
const NORMALITY_MAX_N: usize = 5000;

const DAY_MS: f64 = 86_400_000.0;

fn statistics_failed(column: &str, reason: impl Into<String>) -> EdaError {
    EdaError::StatisticsFailed {
        column: column.to_string(),
        reason: reason.into(),
    }
}

/// Summary statistics of a continuous column.
pub(crate) fn continuous_stats(
    column: &str,
    values: &[Option<f64>],
    alpha: f64,
) -> Result<ContinuousStats> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let n = observed.len();
    if n < 2 {
        return Err(statistics_failed(column, "fewer than 2 numeric values"));
    }

    let mut sorted = observed.clone();
    sorted.sort_by(f64::total_cmp);
    let min = sorted[0];
    let max = sorted[n - 1];

    let mean = mean(&observed);
    let std_dev = sample_variance(&observed).sqrt();
    let q1 = quantile_sorted(&sorted, 0.25);
    let median = quantile_sorted(&sorted, 0.5);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;

    let (skewness, kurtosis) = if std_dev > 0.0 {
        let m3 = observed.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n as f64;
        let m4 = observed.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n as f64;
        (m3 / std_dev.powi(3), m4 / std_dev.powi(4) - 3.0)
    } else {
        (0.0, 0.0)
    };

    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;
    let mut distinct = sorted.clone();
    distinct.dedup();
    let outliers = if distinct.len() > 2 {
        values
            .iter()
            .enumerate()
            .filter_map(|(row, value)| value.map(|value| OutlierRecord { row, value }))
            .filter(|record| record.value < lower_fence || record.value > upper_fence)
            .collect()
    } else {
        Vec::new()
    };

    Ok(ContinuousStats {
        count: n,
        missing: values.len() - n,
        mean,
        std_dev,
        min,
        q1,
        median,
        q3,
        max,
        iqr,
        skewness,
        kurtosis,
        lower_fence,
        upper_fence,
        outliers,
        normality: normality_checks(&observed, std_dev, alpha),
    })
}

fn normality_checks(values: &[f64], std_dev: f64, alpha: f64) -> Vec<NormalityCheck> {
    let n = values.len();
    if !(NORMALITY_MIN_N..=NORMALITY_MAX_N).contains(&n) || std_dev <= 0.0 {
        return Vec::new();
    }

    let mut checks = Vec::new();
    if let Ok(result) = shapiro_wilk(values.to_vec()) {
        push_check(&mut checks, "Shapiro-Wilk", result.statistic, result.p_value, alpha);
    }
    if let Ok(result) = anderson_darling(values.to_vec()) {
        push_check(
            &mut checks,
            "Anderson-Darling",
            result.statistic,
            result.p_value,
            alpha,
        );
    }
    checks
}

fn push_check(
    checks: &mut Vec<NormalityCheck>,
    test: &str,
    statistic: f64,
    p_value: f64,
    alpha: f64,
) {
    if !statistic.is_finite() || !p_value.is_finite() {
        return;
    }
    let p_value = p_value.clamp(0.0, 1.0);
    checks.push(NormalityCheck {
        test: test.to_string(),
        statistic,
        p_value,
        consistent_with_normal: p_value >= alpha,
    });
}

/// Frequency table of a categorical column.
pub(crate) fn categorical_stats(
    column: &str,
    values: &[Option<String>],
) -> Result<CategoricalStats> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }

    let total: usize = counts.values().sum();
    if total == 0 {
        return Err(statistics_failed(column, "no non-missing values"));
    }

    let mut frequencies: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(value, count)| CategoryCount {
            value: value.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    // BTreeMap iteration is ordered by value, so a stable sort keeps ties lexicographic.
    frequencies.sort_by(|a, b| b.count.cmp(&a.count));

    let mode = frequencies[0].value.clone();
    Ok(CategoricalStats {
        count: total,
        missing: values.len() - total,
        mode,
        frequencies,
    })
}

/// Range and per-bucket counts of a datetime column.
pub(crate) fn datetime_stats(column: &str, values: &[Option<i64>]) -> Result<DatetimeStats> {
    let observed: Vec<i64> = values.iter().flatten().copied().collect();
    let (Some(&earliest), Some(&latest)) = (observed.iter().min(), observed.iter().max()) else {
        return Err(statistics_failed(column, "no non-missing timestamps"));
    };

    let range_days = (latest - earliest) as f64 / DAY_MS;
    let granularity = infer_time_granularity(range_days);
    let buckets = bucket_timestamps(&observed, granularity)
        .into_iter()
        .map(|(start_ms, count)| TimeBucket {
            start_ms,
            label: format_timestamp(start_ms),
            count,
        })
        .collect();

    Ok(DatetimeStats {
        count: observed.len(),
        missing: values.len() - observed.len(),
        earliest: format_timestamp(earliest),
        latest: format_timestamp(latest),
        range_days,
        granularity: granularity.to_string(),
        buckets,
    })
}
