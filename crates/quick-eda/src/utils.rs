//! Shared utilities for the EDA pipeline.
//!
//! Helpers used by more than one stage: mapping polars dtypes onto
//! [`DeclaredType`], pulling row-aligned values out of a series, quantiles,
//! histogram binning, time bucketing, and the string handling needed for
//! chart file names and HTML output.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;

use crate::types::DeclaredType;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is a signed or unsigned integer.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Map a polars dtype onto the declared type used for role inference.
pub fn declared_type(dtype: &DataType) -> DeclaredType {
    if is_integer_dtype(dtype) {
        DeclaredType::Integer
    } else if matches!(dtype, DataType::Float32 | DataType::Float64) {
        DeclaredType::Float
    } else if matches!(dtype, DataType::Datetime(_, _) | DataType::Date) {
        DeclaredType::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        // Kept apart from the numeric types: booleans are treated as labels.
        DeclaredType::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DeclaredType::String
    } else {
        DeclaredType::Other(dtype.to_string())
    }
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Row-aligned numeric values; nulls and non-finite floats become `None`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect())
}

/// Row-aligned string labels; booleans render as `true`/`false`.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Row-aligned timestamps in milliseconds since the Unix epoch.
pub fn timestamp_values(series: &Series) -> PolarsResult<Vec<Option<i64>>> {
    let casted = series
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

/// Row-aligned missing flags, counting non-finite floats as missing.
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    match declared_type(series.dtype()) {
        DeclaredType::Float => Ok(numeric_values(series)?
            .iter()
            .map(Option::is_none)
            .collect()),
        _ => Ok(series.is_null().into_iter().map(|v| v.unwrap_or(true)).collect()),
    }
}

/// Distinct non-missing values of a series.
pub fn distinct_count(series: &Series) -> PolarsResult<usize> {
    match declared_type(series.dtype()) {
        DeclaredType::Float => {
            // NaN is missing for this crate, polars counts it as a value.
            let values = numeric_values(series)?;
            let mut seen: Vec<f64> = values.into_iter().flatten().collect();
            seen.sort_by(f64::total_cmp);
            seen.dedup();
            Ok(seen.len())
        }
        _ => series.drop_nulls().n_unique(),
    }
}

/// Non-missing entries, treating non-finite floats as missing.
pub fn non_missing_count(series: &Series) -> PolarsResult<usize> {
    match declared_type(series.dtype()) {
        DeclaredType::Float => Ok(numeric_values(series)?.iter().flatten().count()),
        _ => Ok(series.len() - series.null_count()),
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile_sorted(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let pos = quantile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return values[lower];
    }
    let weight = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * weight
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); `NaN` below two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// One histogram bin, `[start, end)` except the last which is closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram over an ascending slice.
pub fn build_histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    if sorted.is_empty() {
        return Vec::new();
    }

    let min = sorted.first().copied().unwrap_or(0.0);
    let max = sorted.last().copied().unwrap_or(min);
    if (max - min).abs() < f64::EPSILON {
        // Widen a degenerate range so the bar has a visible extent.
        return vec![HistogramBin {
            start: min - 0.5,
            end: max + 0.5,
            count: sorted.len(),
        }];
    }

    let bin_count = bins.max(1);
    let width = (max - min) / bin_count as f64;
    let mut counts = vec![0usize; bin_count];

    for value in sorted {
        let mut index = ((value - min) / width) as usize;
        if index >= bin_count {
            index = bin_count - 1;
        }
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: min + idx as f64 * width,
            end: min + (idx as f64 + 1.0) * width,
            count,
        })
        .collect()
}

/// Average ranks (1-based) of `values`, ties sharing their mean rank.
///
/// Also returns `sum(t^3 - t)` over tie groups, the term used by tie
/// corrections of rank-test variances.
pub fn average_ranks(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut tie_term = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share ranks start+1 ..= end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        let t = (end - start) as f64;
        tie_term += t.powi(3) - t;
        start = end;
    }

    (ranks, tie_term)
}

// =============================================================================
// Time Utilities
// =============================================================================

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

/// Pick a bucket granularity from the span of the data.
pub fn infer_time_granularity(range_days: f64) -> &'static str {
    if range_days >= 730.0 {
        "month"
    } else if range_days >= 120.0 {
        "week"
    } else if range_days >= 2.0 {
        "day"
    } else if range_days >= 0.1 {
        "hour"
    } else {
        "minute"
    }
}

fn bucket_width_ms(granularity: &str) -> i64 {
    match granularity {
        "month" => 30 * DAY_MS,
        "week" => 7 * DAY_MS,
        "day" => DAY_MS,
        "hour" => HOUR_MS,
        _ => MINUTE_MS,
    }
}

/// Count timestamps per bucket, ascending by bucket start.
pub fn bucket_timestamps(values: &[i64], granularity: &str) -> Vec<(i64, usize)> {
    let width = bucket_width_ms(granularity);
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for value in values {
        let bucket = value - value.rem_euclid(width);
        *buckets.entry(bucket).or_insert(0) += 1;
    }
    buckets.into_iter().collect()
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

/// Render epoch milliseconds as `YYYY-MM-DD` (UTC).
pub fn format_date(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
        None => timestamp_ms.to_string(),
    }
}

// =============================================================================
// String Utilities
// =============================================================================

static NON_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid file name pattern"));

const MAX_STEM_LEN: usize = 40;

/// Reduce a column name to a safe, lowercase file stem.
///
/// Runs of anything other than ASCII letters and digits collapse to `_`.
/// An empty result becomes `column`.
pub fn sanitize_file_stem(name: &str) -> String {
    let replaced = NON_FILENAME_CHARS.replace_all(name, "_");
    let mut stem: String = replaced
        .trim_matches('_')
        .to_ascii_lowercase()
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    while stem.ends_with('_') {
        stem.pop();
    }
    if stem.is_empty() {
        "column".to_string()
    } else {
        stem
    }
}

/// Chart file name `<NN>_<stem>_<kind>.png` for the column at `index`.
pub fn chart_file_name(index: usize, column: &str, kind: &str) -> String {
    format!("{index:02}_{}_{kind}.png", sanitize_file_stem(column))
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Format a statistic for display: four significant decimals, with
/// scientific notation for very small magnitudes.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value.is_infinite() {
        (if value > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if value != 0.0 && value.abs() < 1e-4 {
        format!("{value:.3e}")
    } else {
        format!("{value:.4}")
    }
}

// =============================================================================
// Tests
// =============================================================================
