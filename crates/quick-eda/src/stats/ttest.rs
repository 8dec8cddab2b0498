//! Two-sample and paired t-tests.

use super::{StatResult, StatTestError, require, t_two_sided_p};
use crate::types::TestStatistic;
use crate::utils::{mean, sample_variance};

/// Two-sample t-test on `mean(first) - mean(second)`.
///
/// Pooled (Student) variance when `equal_variance`, Welch-Satterthwaite
/// otherwise.
pub fn independent_t_test(
    first: &[f64],
    second: &[f64],
    equal_variance: bool,
) -> StatResult<TestStatistic> {
    require(2, first.len())?;
    require(2, second.len())?;

    let n1 = first.len() as f64;
    let n2 = second.len() as f64;
    let var1 = sample_variance(first);
    let var2 = sample_variance(second);
    let diff = mean(first) - mean(second);

    let (std_err, df) = if equal_variance {
        let pooled = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / (n1 + n2 - 2.0);
        ((pooled * (1.0 / n1 + 1.0 / n2)).sqrt(), n1 + n2 - 2.0)
    } else {
        let a = var1 / n1;
        let b = var2 / n2;
        let df = (a + b).powi(2) / (a.powi(2) / (n1 - 1.0) + b.powi(2) / (n2 - 1.0));
        ((a + b).sqrt(), df)
    };

    if std_err.is_nan() || std_err <= 0.0 {
        return Err(StatTestError::ZeroVariance(
            "both groups are constant".to_string(),
        ));
    }

    let t = diff / std_err;
    Ok(TestStatistic {
        statistic: t,
        p_value: t_two_sided_p(t, df)?,
        degrees_of_freedom: Some(df),
        sample_size: first.len() + second.len(),
        estimate: Some(diff),
    })
}

/// Paired t-test on the differences `first[i] - second[i]`.
pub fn paired_t_test(first: &[f64], second: &[f64]) -> StatResult<TestStatistic> {
    let pairs = first.len().min(second.len());
    require(2, pairs)?;

    let diffs: Vec<f64> = first
        .iter()
        .zip(second.iter())
        .map(|(a, b)| a - b)
        .collect();
    let mean_diff = mean(&diffs);
    let std_err = (sample_variance(&diffs) / pairs as f64).sqrt();
    if std_err.is_nan() || std_err <= 0.0 {
        return Err(StatTestError::ZeroVariance(
            "paired differences are constant".to_string(),
        ));
    }

    let t = mean_diff / std_err;
    let df = (pairs - 1) as f64;
    Ok(TestStatistic {
        statistic: t,
        p_value: t_two_sided_p(t, df)?,
        degrees_of_freedom: Some(df),
        sample_size: pairs,
        estimate: Some(mean_diff),
    })
}
