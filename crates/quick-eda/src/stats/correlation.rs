//! Pearson product-moment correlation.

use super::{StatResult, StatTestError, require, t_two_sided_p};
use crate::types::TestStatistic;
use crate::utils::mean;

/// Pearson correlation between paired samples.
///
/// The statistic is `r`; significance uses `t = r * sqrt((n - 2) / (1 - r^2))`
/// with `n - 2` degrees of freedom.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> StatResult<TestStatistic> {
    let n = x.len().min(y.len());
    require(3, n)?;
    let (x, y) = (&x[..n], &y[..n]);

    let mean_x = mean(x);
    let mean_y = mean(y);
    let mut cov = 0.0;
    let mut ss_x = 0.0;
    let mut ss_y = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        ss_x += dx * dx;
        ss_y += dy * dy;
    }

    if ss_x <= 0.0 || ss_y <= 0.0 {
        return Err(StatTestError::ZeroVariance(
            "one of the columns is constant".to_string(),
        ));
    }

    let r = (cov / (ss_x.sqrt() * ss_y.sqrt())).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let p_value = if (1.0 - r.abs()) < 1e-12 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        t_two_sided_p(t, df)?
    };

    Ok(TestStatistic {
        statistic: r,
        p_value,
        degrees_of_freedom: Some(df),
        sample_size: n,
        estimate: Some(r),
    })
}
