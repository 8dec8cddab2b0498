//! Hypothesis tests used by the relationship analyzer.
//!
//! Every test returns the raw [`TestStatistic`]; deciding significance is left
//! to the caller, which owns the significance level. P-values are evaluated
//! against `statrs` distributions and clamped to `[0, 1]`.

mod chi_square;
mod correlation;
mod nonparametric;
mod ttest;

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use thiserror::Error;

pub use chi_square::{ContingencyTable, chi_square_independence};
pub use correlation::pearson_correlation;
pub use nonparametric::{mann_whitney_u, wilcoxon_signed_rank};
pub use ttest::{independent_t_test, paired_t_test};

/// Why a test could not produce a statistic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatTestError {
    #[error("not enough observations: {got} available, {needed} required")]
    InsufficientData { needed: usize, got: usize },

    #[error("zero variance: {0}")]
    ZeroVariance(String),

    #[error("degenerate contingency table: {0}")]
    DegenerateTable(String),

    #[error("distribution error: {0}")]
    Distribution(String),
}

pub type StatResult<T> = std::result::Result<T, StatTestError>;

pub(crate) fn require(needed: usize, got: usize) -> StatResult<()> {
    if got < needed {
        return Err(StatTestError::InsufficientData { needed, got });
    }
    Ok(())
}

fn clamp_p(p_value: f64) -> StatResult<f64> {
    if p_value.is_nan() {
        return Err(StatTestError::Distribution("p-value is not a number".to_string()));
    }
    Ok(p_value.clamp(0.0, 1.0))
}

/// Two-sided p-value of a t statistic.
pub(crate) fn t_two_sided_p(t: f64, df: f64) -> StatResult<f64> {
    let dist =
        StudentsT::new(0.0, 1.0, df).map_err(|e| StatTestError::Distribution(e.to_string()))?;
    clamp_p(2.0 * (1.0 - dist.cdf(t.abs())))
}

/// Two-sided p-value of a standard normal statistic.
pub(crate) fn z_two_sided_p(z: f64) -> StatResult<f64> {
    let dist = Normal::new(0.0, 1.0).map_err(|e| StatTestError::Distribution(e.to_string()))?;
    clamp_p(2.0 * (1.0 - dist.cdf(z.abs())))
}

/// Upper-tail p-value of a chi-square statistic.
pub(crate) fn chi2_upper_p(statistic: f64, df: f64) -> StatResult<f64> {
    let dist = ChiSquared::new(df).map_err(|e| StatTestError::Distribution(e.to_string()))?;
    clamp_p(1.0 - dist.cdf(statistic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_t_two_sided_p_reference_values() {
        assert!((t_two_sided_p(0.0, 10.0).unwrap() - 1.0).abs() < 1e-12);
        // t = 2.228 is the 97.5% quantile for 10 degrees of freedom.
        assert!((t_two_sided_p(2.228_138_85, 10.0).unwrap() - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_z_two_sided_p_reference_values() {
        assert!((z_two_sided_p(1.959_963_98).unwrap() - 0.05).abs() < 1e-6);
        assert!((z_two_sided_p(-1.959_963_98).unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_chi2_upper_p_reference_values() {
        // 3.841 is the 95% quantile of chi-square with one degree of freedom.
        assert!((chi2_upper_p(3.841_458_82, 1.0).unwrap() - 0.05).abs() < 1e-6);
        assert!((chi2_upper_p(0.0, 1.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_degrees_of_freedom() {
        assert!(matches!(
            t_two_sided_p(1.0, 0.0),
            Err(StatTestError::Distribution(_))
        ));
    }

    #[test]
    fn test_require() {
        assert!(require(2, 2).is_ok());
        assert_eq!(
            require(3, 1),
            Err(StatTestError::InsufficientData { needed: 3, got: 1 })
        );
    }
}
