//! Correlation coefficients and group summaries

use statrs::statistics::{Data, OrderStatistics, RankTieBreaker, Statistics};

use trex_core::{Result, TrexError};

fn check_inputs(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(TrexError::DimensionMismatch {
            expected: vec![x.len()],
            actual: vec![y.len()],
        });
    }
    if x.len() < 2 {
        return Err(TrexError::UndefinedCorrelation(format!(
            "need at least 2 points, got {}",
            x.len()
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(TrexError::UndefinedCorrelation(
            "inputs contain non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Pearson product-moment correlation
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    check_inputs(x, y)?;
    let mean_x = x.mean();
    let mean_y = y.mean();

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if !(sxx.is_finite() && syy.is_finite() && sxy.is_finite()) {
        return Err(TrexError::UndefinedCorrelation(
            "sums of squares overflow".to_string(),
        ));
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(TrexError::UndefinedCorrelation(
            "one of the inputs is constant".to_string(),
        ));
    }

    // sqrt of the product is exact for x against itself; fall back when it underflows
    let product = sxx * syy;
    let denominator = if product.is_normal() {
        product.sqrt()
    } else {
        sxx.sqrt() * syy.sqrt()
    };
    let r = sxy / denominator;
    if !r.is_finite() {
        return Err(TrexError::UndefinedCorrelation(format!(
            "non-finite correlation {r}"
        )));
    }
    Ok(r.clamp(-1.0, 1.0))
}

/// Spearman rank correlation; tied values share their average rank
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    check_inputs(x, y)?;
    let rank_x = Data::new(x.to_vec()).ranks(RankTieBreaker::Average);
    let rank_y = Data::new(y.to_vec()).ranks(RankTieBreaker::Average);
    pearson(&rank_x, &rank_y)
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    (values.mean(), values.population_std_dev())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const X: [f64; 6] = [0.3, -1.2, 4.0, 2.5, 2.5, 7.1];

    #[test]
    fn self_correlation_is_one() {
        assert_eq!(pearson(&X, &X).unwrap(), 1.0);
        assert_eq!(spearman(&X, &X).unwrap(), 1.0);
    }

    #[test]
    fn negated_correlation_is_minus_one() {
        let neg: Vec<f64> = X.iter().map(|v| -v).collect();
        assert_eq!(pearson(&X, &neg).unwrap(), -1.0);
        assert_eq!(spearman(&X, &neg).unwrap(), -1.0);
    }

    #[test]
    fn too_few_points_is_an_error() {
        assert!(matches!(pearson(&[1.0], &[2.0]), Err(TrexError::UndefinedCorrelation(_))));
        assert!(matches!(spearman(&[], &[]), Err(TrexError::UndefinedCorrelation(_))));
    }

    #[test]
    fn constant_input_is_an_error() {
        assert!(matches!(
            pearson(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]),
            Err(TrexError::UndefinedCorrelation(_))
        ));
        assert!(matches!(
            spearman(&[2.0, 2.0], &[1.0, 3.0]),
            Err(TrexError::UndefinedCorrelation(_))
        ));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            pearson(&[1.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(TrexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn spearman_ignores_monotone_transforms() {
        let cubed: Vec<f64> = X.iter().map(|v| v.powi(3)).collect();
        assert_relative_eq!(spearman(&X, &cubed).unwrap(), 1.0, epsilon = 1e-12);
        assert!(pearson(&X, &cubed).unwrap() < 1.0);
    }

    #[test]
    fn spearman_averages_tied_ranks() {
        // Ranks of x: [1, 2.5, 2.5, 4]
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        let expected = pearson(&[1.0, 2.5, 2.5, 4.0], &y).unwrap();
        assert_relative_eq!(spearman(&x, &y).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn huge_inputs_are_an_error_not_nan() {
        let x = [1e160, 2e160, 3e160];
        assert!(matches!(pearson(&x, &x), Err(TrexError::UndefinedCorrelation(_))));
        assert!(matches!(
            pearson(&x, &[1.0, 2.0, 3.0]),
            Err(TrexError::UndefinedCorrelation(_))
        ));
    }

    #[test]
    fn tiny_inputs_stay_finite() {
        let x = [1e-150, 2e-150, 4e-150];
        let y = [3.0, 1.0, 7.0];
        let r = pearson(&x, &x).unwrap();
        assert_relative_eq!(r, 1.0, epsilon = 1e-12);
        let r = pearson(&x, &y).unwrap();
        assert!(r.is_finite() && (-1.0..=1.0).contains(&r));
    }

    #[test]
    fn known_pearson_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 0.774_596_669_241_483, epsilon = 1e-12);
    }

    #[test]
    fn group_summary_uses_population_std() {
        let (mean, std) = mean_std(&[0.2, 0.4, 0.6]);
        assert_relative_eq!(mean, 0.4, epsilon = 1e-12);
        assert_relative_eq!(std, (0.08_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }
}
