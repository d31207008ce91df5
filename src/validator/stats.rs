//! Descriptive statistics used by the feature extractors

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0.0 for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Gini-like concentration over the sorted values.
///
/// `Σ (2i - n - 1) * x_i / (n * Σ x)` with 1-based `i`. Returns 0.0 for empty
/// input or a zero sum.
pub fn gini(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n - 1.0) * x)
        .sum();
    weighted / (n * total)
}

/// Fraction of values whose absolute z-score exceeds `threshold`.
///
/// 0.0 when the slice is empty or has no spread.
pub fn outlier_fraction(values: &[f64], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let sd = std_dev(values);
    if sd == 0.0 {
        return 0.0;
    }
    let outliers = values.iter().filter(|v| ((*v - m) / sd).abs() > threshold).count();
    outliers as f64 / values.len() as f64
}

/// Min-max scale into [0, 1], clipping out-of-range values
pub fn min_max_scale(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert!(approx(mean(&[2.0, 4.0, 6.0]), 4.0));
        // population std of [2,4,4,4,5,5,7,9] is exactly 2
        assert!(approx(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0));
    }

    #[test]
    fn test_gini_equal_values_is_zero() {
        assert!(approx(gini(&[5.0, 5.0, 5.0, 5.0]), 0.0));
    }

    #[test]
    fn test_gini_single_holder() {
        // n = 4, one non-zero value: (2*4 - 4 - 1) / 4 = 0.75
        assert!(approx(gini(&[0.0, 0.0, 10.0, 0.0]), 0.75));
    }

    #[test]
    fn test_gini_degenerate_inputs() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_outlier_fraction() {
        let mut values = vec![10.0; 19];
        values.push(1000.0);
        // the single spike sits well beyond 2 standard deviations
        assert!(approx(outlier_fraction(&values, 2.0), 0.05));
        assert_eq!(outlier_fraction(&[3.0, 3.0, 3.0], 2.0), 0.0);
        assert_eq!(outlier_fraction(&[], 2.0), 0.0);
    }

    #[test]
    fn test_min_max_scale_clips() {
        assert_eq!(min_max_scale(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(min_max_scale(15.0, 0.0, 10.0), 1.0);
        assert!(approx(min_max_scale(0.0, -0.5, 0.5), 0.5));
        assert_eq!(min_max_scale(1.0, 1.0, 1.0), 0.0);
    }
}
