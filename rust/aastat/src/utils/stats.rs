/// Median of the values, `None` when empty.
///
/// Even lengths average the two middle values (numpy semantics).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased (n - 1) sample variance, NaN with less than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Weighted mean and (population) standard deviation of `xs`.
///
/// Returns `None` when the weights do not sum to a positive number.
pub fn weighted_mean_std(xs: &[f64], weights: &[f64]) -> Option<(f64, f64)> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let mean = xs.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / total;
    let var = xs
        .iter()
        .zip(weights)
        .map(|(x, w)| w * (x - mean).powi(2))
        .sum::<f64>()
        / total;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_sample_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Population std is 2, the sample one uses n - 1.
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((sample_std(&v) - expected).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_weighted_mean_std() {
        let (m, s) = weighted_mean_std(&[1.0, 2.0, 3.0], &[1.0, 2.0, 1.0]).unwrap();
        assert!((m - 2.0).abs() < 1e-12);
        assert!((s - 0.5f64.sqrt()).abs() < 1e-12);
        assert!(weighted_mean_std(&[1.0], &[0.0]).is_none());
    }
}
