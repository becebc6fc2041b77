use tracing::debug;

use crate::config::SmoothingParams;
use crate::utils::linalg::invert;

/// Savitzky-Golay smoothing.
///
/// Proper least squares coefficients: every output point is the value at
/// that position of an order `order` polynomial fitted to the `window`
/// points around it. The first and last `window / 2` points are evaluated
/// on the polynomial fitted to the first and last full window, like
/// scipy's `savgol_filter(mode="interp")`.
///
/// Series shorter than the window are smoothed with the largest odd window
/// that fits, or returned unchanged when no such window exceeds the order.
pub fn savitzky_golay(data: &[f64], params: SmoothingParams) -> Vec<f64> {
    let n = data.len();
    let mut window = params.window;
    if n < window {
        window = if n % 2 == 0 { n.saturating_sub(1) } else { n };
        debug!(
            "Series of {} points is shorter than the smoothing window {}, using {}",
            n, params.window, window
        );
    }
    if window <= params.order || window < 3 {
        return data.to_vec();
    }

    let Some(hat) = projection_matrix(window, params.order) else {
        debug!(
            "Singular Savitzky-Golay system for window {} order {}",
            window, params.order
        );
        return data.to_vec();
    };

    let half = window / 2;
    let mut out = vec![0.0; n];
    let center = &hat[half];
    for i in half..(n - half) {
        out[i] = center
            .iter()
            .zip(&data[(i - half)..=(i + half)])
            .map(|(c, y)| c * y)
            .sum();
    }

    let head = &data[..window];
    for (k, out_k) in out.iter_mut().enumerate().take(half) {
        *out_k = hat[k].iter().zip(head).map(|(c, y)| c * y).sum();
    }
    let tail_start = n - window;
    let tail = &data[tail_start..];
    for k in (half + 1)..window {
        out[tail_start + k] = hat[k].iter().zip(tail).map(|(c, y)| c * y).sum();
    }
    out
}

/// The "hat" matrix `A (A^T A)^-1 A^T` of the polynomial design matrix on
/// a window; row `k` maps the window values to the fitted value at `k`.
fn projection_matrix(window: usize, order: usize) -> Option<Vec<Vec<f64>>> {
    let half = (window / 2) as f64;
    // Positions scaled to [-1, 1] keep the normal equations well conditioned.
    let design: Vec<Vec<f64>> = (0..window)
        .map(|i| {
            let z = (i as f64 - half) / half;
            (0..=order).map(|p| z.powi(p as i32)).collect()
        })
        .collect();

    let ncoef = order + 1;
    let mut normal = vec![vec![0.0; ncoef]; ncoef];
    for row in design.iter() {
        for j in 0..ncoef {
            for l in 0..ncoef {
                normal[j][l] += row[j] * row[l];
            }
        }
    }
    let inv = invert(&normal)?;

    // (A^T A)^-1 A^T, one column per window position.
    let pinv: Vec<Vec<f64>> = design
        .iter()
        .map(|row| {
            (0..ncoef)
                .map(|j| (0..ncoef).map(|l| inv[j][l] * row[l]).sum())
                .collect()
        })
        .collect();

    Some(
        design
            .iter()
            .map(|row_k| {
                pinv.iter()
                    .map(|col_i| row_k.iter().zip(col_i).map(|(a, b)| a * b).sum())
                    .collect()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(window: usize, order: usize) -> SmoothingParams {
        SmoothingParams { window, order }
    }

    #[test]
    fn test_preserves_polynomials_up_to_order() {
        let data: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64 * 0.1;
                1.0 - 2.0 * x + 0.5 * x.powi(2) - 0.1 * x.powi(3)
            })
            .collect();
        let smoothed = savitzky_golay(&data, params(9, 3));
        for (a, b) in data.iter().zip(smoothed.iter()) {
            assert!((a - b).abs() < 1e-8, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_center_coefficients_match_reference() {
        // Classic 5 point quadratic filter: (-3, 12, 17, 12, -3) / 35
        let hat = projection_matrix(5, 2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|x| x / 35.0);
        for (a, b) in hat[2].iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reduces_spike() {
        let mut data = vec![0.0; 31];
        data[15] = 100.0;
        let smoothed = savitzky_golay(&data, params(15, 5));
        assert!(smoothed[15] < 100.0);
        assert!(smoothed[15] > 0.0);
        assert_eq!(smoothed.len(), data.len());
    }

    #[test]
    fn test_short_series() {
        let data = vec![1.0, 5.0, 2.0];
        assert_eq!(savitzky_golay(&data, params(15, 5)), data);
        let data: Vec<f64> = (0..8).map(|x| x as f64).collect();
        let smoothed = savitzky_golay(&data, params(15, 2));
        for (a, b) in data.iter().zip(smoothed.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
