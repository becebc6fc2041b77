//! Levenberg-Marquardt fit of a normalized gaussian
//! `a / (sigma sqrt(2 pi)) * exp(-(x - x0)^2 / (2 sigma^2))`.

use serde::Serialize;
use std::f64::consts::PI;
use tracing::trace;

use crate::config::FitThresholds;
use crate::utils::linalg::{
    invert,
    solve,
};
use crate::utils::stats::weighted_mean_std;

const MAX_ITERATIONS: usize = 500;
const MAX_LAMBDA: f64 = 1e14;
const SSR_RTOL: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianFit {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
    pub amplitude_err: f64,
    pub center_err: f64,
    pub sigma_err: f64,
}

impl GaussianFit {
    pub fn eval(&self, x: f64) -> f64 {
        gaussian(x, self.amplitude, self.center, self.sigma)
    }

    pub fn relative_height_error(&self) -> f64 {
        self.amplitude_err / self.amplitude.abs()
    }

    pub fn relative_sigma_error(&self) -> f64 {
        self.sigma_err / self.sigma
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    CenterOutsideWindow,
    HeightError,
    SigmaError,
}

/// What happened to a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FitOutcome {
    NoFit,
    Rejected {
        fit: GaussianFit,
        reason: RejectReason,
    },
    Passed(GaussianFit),
}

impl FitOutcome {
    /// Short label used in the diagnostic tables.
    pub fn label(&self) -> &'static str {
        match self {
            FitOutcome::NoFit => "NO FIT",
            FitOutcome::Rejected { .. } => "FAILED",
            FitOutcome::Passed(_) => "PASSED",
        }
    }

    pub fn fit(&self) -> Option<&GaussianFit> {
        match self {
            FitOutcome::NoFit => None,
            FitOutcome::Rejected { fit, .. } => Some(fit),
            FitOutcome::Passed(fit) => Some(fit),
        }
    }

    pub fn passed(&self) -> Option<&GaussianFit> {
        match self {
            FitOutcome::Passed(fit) => Some(fit),
            _ => None,
        }
    }
}

#[inline]
fn gaussian(x: f64, a: f64, x0: f64, sigma: f64) -> f64 {
    a / (sigma * (2.0 * PI).sqrt()) * (-(x - x0).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Value and partial derivatives with respect to (a, x0, sigma).
#[inline]
fn gaussian_with_grad(x: f64, a: f64, x0: f64, sigma: f64) -> (f64, [f64; 3]) {
    let g = (-(x - x0).powi(2) / (2.0 * sigma.powi(2))).exp();
    let norm = 1.0 / (sigma * (2.0 * PI).sqrt());
    let f = a * norm * g;
    let d = x - x0;
    (
        f,
        [
            norm * g,
            f * d / sigma.powi(2),
            f * (d.powi(2) / sigma.powi(3) - 1.0 / sigma),
        ],
    )
}

fn sum_squared_residuals(xs: &[f64], ys: &[f64], p: &[f64; 3]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| (y - gaussian(x, p[0], p[1], p[2])).powi(2))
        .sum()
}

/// `J^T J` and `J^T r` at `p`.
fn normal_equations(xs: &[f64], ys: &[f64], p: &[f64; 3]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut jtj = vec![vec![0.0; 3]; 3];
    let mut jtr = vec![0.0; 3];
    for (&x, &y) in xs.iter().zip(ys) {
        let (f, grad) = gaussian_with_grad(x, p[0], p[1], p[2]);
        let r = y - f;
        for j in 0..3 {
            jtr[j] += grad[j] * r;
            for k in 0..3 {
                jtj[j][k] += grad[j] * grad[k];
            }
        }
    }
    (jtj, jtr)
}

/// Fits a gaussian to `(xs, ys)`, starting from the weighted mean and
/// standard deviation of the data and an amplitude matching `height`.
///
/// Returns `None` when the fit does not converge or the covariance is
/// singular.
pub fn fit_gaussian(xs: &[f64], ys: &[f64], height: f64) -> Option<GaussianFit> {
    if xs.len() != ys.len() || xs.len() <= 3 {
        return None;
    }
    let weights: Vec<f64> = ys.iter().map(|&y| y.max(0.0)).collect();
    let (mean, mut std) = weighted_mean_std(xs, &weights)?;
    if !(std > 0.0) {
        std = (xs[xs.len() - 1] - xs[0]).abs() / (xs.len() - 1) as f64;
    }
    let amplitude = height * std * (2.0 * PI).sqrt();
    fit_gaussian_from(xs, ys, [amplitude, mean, std])
}

/// Levenberg-Marquardt from an explicit `[amplitude, center, sigma]` guess.
pub fn fit_gaussian_from(xs: &[f64], ys: &[f64], guess: [f64; 3]) -> Option<GaussianFit> {
    let n = xs.len();
    if n != ys.len() || n <= 3 || !guess.iter().all(|v| v.is_finite()) || guess[2] == 0.0 {
        return None;
    }

    // Work relative to the window so the center stays well conditioned.
    let x_ref = xs.iter().sum::<f64>() / n as f64;
    let us: Vec<f64> = xs.iter().map(|x| x - x_ref).collect();
    let mut p = [guess[0], guess[1] - x_ref, guess[2]];

    let mut ssr = sum_squared_residuals(&us, ys, &p);
    if !ssr.is_finite() {
        return None;
    }
    let mut lambda = 1e-3;
    let mut converged = false;

    for iteration in 0..MAX_ITERATIONS {
        if ssr == 0.0 {
            converged = true;
            break;
        }
        let (jtj, jtr) = normal_equations(&us, ys, &p);
        let mut damped = jtj.clone();
        for j in 0..3 {
            damped[j][j] += lambda * jtj[j][j].max(f64::MIN_POSITIVE);
        }

        let step = solve(&damped, &jtr);
        let candidate = step.map(|d| [p[0] + d[0], p[1] + d[1], p[2] + d[2]]);
        let new_ssr = candidate
            .filter(|c| c[2] != 0.0)
            .map(|c| sum_squared_residuals(&us, ys, &c))
            .filter(|s| s.is_finite());

        match (candidate, new_ssr) {
            (Some(c), Some(s)) if s <= ssr => {
                let improvement = ssr - s;
                p = c;
                ssr = s;
                lambda = (lambda / 10.0).max(1e-12);
                if improvement <= SSR_RTOL * ssr {
                    trace!("Gaussian fit converged after {} iterations", iteration);
                    converged = true;
                    break;
                }
            }
            _ => {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    // No step reduces the residuals any more: a minimum.
                    converged = true;
                    break;
                }
            }
        }
    }
    if !converged {
        return None;
    }

    // (a, sigma) and (-a, -sigma) describe the same curve.
    if p[2] < 0.0 {
        p[0] = -p[0];
        p[2] = -p[2];
    }

    let (jtj, _) = normal_equations(&us, ys, &p);
    let cov = invert(&jtj)?;
    let scale = ssr / (n - 3) as f64;
    let errs: Vec<f64> = (0..3).map(|i| (cov[i][i] * scale).sqrt()).collect();
    if !errs.iter().all(|e| e.is_finite() && *e >= 0.0) {
        return None;
    }

    Some(GaussianFit {
        amplitude: p[0],
        center: p[1] + x_ref,
        sigma: p[2],
        amplitude_err: errs[0],
        center_err: errs[1],
        sigma_err: errs[2],
    })
}

/// Applies the acceptance criteria to a fit made over `[x_first, x_last]`.
pub fn evaluate_fit(
    fit: Option<GaussianFit>,
    x_first: f64,
    x_last: f64,
    thresholds: &FitThresholds,
) -> FitOutcome {
    let Some(fit) = fit else {
        return FitOutcome::NoFit;
    };
    let reason = if !(fit.center >= x_first && fit.center <= x_last) {
        Some(RejectReason::CenterOutsideWindow)
    } else if !(fit.relative_height_error() < thresholds.max_relative_height_error) {
        Some(RejectReason::HeightError)
    } else if !(fit.relative_sigma_error() < thresholds.max_relative_sigma_error) {
        Some(RejectReason::SigmaError)
    } else {
        None
    };
    match reason {
        Some(reason) => FitOutcome::Rejected { fit, reason },
        None => FitOutcome::Passed(fit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: f64 = 5.0;
    const X0: f64 = 79.9663;
    const SIGMA: f64 = 0.004;

    fn window() -> Vec<f64> {
        (0..21).map(|i| 79.9565 + i as f64 * 0.001).collect()
    }

    fn noisy(level: f64) -> (Vec<f64>, Vec<f64>) {
        let xs = window();
        let ys = xs
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let noise = ((i * 7919) % 13) as f64 - 6.0;
                gaussian(x, A, X0, SIGMA) + level * noise
            })
            .collect();
        (xs, ys)
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let p = [3.0, 0.2, 0.5];
        let x = 0.6;
        let (_, grad) = gaussian_with_grad(x, p[0], p[1], p[2]);
        let h = 1e-7;
        for k in 0..3 {
            let mut hi = p;
            let mut lo = p;
            hi[k] += h;
            lo[k] -= h;
            let numeric =
                (gaussian(x, hi[0], hi[1], hi[2]) - gaussian(x, lo[0], lo[1], lo[2])) / (2.0 * h);
            assert!((numeric - grad[k]).abs() < 1e-5, "{} {} {}", k, numeric, grad[k]);
        }
    }

    #[test]
    fn test_roundtrip_recovers_parameters() {
        let (xs, ys) = noisy(1e-6);
        let fit = fit_gaussian(&xs, &ys, ys[10]).unwrap();
        assert!((fit.amplitude - A).abs() / A < 1e-4, "{:?}", fit);
        assert!((fit.center - X0).abs() < 1e-6, "{:?}", fit);
        assert!((fit.sigma - SIGMA).abs() / SIGMA < 1e-4, "{:?}", fit);
    }

    #[test]
    fn test_errors_shrink_with_noise() {
        let fits: Vec<GaussianFit> = [10.0, 3.0, 1.0, 0.1]
            .iter()
            .map(|&level| {
                let (xs, ys) = noisy(level);
                fit_gaussian(&xs, &ys, ys[10]).unwrap()
            })
            .collect();
        for pair in fits.windows(2) {
            assert!(pair[1].amplitude_err < pair[0].amplitude_err);
            assert!(pair[1].center_err < pair[0].center_err);
            assert!(pair[1].sigma_err < pair[0].sigma_err);
        }
    }

    #[test]
    fn test_flat_data_is_no_fit_or_rejected() {
        let xs = window();
        let ys = vec![0.0; xs.len()];
        assert!(fit_gaussian(&xs, &ys, 0.0).is_none());

        let th = FitThresholds {
            max_relative_height_error: 0.15,
            max_relative_sigma_error: 0.1,
        };
        assert_eq!(evaluate_fit(None, 0.0, 1.0, &th), FitOutcome::NoFit);
    }

    #[test]
    fn test_evaluate_thresholds() {
        let th = FitThresholds {
            max_relative_height_error: 0.15,
            max_relative_sigma_error: 0.1,
        };
        let good = GaussianFit {
            amplitude: 10.0,
            center: 0.5,
            sigma: 0.1,
            amplitude_err: 0.5,
            center_err: 0.001,
            sigma_err: 0.005,
        };
        assert_eq!(evaluate_fit(Some(good), 0.0, 1.0, &th), FitOutcome::Passed(good));
        let outside = evaluate_fit(Some(good), 0.6, 1.0, &th);
        assert!(matches!(
            outside,
            FitOutcome::Rejected {
                reason: RejectReason::CenterOutsideWindow,
                ..
            }
        ));
        let wide = GaussianFit {
            sigma_err: 0.05,
            ..good
        };
        assert!(matches!(
            evaluate_fit(Some(wide), 0.0, 1.0, &th),
            FitOutcome::Rejected {
                reason: RejectReason::SigmaError,
                ..
            }
        ));
        assert_eq!(evaluate_fit(Some(wide), 0.0, 1.0, &th).label(), "FAILED");
    }
}
