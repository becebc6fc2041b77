//! Per-file systematic mass shift correction.
//!
//! The unmodified peptides of a file form a narrow peak that should sit at
//! 0 Da. Its fitted center is the systematic error of the file.

use tracing::{
    info,
    warn,
};

use crate::models::{
    BinGrid,
    Psm,
};
use crate::peaks::fit_gaussian;

/// Only shifts with `|shift| <` this many Da take part in the estimate.
pub const CALIBRATION_HALF_WINDOW: f64 = 0.15;
pub const CALIBRATION_BINS: usize = 10_000;

/// Center of a gaussian fitted to the near-zero mass shifts, `None` when
/// there are fewer than 3 of them or the fit fails.
pub fn systematic_shift(mass_shifts: impl IntoIterator<Item = f64>) -> Option<f64> {
    let near_zero: Vec<f64> = mass_shifts
        .into_iter()
        .filter(|x| x.abs() < CALIBRATION_HALF_WINDOW)
        .collect();
    if near_zero.len() < 3 {
        return None;
    }
    let (lo, hi) = near_zero
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let grid = BinGrid::try_new(lo, hi, (hi - lo) / CALIBRATION_BINS as f64).ok()?;
    let hist = grid.histogram(near_zero.iter().copied());

    let xs: Vec<f64> = (0..hist.len()).map(|b| grid.center(b)).collect();
    let ys: Vec<f64> = hist.counts().iter().map(|&c| c as f64).collect();
    let height = ys.iter().copied().fold(0.0, f64::max);
    let fit = fit_gaussian(&xs, &ys, height)?;
    if fit.center >= lo && fit.center <= hi {
        Some(fit.center)
    } else {
        None
    }
}

/// Subtracts the systematic shift of `rows` from their mass shifts.
///
/// Returns the shift that was removed; rows are left untouched when it
/// cannot be estimated.
pub fn recalibrate(rows: &mut [Psm], source: &str) -> Option<f64> {
    match systematic_shift(rows.iter().map(|r| r.mass_shift)) {
        Some(shift) => {
            info!("Systematic shift for {} is {:.4} Da", source, shift);
            for row in rows.iter_mut() {
                row.mass_shift -= shift;
            }
            Some(shift)
        }
        None => {
            warn!(
                "Unable to estimate the systematic shift for {}, leaving it uncorrected",
                source
            );
            None
        }
    }
}
