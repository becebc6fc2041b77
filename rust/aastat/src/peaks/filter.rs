use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::batch::CandidateFit;
use super::gaussian::GaussianFit;
use crate::config::TieBreak;
use crate::models::BinGrid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcceptedPeak {
    pub bin_index: usize,
    /// Fitted center, in Da.
    pub mass_shift_value: f64,
    pub fit: GaussianFit,
}

/// Merges passed fits whose bin centers are closer than `tolerance` Da.
///
/// Every pair is compared and the member with the larger center error is
/// discarded, so a peak can be dropped by a neighbour that is itself
/// dropped later. The output is in ascending bin order.
pub fn merge_close_peaks(
    fits: &[CandidateFit],
    grid: &BinGrid,
    tolerance: f64,
    tie_break: TieBreak,
) -> Vec<AcceptedPeak> {
    let mut passed: Vec<AcceptedPeak> = fits
        .iter()
        .filter_map(|f| {
            f.outcome.passed().map(|fit| AcceptedPeak {
                bin_index: f.bin_index,
                mass_shift_value: fit.center,
                fit: *fit,
            })
        })
        .collect();
    passed.sort_by_key(|p| p.bin_index);

    let mut kicked = BTreeSet::new();
    for i in 0..passed.len() {
        for j in (i + 1)..passed.len() {
            let (a, b) = (&passed[i], &passed[j]);
            if (grid.center(b.bin_index) - grid.center(a.bin_index)).abs() >= tolerance {
                continue;
            }
            let (ea, eb) = (a.fit.center_err, b.fit.center_err);
            if ea > eb {
                kicked.insert(i);
            } else if eb > ea {
                kicked.insert(j);
            } else {
                // `a` is the lower bin of the pair.
                match tie_break {
                    TieBreak::PreferLowerBin => {
                        kicked.insert(j);
                    }
                    TieBreak::PreferHigherBin => {
                        kicked.insert(i);
                    }
                    TieBreak::KeepBoth => {}
                }
            }
        }
    }
    debug!(
        "{} of {} passed fits removed as near duplicates",
        kicked.len(),
        passed.len()
    );

    passed
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !kicked.contains(i))
        .map(|(_, p)| p)
        .collect()
}
