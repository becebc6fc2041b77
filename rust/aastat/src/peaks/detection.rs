use serde::Serialize;
use tracing::debug;

use crate::utils::stats::median;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakCandidate {
    pub bin_index: usize,
    pub smoothed_height: f64,
}

/// `multiplier * median(nonzero counts)`, `None` for an all-zero histogram.
pub fn noise_floor(counts: &[u32], multiplier: f64) -> Option<f64> {
    let nonzero: Vec<f64> = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| c as f64)
        .collect();
    median(&nonzero).map(|m| m * multiplier)
}

/// Local maxima (plateaus included) of the smoothed series that reach the
/// noise floor and have `half_window` bins on both sides.
///
/// Candidates come out in ascending bin order.
pub fn find_candidates(
    counts: &[u32],
    smoothed: &[f64],
    half_window: usize,
    multiplier: f64,
) -> Vec<PeakCandidate> {
    debug_assert_eq!(counts.len(), smoothed.len());
    let Some(floor) = noise_floor(counts, multiplier) else {
        return Vec::new();
    };
    let n = smoothed.len();

    let mut out = Vec::new();
    let mut dropped_at_edges = 0;
    for (i, &height) in smoothed.iter().enumerate() {
        let left = if i > 0 { smoothed[i - 1] } else { f64::NEG_INFINITY };
        let right = if i + 1 < n { smoothed[i + 1] } else { f64::NEG_INFINITY };
        if !(height >= left && height >= right && height >= floor) {
            continue;
        }
        if i < half_window || i + half_window >= n {
            dropped_at_edges += 1;
            continue;
        }
        out.push(PeakCandidate {
            bin_index: i,
            smoothed_height: height,
        });
    }
    debug!(
        "Noise floor {:.3}: {} candidates, {} dropped at the range edges",
        floor,
        out.len(),
        dropped_at_edges
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_floor_ignores_zeros() {
        assert_eq!(noise_floor(&[0, 0, 1, 3, 0, 5], 2.0), Some(6.0));
        assert_eq!(noise_floor(&[0, 0], 2.0), None);
    }

    #[test]
    fn test_plateaus_are_candidates() {
        let counts = [1, 1, 1, 4, 4, 1, 1, 1, 1];
        let smoothed: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        let found = find_candidates(&counts, &smoothed, 2, 1.0);
        let bins: Vec<usize> = found.iter().map(|c| c.bin_index).collect();
        // Flat stretches of 1 pass the >= test too, and reach the floor of 1.
        assert!(bins.contains(&3));
        assert!(bins.contains(&4));
    }

    #[test]
    fn test_floor_and_edges() {
        let counts = [9, 0, 1, 1, 1, 0, 6, 0, 1, 1, 1, 0, 0];
        let smoothed: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        // median of nonzero = 1, floor = 2: only 9 and 6 qualify.
        let found = find_candidates(&counts, &smoothed, 2, 2.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bin_index, 6);
        assert_eq!(found[0].smoothed_height, 6.0);
    }
}
