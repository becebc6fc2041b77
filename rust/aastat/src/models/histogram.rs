use serde::Serialize;

use crate::errors::ConfigError;

/// A fixed width grid of bins over `[lo, hi]`.
///
/// The grid has `ceil((hi - lo) / width)` bins, the last one includes `hi`.
/// Values outside the range saturate into the first or last bin, so
/// [`BinGrid::digitize`] is total and the same value always lands in the
/// same bin, both for the histogram and for the per-row bin assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinGrid {
    lo: f64,
    hi: f64,
    width: f64,
    num_bins: usize,
}

impl BinGrid {
    pub fn try_new(lo: f64, hi: f64, width: f64) -> Result<Self, ConfigError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(ConfigError::NonPositiveBinWidth(width));
        }
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(ConfigError::InvalidRange { lo, hi });
        }
        let num_bins = ((hi - lo) / width).ceil().max(1.0) as usize;
        Ok(Self {
            lo,
            hi,
            width,
            num_bins,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    pub fn left_edge(&self, bin: usize) -> f64 {
        self.lo + bin as f64 * self.width
    }

    pub fn right_edge(&self, bin: usize) -> f64 {
        self.left_edge(bin + 1)
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.lo + (bin as f64 + 0.5) * self.width
    }

    /// Bin index of a value, saturating at both ends of the range.
    ///
    /// NaN maps to the first bin, callers are expected to filter
    /// non-finite values earlier.
    pub fn digitize(&self, value: f64) -> usize {
        let pos = ((value - self.lo) / self.width).floor();
        if pos.is_nan() || pos < 0.0 {
            0
        } else {
            (pos as usize).min(self.num_bins - 1)
        }
    }

    /// Counts `values` into a new histogram over this grid.
    pub fn histogram(&self, values: impl IntoIterator<Item = f64>) -> Histogram {
        let mut counts = vec![0u32; self.num_bins];
        for v in values {
            counts[self.digitize(v)] += 1;
        }
        Histogram { grid: *self, counts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub left: f64,
    pub right: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    grid: BinGrid,
    counts: Vec<u32>,
}

impl Histogram {
    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn bin(&self, index: usize) -> HistogramBin {
        HistogramBin {
            left: self.grid.left_edge(index),
            right: self.grid.right_edge(index),
            count: self.counts[index],
        }
    }

    pub fn iter_bins(&self) -> impl Iterator<Item = HistogramBin> + '_ {
        (0..self.counts.len()).map(|i| self.bin(i))
    }

    /// The bins `[center - half_window, center + half_window]`, clipped to
    /// the grid.
    pub fn window(&self, center: usize, half_window: usize) -> Vec<HistogramBin> {
        let start = center.saturating_sub(half_window);
        let end = (center + half_window).min(self.counts.len().saturating_sub(1));
        (start..=end).map(|i| self.bin(i)).collect()
    }
}
