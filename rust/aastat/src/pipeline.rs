//! One analysis run: histogram, peak discovery, per-peak FDR filtering and
//! amino acid statistics against the zero-shift reference.
//!
//! Only configuration problems are fatal, and those are caught by
//! [`crate::config::AnalysisParams::resolve`]. Everything that can go wrong
//! with the data itself ends up in [`AnalysisOutput::warnings`].

use indicatif::{
    ParallelProgressIterator,
    ProgressStyle,
};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    info,
    instrument,
    warn,
};

use crate::aa_stats::{
    PeakAaStats,
    ReferenceStats,
    peak_stats,
};
use crate::config::{
    ReferenceSelection,
    ResolvedParams,
};
use crate::fdr::{
    FilteredSubset,
    filter_mass_window,
    filter_peak_bin,
};
use crate::models::{
    BinGrid,
    Dataset,
    Histogram,
    HistogramBin,
    Psm,
};
use crate::peaks::{
    AcceptedPeak,
    CandidateFit,
    PeakCandidate,
    build_tasks,
    find_candidates,
    fit_candidates,
    merge_close_peaks,
    savitzky_golay,
};

/// Non fatal conditions met during a run.
#[derive(Debug, Clone, Serialize)]
pub enum RunWarning {
    /// Nothing in the smoothed histogram reached the noise floor.
    NoCandidates { total_count: u64, num_bins: usize },
    /// Candidates were found but none passed the fit criteria.
    NoAcceptedPeaks { num_candidates: usize },
    /// No peptide of this peak survived the FDR threshold.
    EmptyFdrBin {
        bin_index: usize,
        mass_shift: f64,
        unique_peptides: usize,
        /// Raw histogram around the peak.
        window: Vec<HistogramBin>,
    },
    /// The zero-shift reference is empty, no statistics were computed.
    EmptyReference { reason: String },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::NoCandidates {
                total_count,
                num_bins,
            } => write!(
                f,
                "No peak candidates above the noise floor ({} shifts in {} bins)",
                total_count, num_bins
            ),
            RunWarning::NoAcceptedPeaks { num_candidates } => write!(
                f,
                "None of the {} peak candidates passed the gaussian fit criteria",
                num_candidates
            ),
            RunWarning::EmptyFdrBin {
                mass_shift,
                unique_peptides,
                window,
                ..
            } => write!(
                f,
                "No peptides survived FDR for the {:+.4} Da peak ({} unique peptides, {} shifts in window)",
                mass_shift,
                unique_peptides,
                window.iter().map(|b| b.count as u64).sum::<u64>()
            ),
            RunWarning::EmptyReference { reason } => {
                write!(f, "Empty zero-shift reference: {}", reason)
            }
        }
    }
}

/// Wall time of each stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineTimings {
    pub histogram: Duration,
    pub detection: Duration,
    pub fitting: Duration,
    pub fdr: Duration,
    pub aa_stats: Duration,
}

impl Serialize for PipelineTimings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PipelineTimings", 5)?;
        state.serialize_field("histogram_ms", &self.histogram.as_millis())?;
        state.serialize_field("detection_ms", &self.detection.as_millis())?;
        state.serialize_field("fitting_ms", &self.fitting.as_millis())?;
        state.serialize_field("fdr_ms", &self.fdr.as_millis())?;
        state.serialize_field("aa_stats_ms", &self.aa_stats.as_millis())?;
        state.end()
    }
}

/// An accepted peak whose FDR filtered subset is not empty.
#[derive(Debug, Clone, Serialize)]
pub struct PeakResult {
    pub peak: AcceptedPeak,
    pub subset: FilteredSubset,
    pub is_reference: bool,
    /// `None` when the reference is empty.
    pub stats: Option<PeakAaStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceResult {
    /// Bin of the reference peak, `None` for an explicit window.
    pub bin_index: Option<usize>,
    pub mass_shift: f64,
    pub subset: FilteredSubset,
    pub stats: ReferenceStats,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub dataset: Dataset,
    pub histogram: Histogram,
    pub smoothed: Vec<f64>,
    pub candidates: Vec<PeakCandidate>,
    pub fits: Vec<CandidateFit>,
    pub accepted: Vec<AcceptedPeak>,
    /// Accepted peaks with peptides left after FDR, in bin order.
    pub peaks: Vec<PeakResult>,
    pub reference: Option<ReferenceResult>,
    pub labels: Vec<char>,
    pub warnings: Vec<RunWarning>,
    pub timings: PipelineTimings,
}

impl AnalysisOutput {
    fn warn(&mut self, warning: RunWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Runs the whole analysis on `rows`.
#[instrument(skip_all)]
pub fn run(rows: Vec<Psm>, params: &ResolvedParams) -> AnalysisOutput {
    let st = Instant::now();
    let dataset = Dataset::new(rows, params.grid);
    let histogram = params.grid.histogram(dataset.mass_shifts());
    info!(
        "Histogram of {} mass shifts over {} bins",
        histogram.total(),
        histogram.len()
    );
    let mut out = AnalysisOutput {
        dataset,
        histogram,
        smoothed: Vec::new(),
        candidates: Vec::new(),
        fits: Vec::new(),
        accepted: Vec::new(),
        peaks: Vec::new(),
        reference: None,
        labels: params.aa.labels.clone(),
        warnings: Vec::new(),
        timings: PipelineTimings::default(),
    };
    out.timings.histogram = st.elapsed();

    detect_peaks(&mut out, params);
    filter_peaks(&mut out, params);
    compute_statistics(&mut out, params);

    info!("{:?}", out.timings);
    out
}

#[instrument(skip_all)]
fn detect_peaks(out: &mut AnalysisOutput, params: &ResolvedParams) {
    let st = Instant::now();
    let raw: Vec<f64> = out.histogram.counts().iter().map(|&c| c as f64).collect();
    out.smoothed = savitzky_golay(&raw, params.smoothing);
    out.candidates = find_candidates(
        out.histogram.counts(),
        &out.smoothed,
        params.half_window,
        params.noise_floor_multiplier,
    );
    out.timings.detection = st.elapsed();
    if out.candidates.is_empty() {
        let warning = RunWarning::NoCandidates {
            total_count: out.histogram.total(),
            num_bins: out.histogram.len(),
        };
        out.warn(warning);
        return;
    }

    let st = Instant::now();
    let tasks = build_tasks(&out.histogram, &out.candidates, params.half_window);
    out.fits = fit_candidates(tasks, &params.fit);
    out.accepted = merge_close_peaks(
        &out.fits,
        &params.grid,
        params.merge_tolerance,
        params.tie_break,
    );
    out.timings.fitting = st.elapsed();
    info!(
        "{} candidates, {} passed fits, {} peaks after merging",
        out.candidates.len(),
        out.fits.iter().filter(|f| f.outcome.passed().is_some()).count(),
        out.accepted.len()
    );
    if out.accepted.is_empty() {
        let warning = RunWarning::NoAcceptedPeaks {
            num_candidates: out.candidates.len(),
        };
        out.warn(warning);
    }
}

#[instrument(skip_all)]
fn filter_peaks(out: &mut AnalysisOutput, params: &ResolvedParams) {
    let st = Instant::now();
    let accepted = out.accepted.clone();
    for peak in accepted {
        let subset = filter_peak_bin(&out.dataset, peak.bin_index, params.half_window, &params.fdr);
        if subset.is_empty() {
            let warning = RunWarning::EmptyFdrBin {
                bin_index: peak.bin_index,
                mass_shift: peak.mass_shift_value,
                unique_peptides: subset.num_candidates,
                window: out.histogram.window(peak.bin_index, params.half_window),
            };
            out.warn(warning);
            continue;
        }
        out.peaks.push(PeakResult {
            peak,
            subset,
            is_reference: false,
            stats: None,
        });
    }

    match params.reference {
        ReferenceSelection::NearestToZero => {
            let bins = out.peaks.iter().map(|p| p.peak.bin_index);
            let nearest = nearest_to_zero(bins, &params.grid);
            if let Some(ref_peak) = out
                .peaks
                .iter_mut()
                .find(|p| Some(p.peak.bin_index) == nearest)
            {
                ref_peak.is_reference = true;
                info!(
                    "Reference peak at {:+.4} Da with {} peptides",
                    ref_peak.peak.mass_shift_value,
                    ref_peak.subset.len()
                );
            }
        }
        ReferenceSelection::Window { lo, hi } => {
            let subset = filter_mass_window(&out.dataset, lo, hi, &params.fdr);
            info!(
                "Reference window [{}, {}] Da has {} peptides after FDR",
                lo,
                hi,
                subset.len()
            );
            if !subset.is_empty() {
                let stats = reference_stats(&subset, params);
                out.reference = Some(ReferenceResult {
                    bin_index: None,
                    mass_shift: (lo + hi) / 2.0,
                    subset,
                    stats,
                });
            }
        }
    }
    out.timings.fdr = st.elapsed();
}

/// Bin whose center is closest to 0 Da, the lower bin on ties.
fn nearest_to_zero(bins: impl IntoIterator<Item = usize>, grid: &BinGrid) -> Option<usize> {
    bins.into_iter().min_by(|&a, &b| {
        grid.center(a)
            .abs()
            .total_cmp(&grid.center(b).abs())
            .then(a.cmp(&b))
    })
}

fn reference_stats(subset: &FilteredSubset, params: &ResolvedParams) -> ReferenceStats {
    let peptides: Vec<&str> = subset.peptides().collect();
    ReferenceStats::new(&peptides, &params.aa)
}

#[instrument(skip_all)]
fn compute_statistics(out: &mut AnalysisOutput, params: &ResolvedParams) {
    let st = Instant::now();
    if out.reference.is_none() {
        if let Some(ref_peak) = out.peaks.iter().find(|p| p.is_reference) {
            out.reference = Some(ReferenceResult {
                bin_index: Some(ref_peak.peak.bin_index),
                mass_shift: ref_peak.peak.mass_shift_value,
                subset: ref_peak.subset.clone(),
                stats: reference_stats(&ref_peak.subset, params),
            });
        }
    }
    if out.reference.is_none() {
        let reason = match params.reference {
            ReferenceSelection::NearestToZero => "no peak survived FDR filtering".to_string(),
            ReferenceSelection::Window { lo, hi } => {
                format!("no peptide in [{}, {}] Da survived FDR filtering", lo, hi)
            }
        };
        // Without any accepted peak there is nothing to compare anyway.
        if !out.accepted.is_empty() {
            out.warn(RunWarning::EmptyReference { reason });
        }
        return;
    }
    let Some(reference) = out.reference.as_ref() else {
        return;
    };

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    let stats: Vec<PeakAaStats> = out
        .peaks
        .par_iter()
        .progress_with_style(style)
        .map(|p| {
            if p.is_reference {
                reference.stats.as_peak_stats()
            } else {
                let peptides: Vec<&str> = p.subset.peptides().collect();
                // Stream 0 belongs to the reference null.
                let stream = p.peak.bin_index as u64 + 1;
                peak_stats(&peptides, &reference.stats, &params.aa, stream)
            }
        })
        .collect();
    for (peak, s) in out.peaks.iter_mut().zip(stats) {
        peak.stats = Some(s);
    }
    out.timings.aa_stats = st.elapsed();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_bin_is_nearest_center_to_zero() {
        let grid = BinGrid::try_new(-2.0, 2.0, 0.5).unwrap();
        // Centers: bin 1 -1.25, bin 3 -0.25, bin 4 +0.25, bin 6 +1.25.
        assert_eq!(nearest_to_zero([6, 4, 1], &grid), Some(4));
        assert_eq!(nearest_to_zero([1, 6], &grid), Some(1));
        assert_eq!(nearest_to_zero([4, 3], &grid), Some(3));
        assert_eq!(nearest_to_zero(Vec::new(), &grid), None);
    }
}
