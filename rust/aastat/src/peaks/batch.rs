use rayon::prelude::*;
use serde::Serialize;
use tracing::{
    debug,
    warn,
};

use super::detection::PeakCandidate;
use super::gaussian::{
    FitOutcome,
    evaluate_fit,
    fit_gaussian,
};
use crate::config::FitThresholds;
use crate::models::Histogram;

/// Candidates fitted per work unit.
pub const FIT_BATCH: usize = 900;

/// One candidate window, owned so batches share nothing.
#[derive(Debug, Clone)]
pub struct FitTask {
    pub candidate_index: usize,
    pub bin_index: usize,
    /// Bin centers of the window.
    pub xs: Vec<f64>,
    /// Raw counts of the window.
    pub ys: Vec<f64>,
    /// Raw count of the candidate bin.
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandidateFit {
    pub candidate_index: usize,
    pub bin_index: usize,
    pub outcome: FitOutcome,
}

pub fn build_tasks(
    histogram: &Histogram,
    candidates: &[PeakCandidate],
    half_window: usize,
) -> Vec<FitTask> {
    let grid = histogram.grid();
    let counts = histogram.counts();
    candidates
        .iter()
        .enumerate()
        .map(|(candidate_index, cand)| {
            let start = cand.bin_index.saturating_sub(half_window);
            let end = (cand.bin_index + half_window).min(counts.len() - 1);
            FitTask {
                candidate_index,
                bin_index: cand.bin_index,
                xs: (start..=end).map(|b| grid.center(b)).collect(),
                ys: counts[start..=end].iter().map(|&c| c as f64).collect(),
                height: counts[cand.bin_index] as f64,
            }
        })
        .collect()
}

fn run_batch(batch: Vec<FitTask>, thresholds: &FitThresholds) -> Vec<CandidateFit> {
    batch
        .into_iter()
        .map(|task| {
            let fit = fit_gaussian(&task.xs, &task.ys, task.height);
            let (first, last) = match (task.xs.first(), task.xs.last()) {
                (Some(&f), Some(&l)) => (f, l),
                _ => (f64::NAN, f64::NAN),
            };
            let outcome = evaluate_fit(fit, first, last, thresholds);
            if let FitOutcome::NoFit = outcome {
                debug!("No gaussian fit for bin {}", task.bin_index);
            }
            CandidateFit {
                candidate_index: task.candidate_index,
                bin_index: task.bin_index,
                outcome,
            }
        })
        .collect()
}

/// Fits every task, in batches of [`FIT_BATCH`] on a bounded rayon pool.
///
/// Results are in candidate order whatever the completion order.
pub fn fit_candidates(tasks: Vec<FitTask>, thresholds: &FitThresholds) -> Vec<CandidateFit> {
    fit_candidates_batched(tasks, thresholds, FIT_BATCH)
}

pub fn fit_candidates_batched(
    tasks: Vec<FitTask>,
    thresholds: &FitThresholds,
    batch_size: usize,
) -> Vec<CandidateFit> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Vec<FitTask>> = Vec::with_capacity(tasks.len().div_ceil(batch_size));
    let mut tasks = tasks.into_iter().peekable();
    while tasks.peek().is_some() {
        batches.push(tasks.by_ref().take(batch_size).collect());
    }

    let mut results = match batches.len() {
        0 => return Vec::new(),
        1 => batches
            .into_iter()
            .flat_map(|b| run_batch(b, thresholds))
            .collect(),
        nbatches => {
            let nthreads = nbatches.min(rayon::current_num_threads());
            debug!("Fitting {} batches on {} threads", nbatches, nthreads);
            match rayon::ThreadPoolBuilder::new().num_threads(nthreads).build() {
                Ok(pool) => pool.install(|| {
                    batches
                        .into_par_iter()
                        .flat_map_iter(|b| run_batch(b, thresholds))
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    warn!("Unable to build fit thread pool ({}), fitting serially", e);
                    batches
                        .into_iter()
                        .flat_map(|b| run_batch(b, thresholds))
                        .collect()
                }
            }
        }
    };
    results.sort_by_key(|r| r.candidate_index);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BinGrid;

    fn thresholds() -> FitThresholds {
        FitThresholds {
            max_relative_height_error: 0.15,
            max_relative_sigma_error: 0.1,
        }
    }

    fn synthetic_histogram() -> Histogram {
        let grid = BinGrid::try_new(0.0, 1.0, 0.001).unwrap();
        let mut values = Vec::new();
        // Deterministic bell shaped piles at every 0.05 Da.
        for k in 1..20 {
            let center = k as f64 * 0.05;
            for (offset, count) in [(-3, 2), (-2, 10), (-1, 40), (0, 60), (1, 40), (2, 10), (3, 2)]
            {
                let x = center + offset as f64 * 0.001 + 0.0005;
                values.extend(std::iter::repeat_n(x, count));
            }
        }
        grid.histogram(values)
    }

    #[test]
    fn test_results_are_in_candidate_order() {
        let hist = synthetic_histogram();
        let candidates: Vec<PeakCandidate> = (1..20)
            .map(|k| {
                let bin = hist.grid().digitize(k as f64 * 0.05 + 0.0005);
                PeakCandidate {
                    bin_index: bin,
                    smoothed_height: hist.counts()[bin] as f64,
                }
            })
            .collect();
        let tasks = build_tasks(&hist, &candidates, 7);
        assert_eq!(tasks[0].xs.len(), 15);

        let serial = fit_candidates(tasks.clone(), &thresholds());
        let batched = fit_candidates_batched(tasks, &thresholds(), 2);
        assert_eq!(serial.len(), candidates.len());
        for (i, (a, b)) in serial.iter().zip(batched.iter()).enumerate() {
            assert_eq!(a.candidate_index, i);
            assert_eq!(b.candidate_index, i);
            assert_eq!(a.bin_index, candidates[i].bin_index);
            assert_eq!(a.outcome, b.outcome);
            assert!(a.outcome.passed().is_some(), "{:?}", a);
        }
    }

    #[test]
    fn test_no_tasks() {
        assert!(fit_candidates(Vec::new(), &thresholds()).is_empty());
    }
}
