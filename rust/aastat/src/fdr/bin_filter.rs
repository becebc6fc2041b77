use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::qvalues::{
    LabelledScore,
    TargetDecoy,
    assign_qval,
    sort_for_competition,
};
use crate::config::FdrParams;
use crate::models::{
    Dataset,
    Psm,
};

/// A row that survived FDR filtering, with its q-value.
#[derive(Debug, Clone, Serialize)]
pub struct FilteredPsm {
    pub psm: Psm,
    pub q_value: f64,
}

impl LabelledScore for FilteredPsm {
    fn get_score(&self) -> f64 {
        self.psm.score
    }

    fn get_label(&self) -> TargetDecoy {
        self.psm.label
    }

    fn assign_qval(&mut self, q: f64) {
        self.q_value = q;
    }

    fn get_qval(&self) -> f64 {
        self.q_value
    }
}

/// Unique-peptide, FDR thresholded rows of a peak (or of the reference).
#[derive(Debug, Clone, Serialize, Default)]
pub struct FilteredSubset {
    pub rows: Vec<FilteredPsm>,
    /// Unique peptides that entered target-decoy competition.
    pub num_candidates: usize,
    /// Decoys inside the accepted prefix (dropped when `remove_decoys`).
    pub num_decoys: usize,
}

impl FilteredSubset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn peptides(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(|r| r.psm.peptide.as_ref())
    }
}

/// Deduplicates peptides (best score kept) and keeps the longest prefix of
/// the competition ordering whose q-value is within the FDR.
pub fn fdr_filter<'a>(rows: impl IntoIterator<Item = &'a Psm>, params: &FdrParams) -> FilteredSubset {
    let mut scored: Vec<FilteredPsm> = rows
        .into_iter()
        .map(|psm| FilteredPsm {
            psm: psm.clone(),
            q_value: f64::NAN,
        })
        .collect();
    sort_for_competition(&mut scored);

    let mut seen: HashSet<std::sync::Arc<str>> = HashSet::with_capacity(scored.len());
    scored.retain(|r| seen.insert(r.psm.peptide.clone()));
    let num_candidates = scored.len();

    assign_qval(&mut scored, params.correction);
    // q-values are non decreasing along the ordering, so the prefix is a count.
    let keep = scored
        .iter()
        .take_while(|r| r.q_value <= params.fdr)
        .count();
    scored.truncate(keep);

    let num_decoys = scored.iter().filter(|r| r.psm.is_decoy()).count();
    if params.remove_decoys {
        scored.retain(|r| !r.psm.is_decoy());
    }
    debug!(
        "FDR filter kept {} of {} unique peptides ({} decoys in prefix)",
        scored.len(),
        num_candidates,
        num_decoys
    );

    FilteredSubset {
        rows: scored,
        num_candidates,
        num_decoys,
    }
}

/// Filters the rows binned in `[bin - half_window, bin + half_window]`.
pub fn filter_peak_bin(
    dataset: &Dataset,
    bin: usize,
    half_window: usize,
    params: &FdrParams,
) -> FilteredSubset {
    let last = (bin + half_window).min(dataset.grid().num_bins() - 1);
    fdr_filter(
        dataset.rows_in_bins(bin.saturating_sub(half_window), last),
        params,
    )
}

/// Filters the rows whose mass shift is inside `[lo, hi]` Da.
pub fn filter_mass_window(dataset: &Dataset, lo: f64, hi: f64, params: &FdrParams) -> FilteredSubset {
    fdr_filter(dataset.rows_in_mass_range(lo, hi), params)
}
