use serde::Serialize;
use std::sync::Arc;

use super::histogram::BinGrid;
use crate::errors::DataProcessingError;
use crate::fdr::TargetDecoy;

/// A single peptide-spectrum match from an open search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Psm {
    pub peptide: Arc<str>,
    /// Observed minus theoretical mass, in Da.
    pub mass_shift: f64,
    /// Search engine score, lower is better (e.g. an expectation value).
    pub score: f64,
    pub label: TargetDecoy,
    pub proteins: Arc<[String]>,
    pub spectrum: Option<Arc<str>>,
}

impl Psm {
    pub fn try_new(
        peptide: impl Into<Arc<str>>,
        mass_shift: f64,
        score: f64,
        label: TargetDecoy,
        proteins: Vec<String>,
        spectrum: Option<String>,
    ) -> Result<Self, DataProcessingError> {
        let peptide = peptide.into();
        if !mass_shift.is_finite() || !score.is_finite() {
            return Err(DataProcessingError::ExpectedFiniteNonNanData {
                context: format!(
                    "PSM {} has mass shift {} and score {}",
                    peptide, mass_shift, score
                ),
            });
        }
        if peptide.is_empty() {
            return Err(DataProcessingError::ExpectedNonEmptyData {
                context: Some("PSM with an empty peptide sequence".to_string()),
            });
        }
        Ok(Self {
            peptide,
            mass_shift,
            score,
            label,
            proteins: proteins.into(),
            spectrum: spectrum.map(Into::into),
        })
    }

    pub fn is_decoy(&self) -> bool {
        self.label == TargetDecoy::Decoy
    }
}

/// Decoy convention of the search databases: a match is a decoy only when
/// every protein it maps to carries the decoy prefix.
pub fn label_from_proteins<S: AsRef<str>>(proteins: &[S], decoy_prefix: &str) -> TargetDecoy {
    if !proteins.is_empty() && proteins.iter().all(|p| p.as_ref().starts_with(decoy_prefix)) {
        TargetDecoy::Decoy
    } else {
        TargetDecoy::Target
    }
}

/// All PSMs of a run, each assigned to a bin of the run's grid.
///
/// Read only once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    grid: BinGrid,
    rows: Vec<Psm>,
    bins: Vec<usize>,
}

impl Dataset {
    pub fn new(rows: Vec<Psm>, grid: BinGrid) -> Self {
        let bins = rows.iter().map(|r| grid.digitize(r.mass_shift)).collect();
        Self { grid, rows, bins }
    }

    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    pub fn rows(&self) -> &[Psm] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn bin_of(&self, row: usize) -> usize {
        self.bins[row]
    }

    pub fn mass_shifts(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.mass_shift)
    }

    /// Rows whose bin lies in `[first_bin, last_bin]`.
    pub fn rows_in_bins(&self, first_bin: usize, last_bin: usize) -> Vec<&Psm> {
        self.rows
            .iter()
            .zip(self.bins.iter())
            .filter(|&(_, &b)| b >= first_bin && b <= last_bin)
            .map(|(r, _)| r)
            .collect()
    }

    /// Rows whose mass shift lies in `[lo, hi]` Da.
    pub fn rows_in_mass_range(&self, lo: f64, hi: f64) -> Vec<&Psm> {
        self.rows
            .iter()
            .filter(|r| r.mass_shift >= lo && r.mass_shift <= hi)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoy_needs_all_proteins() {
        assert_eq!(
            label_from_proteins(&["DECOY_P1", "DECOY_P2"], "DECOY_"),
            TargetDecoy::Decoy
        );
        assert_eq!(
            label_from_proteins(&["DECOY_P1", "P2"], "DECOY_"),
            TargetDecoy::Target
        );
        let empty: [&str; 0] = [];
        assert_eq!(label_from_proteins(&empty, "DECOY_"), TargetDecoy::Target);
    }

    #[test]
    fn test_non_finite_rows_are_rejected() {
        let res = Psm::try_new("PEPTIDEK", f64::NAN, 0.1, TargetDecoy::Target, vec![], None);
        assert!(matches!(
            res,
            Err(DataProcessingError::ExpectedFiniteNonNanData { .. })
        ));
        let res = Psm::try_new("", 0.0, 0.1, TargetDecoy::Target, vec![], None);
        assert!(res.is_err());
    }

    #[test]
    fn test_dataset_bins_match_grid() {
        let grid = BinGrid::try_new(-1.0, 1.0, 0.1).unwrap();
        let rows = [-5.0, -0.95, 0.0, 0.42, 3.0]
            .iter()
            .map(|&m| Psm::try_new("PEPK", m, 1.0, TargetDecoy::Target, vec![], None).unwrap())
            .collect();
        let data = Dataset::new(rows, grid);
        for (i, row) in data.rows().iter().enumerate() {
            assert_eq!(data.bin_of(i), grid.digitize(row.mass_shift));
        }
        assert_eq!(data.rows_in_bins(0, 0).len(), 2);
        assert_eq!(data.rows_in_bins(19, 19).len(), 1);
        assert_eq!(data.rows_in_mass_range(-1.0, 1.0).len(), 3);
    }
}
