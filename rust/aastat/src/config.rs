//! Analysis parameters.
//!
//! [`AnalysisParams`] is the user facing (serde) form, every field has a
//! default so partial JSON documents are accepted. [`AnalysisParams::resolve`]
//! validates it once and produces the [`ResolvedParams`] the pipeline runs on.

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

use crate::aa_stats::CleavageRule;
use crate::errors::ConfigError;
use crate::models::BinGrid;

/// The 20 canonical amino acids, in the order the tables report them.
pub const CANONICAL_AMINO_ACIDS: [char; 20] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y',
];

/// What to do when two peaks closer than the merge tolerance have exactly
/// the same center error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    PreferLowerBin,
    PreferHigherBin,
    KeepBoth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TTestKind {
    /// Pooled variance (scipy's `ttest_ind` default).
    #[default]
    Student,
    Welch,
}

/// How a residue that is absent from a peak's peptides (ratio of exactly 0)
/// takes part in the significance test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbsentResiduePolicy {
    /// Tested like any other ratio, a 0 ratio reads as depletion.
    #[default]
    TreatAsDepletion,
    /// No p-value (NaN) is reported for the residue.
    ExcludeFromTest,
}

/// Where the zero-shift reference comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceSelection {
    /// The retained peak with the mass shift closest to 0 Da.
    NearestToZero,
    /// All rows whose mass shift falls inside `[lo, hi]` Da.
    Window { lo: f64, hi: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub decoy_prefix: String,
    pub fdr: f64,
    /// Adds one to the decoy count when estimating the FDR.
    pub fdr_correction: bool,
    pub remove_decoys: bool,
    pub cleavage_rule: String,
    pub labels: Vec<String>,

    /// Histogram bin width in Da.
    pub bin_width: f64,
    /// Open search range scanned for peaks, in Da.
    pub mass_shift_range: (f64, f64),
    /// Width in Da of the window used for fitting and per-peak FDR filtering.
    pub walking_window: f64,
    /// Savitzky-Golay window in bins, defaults to the walking window.
    pub smoothing_window: Option<usize>,
    pub smoothing_order: usize,
    pub noise_floor_multiplier: f64,

    /// Maximum relative standard error of the fitted amplitude.
    pub max_deviation_height: f64,
    /// Maximum relative standard error of the fitted sigma.
    pub max_deviation_sigma: f64,
    /// Peaks whose bin centers are closer than this (Da) are merged.
    pub merge_tolerance: f64,
    pub tie_break: TieBreak,

    pub bootstrap_iterations: usize,
    pub seed: u64,
    pub t_test: TTestKind,
    pub absent_residue_policy: AbsentResiduePolicy,

    /// Explicit reference window, replaces the nearest-to-zero peak.
    pub specific_window: Option<(f64, f64)>,
    /// Subtract the per-file systematic shift before analysis.
    pub recalibrate: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            decoy_prefix: "DECOY_".to_string(),
            fdr: 0.02,
            fdr_correction: true,
            remove_decoys: true,
            cleavage_rule: "trypsin".to_string(),
            labels: CANONICAL_AMINO_ACIDS.iter().map(|c| c.to_string()).collect(),
            bin_width: 0.001,
            mass_shift_range: (-500.0, 500.0),
            walking_window: 0.015,
            smoothing_window: None,
            smoothing_order: 5,
            noise_floor_multiplier: 2.0,
            max_deviation_height: 0.15,
            max_deviation_sigma: 0.1,
            merge_tolerance: 0.01,
            tie_break: TieBreak::default(),
            bootstrap_iterations: 50,
            seed: 42,
            t_test: TTestKind::default(),
            absent_residue_policy: AbsentResiduePolicy::default(),
            specific_window: None,
            recalibrate: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SmoothingParams {
    pub window: usize,
    pub order: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FitThresholds {
    pub max_relative_height_error: f64,
    pub max_relative_sigma_error: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FdrParams {
    pub fdr: f64,
    pub correction: bool,
    pub remove_decoys: bool,
}

#[derive(Debug, Clone)]
pub struct AaStatParams {
    pub rule: CleavageRule,
    pub labels: Vec<char>,
    pub iterations: usize,
    pub seed: u64,
    pub t_test: TTestKind,
    pub absent_residue_policy: AbsentResiduePolicy,
}

/// Validated parameters, derived quantities computed once.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub grid: BinGrid,
    /// Odd number of bins in the fit/FDR window.
    pub window: usize,
    pub half_window: usize,
    pub smoothing: SmoothingParams,
    pub noise_floor_multiplier: f64,
    pub fit: FitThresholds,
    pub merge_tolerance: f64,
    pub tie_break: TieBreak,
    pub fdr: FdrParams,
    pub reference: ReferenceSelection,
    pub aa: AaStatParams,
}

fn make_odd(x: usize) -> usize {
    if x % 2 == 0 { x + 1 } else { x }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveParameter { field, value })
    }
}

impl AnalysisParams {
    pub fn resolve(&self) -> Result<ResolvedParams, ConfigError> {
        let (lo, hi) = self.mass_shift_range;
        let grid = BinGrid::try_new(lo, hi, self.bin_width)?;

        if !(self.fdr > 0.0 && self.fdr <= 1.0) {
            return Err(ConfigError::FdrOutOfRange(self.fdr));
        }
        require_positive("walking_window", self.walking_window)?;
        require_positive("noise_floor_multiplier", self.noise_floor_multiplier)?;
        require_positive("max_deviation_height", self.max_deviation_height)?;
        require_positive("max_deviation_sigma", self.max_deviation_sigma)?;
        require_positive("merge_tolerance", self.merge_tolerance)?;
        if self.bootstrap_iterations < 2 {
            return Err(ConfigError::NonPositiveParameter {
                field: "bootstrap_iterations (needs at least 2)",
                value: self.bootstrap_iterations as f64,
            });
        }

        let window_da = if hi - lo > self.walking_window {
            self.walking_window
        } else {
            hi - lo
        };
        let window = make_odd((window_da / self.bin_width).round().max(1.0) as usize);
        if window < 3 {
            return Err(ConfigError::WindowTooSmall {
                window,
                order: 2,
                context: "the fit window needs at least 3 bins for a 3 parameter gaussian",
            });
        }
        let half_window = window / 2;

        let smoothing_window = make_odd(self.smoothing_window.unwrap_or(window));
        if smoothing_window <= self.smoothing_order {
            return Err(ConfigError::WindowTooSmall {
                window: smoothing_window,
                order: self.smoothing_order,
                context: "smoothing window must be larger than the polynomial order",
            });
        }

        let reference = match self.specific_window {
            Some((wlo, whi)) => {
                if !(wlo.is_finite() && whi.is_finite() && whi > wlo) {
                    return Err(ConfigError::InvalidReferenceWindow { lo: wlo, hi: whi });
                }
                info!("Using explicit reference window [{}, {}] Da", wlo, whi);
                ReferenceSelection::Window { lo: wlo, hi: whi }
            }
            None => ReferenceSelection::NearestToZero,
        };

        let labels = self
            .labels
            .iter()
            .map(|l| {
                let mut chars = l.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
                    _ => Err(ConfigError::InvalidLabel(l.clone())),
                }
            })
            .collect::<Result<Vec<char>, ConfigError>>()?;

        let rule = CleavageRule::parse(&self.cleavage_rule)?;

        let resolved = ResolvedParams {
            grid,
            window,
            half_window,
            smoothing: SmoothingParams {
                window: smoothing_window,
                order: self.smoothing_order,
            },
            noise_floor_multiplier: self.noise_floor_multiplier,
            fit: FitThresholds {
                max_relative_height_error: self.max_deviation_height,
                max_relative_sigma_error: self.max_deviation_sigma,
            },
            merge_tolerance: self.merge_tolerance,
            tie_break: self.tie_break,
            fdr: FdrParams {
                fdr: self.fdr,
                correction: self.fdr_correction,
                remove_decoys: self.remove_decoys,
            },
            reference,
            aa: AaStatParams {
                rule,
                labels,
                iterations: self.bootstrap_iterations,
                seed: self.seed,
                t_test: self.t_test,
                absent_residue_policy: self.absent_residue_policy,
            },
        };
        debug!(
            "Resolved {} bins, window {} bins (half {}), smoothing {:?}",
            resolved.grid.num_bins(),
            resolved.window,
            resolved.half_window,
            resolved.smoothing
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolves() {
        let resolved = AnalysisParams::default().resolve().unwrap();
        assert_eq!(resolved.window, 15);
        assert_eq!(resolved.half_window, 7);
        assert_eq!(resolved.smoothing.window, 15);
        assert_eq!(resolved.aa.labels.len(), 20);
        assert_eq!(resolved.reference, ReferenceSelection::NearestToZero);
    }

    #[test]
    fn test_inverted_range_is_fatal() {
        let params = AnalysisParams {
            mass_shift_range: (10.0, -10.0),
            ..Default::default()
        };
        assert!(matches!(
            params.resolve(),
            Err(ConfigError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_bad_fdr_and_width() {
        let params = AnalysisParams {
            fdr: 0.0,
            ..Default::default()
        };
        assert_eq!(params.resolve().unwrap_err(), ConfigError::FdrOutOfRange(0.0));

        let params = AnalysisParams {
            bin_width: -0.1,
            ..Default::default()
        };
        assert_eq!(
            params.resolve().unwrap_err(),
            ConfigError::NonPositiveBinWidth(-0.1)
        );
    }

    #[test]
    fn test_even_window_becomes_odd() {
        let params = AnalysisParams {
            walking_window: 0.02,
            smoothing_window: Some(10),
            smoothing_order: 3,
            ..Default::default()
        };
        let resolved = params.resolve().unwrap();
        assert_eq!(resolved.window, 21);
        assert_eq!(resolved.half_window, 10);
        assert_eq!(resolved.smoothing.window, 11);
    }

    #[test]
    fn test_specific_window_is_resolved_once() {
        let params = AnalysisParams {
            specific_window: Some((-0.01, 0.01)),
            ..Default::default()
        };
        let resolved = params.resolve().unwrap();
        assert_eq!(
            resolved.reference,
            ReferenceSelection::Window { lo: -0.01, hi: 0.01 }
        );

        let params = AnalysisParams {
            specific_window: Some((0.01, -0.01)),
            ..Default::default()
        };
        assert!(matches!(
            params.resolve(),
            Err(ConfigError::InvalidReferenceWindow { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: AnalysisParams =
            serde_json::from_str(r#"{"fdr": 0.01, "tie_break": "keep_both"}"#).unwrap();
        assert_eq!(params.fdr, 0.01);
        assert_eq!(params.tie_break, TieBreak::KeepBoth);
        assert_eq!(params.bootstrap_iterations, 50);
    }

    #[test]
    fn test_bad_label() {
        let params = AnalysisParams {
            labels: vec!["S".into(), "pS".into()],
            ..Default::default()
        };
        assert_eq!(
            params.resolve().unwrap_err(),
            ConfigError::InvalidLabel("pS".into())
        );
    }
}
