use serde::Serialize;
use tracing::debug;

use super::bootstrap::bootstrap_ratios;
use super::distribution::{
    AaDistribution,
    peptide_coverage,
    ratios,
};
use super::ttest::ttest_ind;
use crate::config::{
    AaStatParams,
    AbsentResiduePolicy,
};
use crate::utils::stats::sample_std;

/// Bootstrap stream of the reference null. Peaks use their own streams so
/// their subsets are drawn independently of the null.
pub const REFERENCE_STREAM: u64 = 0;

/// The zero-shift baseline, computed once and shared by every peak.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceStats {
    pub num_peptides: usize,
    pub distribution: AaDistribution,
    /// Reference frequency per label.
    pub frequencies: Vec<f64>,
    /// Reference-vs-reference bootstrap ratios, per label.
    pub null_samples: Vec<Vec<f64>>,
    pub coverage: Vec<u32>,
}

/// Per label statistics of one peak, in label order.
#[derive(Debug, Clone, Serialize)]
pub struct PeakAaStats {
    pub num_peptides: usize,
    pub ratios: Vec<f64>,
    pub error_bars: Vec<f64>,
    pub p_values: Vec<f64>,
    pub coverage: Vec<u32>,
}

impl ReferenceStats {
    pub fn new(peptides: &[&str], params: &AaStatParams) -> Self {
        let distribution = AaDistribution::from_peptides(peptides.iter().copied(), &params.rule);
        let frequencies = distribution.frequencies(&params.labels);
        let null_samples = bootstrap_ratios(
            peptides,
            &frequencies,
            &params.labels,
            &params.rule,
            params.iterations,
            params.seed,
            REFERENCE_STREAM,
        );
        debug!(
            "Reference of {} peptides, {} residues after {} cleavage",
            peptides.len(),
            distribution.total(),
            params.rule.name()
        );
        Self {
            num_peptides: peptides.len(),
            distribution,
            frequencies,
            null_samples,
            coverage: peptide_coverage(peptides.iter().copied(), &params.labels),
        }
    }

    /// Statistics of the reference itself: ratios of 1, no test.
    pub fn as_peak_stats(&self) -> PeakAaStats {
        let n = self.frequencies.len();
        PeakAaStats {
            num_peptides: self.num_peptides,
            ratios: ratios(&self.frequencies, &self.frequencies),
            error_bars: vec![0.0; n],
            p_values: vec![f64::NAN; n],
            coverage: self.coverage.clone(),
        }
    }
}

/// Ratios to the reference, bootstrap error bars and p-values against the
/// reference null for one peak's peptides.
///
/// `stream` selects the bootstrap stream, it should differ from
/// [`REFERENCE_STREAM`] and between peaks.
pub fn peak_stats(
    peptides: &[&str],
    reference: &ReferenceStats,
    params: &AaStatParams,
    stream: u64,
) -> PeakAaStats {
    let distribution = AaDistribution::from_peptides(peptides.iter().copied(), &params.rule);
    let peak_ratios = ratios(&distribution.frequencies(&params.labels), &reference.frequencies);
    let samples = bootstrap_ratios(
        peptides,
        &reference.frequencies,
        &params.labels,
        &params.rule,
        params.iterations,
        params.seed,
        stream,
    );

    let error_bars = samples
        .iter()
        .map(|s| {
            let std = sample_std(s);
            if std.is_nan() { 0.0 } else { std }
        })
        .collect();

    let p_values = samples
        .iter()
        .zip(reference.null_samples.iter())
        .zip(peak_ratios.iter())
        .map(|((peak, null), &ratio)| {
            if ratio == 0.0 && params.absent_residue_policy == AbsentResiduePolicy::ExcludeFromTest
            {
                return f64::NAN;
            }
            ttest_ind(null, peak, params.t_test)
        })
        .collect();

    PeakAaStats {
        num_peptides: peptides.len(),
        ratios: peak_ratios,
        error_bars,
        p_values,
        coverage: peptide_coverage(peptides.iter().copied(), &params.labels),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aa_stats::CleavageRule;
    use crate::config::TTestKind;

    fn params(policy: AbsentResiduePolicy) -> AaStatParams {
        AaStatParams {
            rule: CleavageRule::parse("trypsin").unwrap(),
            labels: vec!['A', 'D', 'S', 'W'],
            iterations: 30,
            seed: 42,
            t_test: TTestKind::Student,
            absent_residue_policy: policy,
        }
    }

    fn peptide_set(offset: usize, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let body: String = "ACDEFGHILMNPQSTVY"
                    .chars()
                    .cycle()
                    .skip((i * 3 + offset) % 17)
                    .take(6 + i % 5)
                    .collect();
                format!("{}R", body)
            })
            .collect()
    }

    #[test]
    fn test_identical_sets_show_no_enrichment() {
        let p = params(AbsentResiduePolicy::TreatAsDepletion);
        let owned = peptide_set(0, 60);
        let peps: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
        let reference = ReferenceStats::new(&peps, &p);
        let stats = peak_stats(&peps, &reference, &p, 1);

        for (i, label) in p.labels.iter().enumerate() {
            if *label == 'W' {
                // Absent from both sets.
                assert!(stats.ratios[i].is_nan());
                continue;
            }
            assert!((stats.ratios[i] - 1.0).abs() < 1e-12);
            // Independent draws of the same set, so no strong evidence either way.
            assert!(stats.p_values[i] > 1e-3, "{} {}", label, stats.p_values[i]);
        }

        let again = peak_stats(&peps, &reference, &p, 1);
        assert_eq!(stats.error_bars, again.error_bars);
        let other = peak_stats(&peps, &reference, &p, 2);
        assert_ne!(stats.error_bars, other.error_bars);
    }

    #[test]
    fn test_enriched_residue() {
        let p = params(AbsentResiduePolicy::TreatAsDepletion);
        let ref_owned = peptide_set(0, 80);
        let ref_peps: Vec<&str> = ref_owned.iter().map(|s| s.as_str()).collect();
        let reference = ReferenceStats::new(&ref_peps, &p);

        let peak_owned: Vec<String> = peptide_set(5, 80)
            .into_iter()
            .map(|s| format!("SSS{}", s))
            .collect();
        let peak_peps: Vec<&str> = peak_owned.iter().map(|s| s.as_str()).collect();
        let stats = peak_stats(&peak_peps, &reference, &p, 1);
        assert!(stats.ratios[2] > 1.5, "{:?}", stats.ratios);
        assert!(stats.p_values[2] < 0.01, "{:?}", stats.p_values);
        assert!(stats.error_bars[2] > 0.0);
        assert_eq!(stats.coverage[2], 100);
    }

    #[test]
    fn test_absent_residue_policy() {
        let owned = peptide_set(0, 40);
        let ref_peps: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
        // No D in the peak.
        let peak_owned: Vec<String> = owned.iter().map(|s| s.replace('D', "A")).collect();
        let peak_peps: Vec<&str> = peak_owned.iter().map(|s| s.as_str()).collect();

        let keep = params(AbsentResiduePolicy::TreatAsDepletion);
        let reference = ReferenceStats::new(&ref_peps, &keep);
        let stats = peak_stats(&peak_peps, &reference, &keep, 1);
        assert_eq!(stats.ratios[1], 0.0);
        assert!(stats.p_values[1] < 0.01);

        let exclude = params(AbsentResiduePolicy::ExcludeFromTest);
        let stats = peak_stats(&peak_peps, &reference, &exclude, 1);
        assert!(stats.p_values[1].is_nan());
    }
}
