use serde::Serialize;
use std::collections::{
    BTreeMap,
    HashSet,
};

use super::cleavage::CleavageRule;

/// Residue counts over the unique 0-missed-cleavage fragments of a set of
/// peptides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AaDistribution {
    counts: BTreeMap<char, u64>,
    total: u64,
}

impl AaDistribution {
    pub fn from_peptides<'a>(
        peptides: impl IntoIterator<Item = &'a str>,
        rule: &CleavageRule,
    ) -> Self {
        let fragments: HashSet<&str> = peptides
            .into_iter()
            .flat_map(|p| rule.cleave(p))
            .collect();
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for fragment in fragments {
            for aa in fragment.chars() {
                *counts.entry(aa).or_insert(0) += 1;
                total += 1;
            }
        }
        Self { counts, total }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Relative frequency, 0 for residues that never occur.
    pub fn frequency(&self, aa: char) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(&aa).copied().unwrap_or(0) as f64 / self.total as f64
    }

    pub fn frequencies(&self, labels: &[char]) -> Vec<f64> {
        labels.iter().map(|&aa| self.frequency(aa)).collect()
    }
}

/// Element-wise `frequency / reference`, NaN where the reference is 0.
pub fn ratios(frequencies: &[f64], reference: &[f64]) -> Vec<f64> {
    frequencies
        .iter()
        .zip(reference)
        .map(|(&f, &r)| if r == 0.0 { f64::NAN } else { f / r })
        .collect()
}

/// Integer percentage of unique peptides containing each label at least once.
pub fn peptide_coverage<'a>(peptides: impl IntoIterator<Item = &'a str>, labels: &[char]) -> Vec<u32> {
    let unique: HashSet<&str> = peptides.into_iter().collect();
    if unique.is_empty() {
        return vec![0; labels.len()];
    }
    labels
        .iter()
        .map(|&aa| {
            let with = unique.iter().filter(|p| p.contains(aa)).count();
            (100 * with / unique.len()) as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_counts_unique_fragments() {
        let rule = CleavageRule::parse("trypsin").unwrap();
        // AAK is shared and counted once.
        let dist = AaDistribution::from_peptides(["AAKCCK", "AAK"], &rule);
        assert_eq!(dist.total(), 6);
        assert!((dist.frequency('A') - 2.0 / 6.0).abs() < 1e-12);
        assert!((dist.frequency('K') - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(dist.frequency('W'), 0.0);
        let sum: f64 = dist.frequencies(&['A', 'C', 'K', 'W']).iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratios_nan_on_zero_reference() {
        let r = ratios(&[0.2, 0.1, 0.0], &[0.1, 0.0, 0.5]);
        assert_eq!(r[0], 2.0);
        assert!(r[1].is_nan());
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn test_peptide_coverage() {
        let cov = peptide_coverage(["SAK", "AAK", "SSK", "SAK"], &['S', 'A', 'W']);
        // 3 unique peptides, 2 with S, 2 with A.
        assert_eq!(cov, vec![66, 66, 0]);
    }
}
