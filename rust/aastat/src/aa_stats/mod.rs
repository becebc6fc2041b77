//! Amino acid abundance of peak peptides relative to the zero-shift
//! reference, with bootstrap error bars and t-test p-values.

mod bootstrap;
mod cleavage;
mod distribution;
mod engine;
mod ttest;

pub use bootstrap::bootstrap_ratios;
pub use cleavage::CleavageRule;
pub use distribution::{
    AaDistribution,
    peptide_coverage,
    ratios,
};
pub use engine::{
    PeakAaStats,
    REFERENCE_STREAM,
    ReferenceStats,
    peak_stats,
};
pub use ttest::ttest_ind;
