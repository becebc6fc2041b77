use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use super::cleavage::CleavageRule;
use super::distribution::{
    AaDistribution,
    ratios,
};

/// Ratio samples of half-size random subsets against `reference`, one
/// row per label and one column per kept iteration.
///
/// The rng is seeded from `seed` and switched to `stream` on every call, so
/// the same peptides in the same order always give the same samples, while
/// different streams draw independent subsets. Subsets without any residue
/// are skipped.
pub fn bootstrap_ratios(
    peptides: &[&str],
    reference: &[f64],
    labels: &[char],
    rule: &CleavageRule,
    iterations: usize,
    seed: u64,
    stream: u64,
) -> Vec<Vec<f64>> {
    let mut samples = vec![Vec::with_capacity(iterations); labels.len()];
    let half = peptides.len() / 2;
    if half == 0 {
        return samples;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    let mut skipped = 0;
    for _ in 0..iterations {
        let picked = sample(&mut rng, peptides.len(), half);
        let dist = AaDistribution::from_peptides(picked.iter().map(|i| peptides[i]), rule);
        if dist.total() == 0 {
            skipped += 1;
            continue;
        }
        let r = ratios(&dist.frequencies(labels), reference);
        for (label_samples, value) in samples.iter_mut().zip(r) {
            label_samples.push(value);
        }
    }
    if skipped > 0 {
        trace!("{} empty bootstrap subsets skipped", skipped);
    }
    samples
}
