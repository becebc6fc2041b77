use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TargetDecoy {
    Target,
    Decoy,
}

pub trait LabelledScore {
    fn get_score(&self) -> f64;
    fn get_label(&self) -> TargetDecoy;
    fn assign_qval(&mut self, q: f64);
    fn get_qval(&self) -> f64;
}

impl LabelledScore for (f64, TargetDecoy, f64) {
    fn get_score(&self) -> f64 {
        self.0
    }

    fn get_label(&self) -> TargetDecoy {
        self.1
    }

    fn assign_qval(&mut self, q: f64) {
        self.2 = q
    }

    fn get_qval(&self) -> f64 {
        self.2
    }
}

/// Sorts for target-decoy competition: best (lowest) score first, decoys
/// ahead of targets on equal scores.
pub fn sort_for_competition<T: LabelledScore>(scores: &mut [T]) {
    scores.sort_by(|a, b| {
        a.get_score()
            .total_cmp(&b.get_score())
            .then_with(|| decoy_first(a.get_label()).cmp(&decoy_first(b.get_label())))
    });
}

fn decoy_first(label: TargetDecoy) -> u8 {
    match label {
        TargetDecoy::Decoy => 0,
        TargetDecoy::Target => 1,
    }
}

/// Assign q_values in place.
///
/// # Invariants
/// * `scores` must be sorted as by [`sort_for_competition`] (best PSM is first)
///
/// The FDR at each position is `(decoys + c) / targets`, `c` being 1 when
/// `correction` is set.
///
/// Implementation derived from the Sage implementation of qval github.com/lazear/sage
pub fn assign_qval<T: LabelledScore>(scores: &mut [T], correction: bool) {
    let (Some(first_score), Some(last_score)) = (scores.first(), scores.last()) else {
        return;
    };
    debug_assert!(first_score.get_score() <= last_score.get_score());

    let mut decoy = if correction { 1 } else { 0 };
    let mut target = 0;

    for score in scores.iter_mut() {
        match score.get_label() {
            TargetDecoy::Decoy => decoy += 1,
            TargetDecoy::Target => target += 1,
        }
        score.assign_qval(decoy as f64 / target.max(1) as f64);
    }

    // Reverse slice, and calculate the cumulative minimum
    let mut q_min = 1.0f64;
    for score in scores.iter_mut().rev() {
        q_min = q_min.min(score.get_qval());
        score.assign_qval(q_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qvalues_are_monotonic() {
        use TargetDecoy::*;
        let mut scores = vec![
            (0.4, Target, 0.0),
            (0.1, Target, 0.0),
            (0.3, Decoy, 0.0),
            (0.2, Target, 0.0),
            (0.5, Target, 0.0),
            (0.6, Decoy, 0.0),
        ];
        sort_for_competition(&mut scores);
        assign_qval(&mut scores, false);
        let q: Vec<f64> = scores.iter().map(|s| s.2).collect();
        // Raw FDR: 0, 0, 1/2, 1/3, 1/4, 2/4
        assert_eq!(q, vec![0.0, 0.0, 0.25, 0.25, 0.25, 0.5]);
        for pair in q.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_decoys_sort_first_on_ties() {
        use TargetDecoy::*;
        let mut scores = vec![(0.1, Target, 0.0), (0.1, Decoy, 0.0)];
        sort_for_competition(&mut scores);
        assert_eq!(scores[0].1, Decoy);
        assign_qval(&mut scores, false);
        // A lone decoy over zero targets is clamped by the cumulative minimum.
        assert_eq!(scores[0].2, 1.0);
    }

    #[test]
    fn test_correction_adds_one_decoy() {
        use TargetDecoy::*;
        let mut scores: Vec<_> = (0..4).map(|i| (i as f64, Target, 0.0)).collect();
        assign_qval(&mut scores, true);
        assert_eq!(scores.last().unwrap().2, 0.25);
        assign_qval(&mut scores, false);
        assert_eq!(scores.last().unwrap().2, 0.0);
    }
}
