use statrs::distribution::{
    ContinuousCDF,
    StudentsT,
};

use crate::config::TTestKind;
use crate::utils::stats::{
    mean,
    sample_variance,
};

/// Two sided p-value of a two sample t-test.
///
/// NaN for samples with fewer than two values, non-finite values, or a
/// zero standard error.
pub fn ttest_ind(a: &[f64], b: &[f64], kind: TTestKind) -> f64 {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    if a.len() < 2 || b.len() < 2 || !a.iter().chain(b).all(|v| v.is_finite()) {
        return f64::NAN;
    }
    let (ma, mb) = (mean(a), mean(b));
    let (va, vb) = (sample_variance(a), sample_variance(b));

    let (se, df) = match kind {
        TTestKind::Student => {
            let df = na + nb - 2.0;
            let pooled = ((na - 1.0) * va + (nb - 1.0) * vb) / df;
            ((pooled * (1.0 / na + 1.0 / nb)).sqrt(), df)
        }
        TTestKind::Welch => {
            let (qa, qb) = (va / na, vb / nb);
            let se2 = qa + qb;
            let df = se2.powi(2) / (qa.powi(2) / (na - 1.0) + qb.powi(2) / (nb - 1.0));
            (se2.sqrt(), df)
        }
    };
    if !(se > 0.0) || !df.is_finite() {
        return f64::NAN;
    }

    let t = (ma - mb) / se;
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.cdf(-t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}
