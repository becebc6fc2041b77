//! Mass shift peak discovery: smoothing, candidate detection, gaussian
//! fitting and merging of near duplicates.

mod batch;
mod detection;
mod filter;
mod gaussian;
mod smoothing;

pub use batch::{
    CandidateFit,
    FIT_BATCH,
    FitTask,
    build_tasks,
    fit_candidates,
    fit_candidates_batched,
};
pub use detection::{
    PeakCandidate,
    find_candidates,
    noise_floor,
};
pub use filter::{
    AcceptedPeak,
    merge_close_peaks,
};
pub use gaussian::{
    FitOutcome,
    GaussianFit,
    RejectReason,
    evaluate_fit,
    fit_gaussian,
    fit_gaussian_from,
};
pub use smoothing::savitzky_golay;
