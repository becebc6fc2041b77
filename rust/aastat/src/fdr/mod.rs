mod bin_filter;
mod qvalues;

pub use bin_filter::{
    FilteredPsm,
    FilteredSubset,
    fdr_filter,
    filter_mass_window,
    filter_peak_bin,
};
pub use qvalues::{
    LabelledScore,
    TargetDecoy,
    assign_qval,
    sort_for_competition,
};
