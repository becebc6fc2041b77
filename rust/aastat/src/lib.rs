pub mod aa_stats;
pub mod calibration;
pub mod config;
pub mod errors;
pub mod fdr;
pub mod models;
pub mod peaks;
pub mod pipeline;
pub mod utils;

pub use config::{
    AnalysisParams,
    ResolvedParams,
};
pub use errors::{
    ConfigError,
    DataProcessingError,
};
pub use fdr::TargetDecoy;
pub use models::{
    BinGrid,
    Dataset,
    Histogram,
    Psm,
};
pub use pipeline::{
    AnalysisOutput,
    RunWarning,
    run,
};
