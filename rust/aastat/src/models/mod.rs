mod histogram;
mod psm;

pub use histogram::{
    BinGrid,
    Histogram,
    HistogramBin,
};
pub use psm::{
    Dataset,
    Psm,
    label_from_proteins,
};
