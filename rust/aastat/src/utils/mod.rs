pub mod linalg;
pub mod stats;
