//! Gaussian HMM model modules.

pub mod hmm;
pub mod kmeans;
pub mod params;
pub mod selector;

pub use hmm::{FitOptions, FitSummary, GaussianHmm};
pub use params::{HmmParams, PARAMS_VERSION};
pub use selector::{select_order, CandidateScore, SweepOutcome};
