//! NetFlow State Discovery Core Library
//!
//! Discovers latent behavioral states in network-flow records with a
//! diagonal-covariance Gaussian Hidden Markov Model, then scores each
//! discovered state for anomalousness:
//! - Feature extraction and standardization
//! - Log-space Baum-Welch training and Viterbi decoding
//! - BIC model-order selection with early stopping
//! - Worker-thread training orchestration with progress events
//! - MAD-robust per-state anomaly scoring
//! - Flow-store boundary and end-to-end discovery service
//!
//! The binary entry point is in `main.rs`.

pub mod cli;
pub mod config;
pub mod discover;
pub mod features;
pub mod model;
pub mod progress;
pub mod score;
pub mod store;
pub mod train;

pub use config::EngineConfig;
pub use discover::{DiscoverRequest, Discovery, DiscoveryService};
pub use progress::{Phase, ProgressSink, ProgressUpdate};
pub use train::{TrainRequest, Trainer, TrainingOutcome};
