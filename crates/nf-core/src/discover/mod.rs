//! End-to-end state discovery service.
//!
//! Ties the flow store, the trainer, and the scorer together: pull flows,
//! train, write assignments back, aggregate signatures, score. One
//! `discover` call is one run; runs are independent and repeatable for the
//! same store contents and seed.

use crate::config::EngineConfig;
use crate::features::FeatureMatrix;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use crate::score::score_states;
use crate::store::FlowStore;
use crate::train::{TrainRequest, Trainer, TrainingOutcome};
use nf_common::{Error, Result, StateProfile};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default number of flows pulled per run.
pub const DEFAULT_SAMPLE_SIZE: usize = 5_000;

/// One discovery run's inputs.
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    /// Fixed state count; None selects by BIC.
    pub requested_states: Option<usize>,
    /// Upper bound on flows pulled from the store.
    pub sample_size: usize,
}

impl Default for DiscoverRequest {
    fn default() -> Self {
        Self {
            requested_states: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Scored output of one discovery run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Discovery {
    /// Identity of this run, for log correlation only. This is the one
    /// value outside the seeded pipeline: profiles, assignments, and
    /// diagnostics depend solely on store contents and the configured
    /// seed, never on the run id.
    pub run_id: Uuid,
    pub profiles: Vec<StateProfile>,
    pub n_states: usize,
    pub converged: bool,
    pub iterations: usize,
    pub log_likelihood: f64,
}

/// Discovery pipeline over a flow store.
pub struct DiscoveryService<S: FlowStore> {
    store: S,
    trainer: Trainer,
}

impl<S: FlowStore> DiscoveryService<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        Ok(Self {
            store,
            trainer: Trainer::new(config)?,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the full pipeline. Progress covers training; a final `Score`
    /// update marks completion.
    pub fn discover(
        &mut self,
        request: &DiscoverRequest,
        sink: Option<ProgressSink>,
    ) -> Result<Discovery> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, sample_size = request.sample_size, "discovery run started");

        let records = self.store.extract_flows(request.sample_size)?;
        let min = self.trainer.config().min_flows;
        if records.len() < min {
            return Err(Error::NotEnoughFlows {
                got: records.len(),
                min,
            });
        }
        self.store.ensure_state_column()?;

        let matrix = FeatureMatrix::from_records(&records);
        let outcome = self.trainer.train(
            TrainRequest {
                rows: matrix.rows,
                groups: Some(matrix.groups),
                n_states: request.requested_states,
            },
            sink.clone(),
        )?;

        let assignments: BTreeMap<_, _> = matrix
            .ids
            .iter()
            .copied()
            .zip(outcome.states.iter().copied())
            .collect();
        self.store.write_state_assignments(&assignments)?;

        let signatures = self.store.state_signatures()?;
        let profiles = score_states(signatures);
        if let Some(sink) = sink.as_ref() {
            sink(ProgressUpdate::new(Phase::Score, 100));
        }

        let TrainingOutcome {
            n_states,
            converged,
            iterations,
            log_likelihood,
            ..
        } = outcome;
        tracing::info!(
            %run_id,
            n_states,
            converged,
            iterations,
            log_likelihood,
            "discovery run finished"
        );
        Ok(Discovery {
            run_id,
            profiles,
            n_states,
            converged,
            iterations,
            log_likelihood,
        })
    }
}
