//! Training orchestration.
//!
//! Sequences the full pipeline: scale, select order when requested, split
//! rows into per-group sequences, fit the final model with per-iteration
//! progress, decode each sequence, and reassemble per-observation state
//! labels into the original row order.
//!
//! `train` offloads the work to a dedicated worker thread communicating
//! over an mpsc channel (inputs in, progress/result/error out) so the
//! caller is not blocked for the multi-second duration of a fit;
//! `train_blocking` is the in-process fallback with the identical
//! signature and identical results for identical inputs and seed.

use crate::config::EngineConfig;
use crate::features::scaler::{ScalerParams, StandardScaler};
use crate::model::hmm::{FitOptions, GaussianHmm};
use crate::model::params::HmmParams;
use crate::model::selector::select_order;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use nf_common::{Error, GroupId, Result};
use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;

/// Inputs to one training run. Each run owns its matrix; there is no shared
/// mutable state between concurrent runs.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    /// Raw (unscaled) observation rows, in original order.
    pub rows: Vec<Vec<f64>>,
    /// Optional per-row group identifiers, parallel to `rows`.
    pub groups: Option<Vec<Option<GroupId>>>,
    /// Fixed state count; None means BIC auto-selection.
    pub n_states: Option<usize>,
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// One hidden-state index per input row, in original row order.
    pub states: Vec<usize>,
    pub n_states: usize,
    pub converged: bool,
    pub iterations: usize,
    pub log_likelihood: f64,
    pub scaler: ScalerParams,
    pub params: HmmParams,
}

enum WorkerMsg {
    Progress(ProgressUpdate),
    Done(Box<TrainingOutcome>),
    Failed(Error),
}

/// Training orchestrator. At most one in-flight run per call; callers
/// wanting concurrency create independent trainers.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: EngineConfig,
}

impl Trainer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the pipeline on a worker thread, forwarding progress to the sink
    /// on the caller's thread. The worker is always joined, whether the run
    /// succeeded, failed, or panicked.
    pub fn train(
        &self,
        request: TrainRequest,
        sink: Option<ProgressSink>,
    ) -> Result<TrainingOutcome> {
        let (tx, rx) = mpsc::channel();
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("nf-train".into())
            .spawn(move || {
                let result = run_pipeline(&config, request, &mut |update| {
                    let _ = tx.send(WorkerMsg::Progress(update));
                });
                let _ = tx.send(match result {
                    Ok(outcome) => WorkerMsg::Done(Box::new(outcome)),
                    Err(err) => WorkerMsg::Failed(err),
                });
            })
            .map_err(|e| Error::Training(format!("failed to spawn training worker: {e}")))?;

        let mut outcome: Option<Result<TrainingOutcome>> = None;
        for msg in rx {
            match msg {
                WorkerMsg::Progress(update) => {
                    if let Some(sink) = sink.as_ref() {
                        sink(update);
                    }
                }
                WorkerMsg::Done(out) => outcome = Some(Ok(*out)),
                WorkerMsg::Failed(err) => outcome = Some(Err(err)),
            }
        }

        match handle.join() {
            Ok(()) => outcome.unwrap_or_else(|| {
                Err(Error::Training(
                    "training worker exited without a result".into(),
                ))
            }),
            Err(panic) => Err(Error::Training(format!(
                "training worker panicked: {}",
                panic_message(&panic)
            ))),
        }
    }

    /// In-process fallback: identical signature and results, progress
    /// invoked synchronously at the same checkpoints.
    pub fn train_blocking(
        &self,
        request: TrainRequest,
        sink: Option<ProgressSink>,
    ) -> Result<TrainingOutcome> {
        run_pipeline(&self.config, request, &mut |update| {
            if let Some(sink) = sink.as_ref() {
                sink(update);
            }
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Split rows into per-group sequences, remembering each observation's
/// original row index so decoding output can be reassembled exactly.
fn split_sequences(
    rows: Vec<Vec<f64>>,
    groups: Option<&[Option<GroupId>]>,
) -> (Vec<Vec<Vec<f64>>>, Vec<Vec<usize>>) {
    let Some(groups) = groups else {
        let indices = (0..rows.len()).collect();
        return (vec![rows], vec![indices]);
    };

    let mut positions: HashMap<Option<GroupId>, usize> = HashMap::new();
    let mut sequences: Vec<Vec<Vec<f64>>> = Vec::new();
    let mut index_map: Vec<Vec<usize>> = Vec::new();
    for (idx, (row, group)) in rows.into_iter().zip(groups.iter()).enumerate() {
        let pos = *positions.entry(group.clone()).or_insert_with(|| {
            sequences.push(Vec::new());
            index_map.push(Vec::new());
            sequences.len() - 1
        });
        sequences[pos].push(row);
        index_map[pos].push(idx);
    }
    (sequences, index_map)
}

fn run_pipeline(
    config: &EngineConfig,
    request: TrainRequest,
    emit: &mut dyn FnMut(ProgressUpdate),
) -> Result<TrainingOutcome> {
    let n_rows = request.rows.len();
    if n_rows == 0 {
        return Err(Error::EmptyMatrix);
    }
    if let Some(groups) = request.groups.as_ref() {
        if groups.len() != n_rows {
            return Err(Error::Training(format!(
                "group identifiers ({}) do not match rows ({})",
                groups.len(),
                n_rows
            )));
        }
    }

    emit(ProgressUpdate::new(Phase::Scale, 2));
    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&request.rows)?;
    let scaler_params = scaler
        .params()
        .cloned()
        .ok_or(Error::ScalerNotFitted)?;
    emit(ProgressUpdate::new(Phase::Scale, 5));

    // A requested count of 0 means "pick for me", same as leaving it unset.
    // Fixed counts skip order selection entirely, including its phase.
    let n_states = match request.n_states {
        Some(k) if k >= 1 => k,
        _ => {
            emit(ProgressUpdate::new(Phase::SelectOrder, 8));
            let sweep = select_order(&scaled, config)?;
            tracing::info!(n_states = sweep.n_states, bic = sweep.bic, "order selected");
            emit(
                ProgressUpdate::new(Phase::SelectOrder, 25)
                    .with_detail(format!("selected {} states", sweep.n_states)),
            );
            sweep.n_states
        }
    };

    let (sequences, index_map) = split_sequences(scaled, request.groups.as_deref());
    let dim = sequences
        .iter()
        .flatten()
        .next()
        .map(|row| row.len())
        .ok_or(Error::EmptyMatrix)?;

    let mut model = GaussianHmm::new(n_states, dim, config)?;
    let opts = FitOptions {
        max_iterations: config.fit_max_iterations,
        tolerance: config.fit_tolerance,
    };
    let summary = model.fit_observed(&sequences, &opts, &mut |iter, max| {
        let span = 65.0 * iter as f64 / max.max(1) as f64;
        emit(
            ProgressUpdate::new(Phase::Fit, 25 + span as u8)
                .with_detail(format!("iteration {iter}")),
        );
    })?;

    emit(ProgressUpdate::new(Phase::Decode, 92));
    let mut states = vec![0usize; n_rows];
    for (seq, indices) in sequences.iter().zip(index_map.iter()) {
        let decoded = model.decode(seq)?;
        for (state, idx) in decoded.into_iter().zip(indices.iter()) {
            states[*idx] = state;
        }
    }
    emit(ProgressUpdate::new(Phase::Decode, 100));

    Ok(TrainingOutcome {
        states,
        n_states,
        converged: summary.converged,
        iterations: summary.iterations,
        log_likelihood: summary.log_likelihood,
        scaler: scaler_params,
        params: model.to_params()?,
    })
}
