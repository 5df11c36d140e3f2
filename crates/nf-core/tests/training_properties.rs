//! Property tests for the training pipeline.

use nf_common::GroupId;
use nf_core::{EngineConfig, TrainRequest, Trainer};
use proptest::prelude::*;

/// Rows drawn from `k` well-separated clusters with bounded jitter, tagged
/// with the cluster they came from.
fn clustered_rows(
    k: usize,
    per_cluster: usize,
) -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<usize>)> {
    prop::collection::vec(-0.4f64..0.4, k * per_cluster * 2).prop_map(move |jitter| {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..k * per_cluster {
            let cluster = i % k;
            let base = cluster as f64 * 20.0;
            rows.push(vec![base + jitter[2 * i], base + jitter[2 * i + 1]]);
            labels.push(cluster);
        }
        (rows, labels)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn decode_output_matches_input_length_and_range(
        (rows, _) in clustered_rows(2, 12),
        k in 1usize..4,
    ) {
        let trainer = Trainer::new(EngineConfig::default()).unwrap();
        let outcome = trainer
            .train_blocking(
                TrainRequest {
                    rows: rows.clone(),
                    groups: None,
                    n_states: Some(k),
                },
                None,
            )
            .unwrap();
        prop_assert_eq!(outcome.states.len(), rows.len());
        prop_assert!(outcome.states.iter().all(|s| *s < k));
        prop_assert!(outcome.log_likelihood.is_finite());
    }

    #[test]
    fn separated_clusters_get_distinct_states((rows, labels) in clustered_rows(2, 15)) {
        let trainer = Trainer::new(EngineConfig::default()).unwrap();
        let outcome = trainer
            .train_blocking(
                TrainRequest {
                    rows,
                    groups: None,
                    n_states: Some(2),
                },
                None,
            )
            .unwrap();

        // State labeling is arbitrary but must be consistent per cluster.
        let state_of_cluster0 = outcome.states[labels.iter().position(|l| *l == 0).unwrap()];
        let state_of_cluster1 = outcome.states[labels.iter().position(|l| *l == 1).unwrap()];
        prop_assert_ne!(state_of_cluster0, state_of_cluster1);
        for (state, label) in outcome.states.iter().zip(labels.iter()) {
            let expected = if *label == 0 { state_of_cluster0 } else { state_of_cluster1 };
            prop_assert_eq!(*state, expected);
        }
    }

    #[test]
    fn same_seed_is_deterministic((rows, _) in clustered_rows(2, 12)) {
        let trainer = Trainer::new(EngineConfig::default()).unwrap();
        let request = TrainRequest {
            rows,
            groups: None,
            n_states: Some(2),
        };
        let a = trainer.train_blocking(request.clone(), None).unwrap();
        let b = trainer.train_blocking(request, None).unwrap();
        prop_assert_eq!(a.states, b.states);
        prop_assert_eq!(a.iterations, b.iterations);
        prop_assert!((a.log_likelihood - b.log_likelihood).abs() < 1e-12);
    }

    #[test]
    fn grouping_never_changes_row_count((rows, labels) in clustered_rows(3, 8)) {
        let groups: Vec<Option<GroupId>> = labels
            .iter()
            .map(|l| Some(GroupId(format!("g{l}"))))
            .collect();
        let n = rows.len();
        let trainer = Trainer::new(EngineConfig::default()).unwrap();
        let outcome = trainer
            .train_blocking(
                TrainRequest {
                    rows,
                    groups: Some(groups),
                    n_states: Some(2),
                },
                None,
            )
            .unwrap();
        prop_assert_eq!(outcome.states.len(), n);
    }

    #[test]
    fn exported_params_are_valid_probabilities((rows, _) in clustered_rows(2, 12)) {
        let trainer = Trainer::new(EngineConfig::default()).unwrap();
        let outcome = trainer
            .train_blocking(
                TrainRequest {
                    rows,
                    groups: None,
                    n_states: Some(2),
                },
                None,
            )
            .unwrap();

        let params = outcome.params;
        for row in &params.transition {
            let sum: f64 = row.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-6, "transition row sums to {sum}");
            prop_assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
        let init_sum: f64 = params.initial.iter().sum();
        prop_assert!((init_sum - 1.0).abs() < 1e-6, "initial sums to {init_sum}");
        prop_assert!(params.variances.iter().flatten().all(|v| *v > 0.0));
    }
}
