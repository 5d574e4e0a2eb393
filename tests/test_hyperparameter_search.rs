//! Suggester resolution, the config walker, and the optimization driver.

use std::fs;
use std::path::{Path, PathBuf};

use clinpred::baseline::train_baseline_model_from_cfg;
use clinpred::config::ConfigValue;
use clinpred::registry::populate_baseline_registry;
use clinpred::search::{
    contains_search_space, suggest_hyperparams_from_cfg, Direction, OptimizationDriver,
    StudyStore, Trial, TrialOutcome,
};
use clinpred::Result;
use serde_json::json;
use tempfile::TempDir;

fn search_cfg() -> ConfigValue {
    ConfigValue::from(json!({
        "estimator": {
            "@suggesters": "one_of",
            "choices": [
                {
                    "@suggesters": "logistic_regression",
                    "alpha": {
                        "@suggesters": "float",
                        "name": "alpha", "low": 1e-4, "high": 0.1, "logarithmic": true
                    }
                },
                {
                    "@suggesters": "gradient_boosting",
                    "n_estimators": {
                        "@suggesters": "int",
                        "name": "n_estimators", "low": 10, "high": 200
                    }
                }
            ]
        },
        "n_splits": 3
    }))
}

#[test]
fn test_suggester_resolution_then_walk_yields_a_concrete_tree() {
    let registry = populate_baseline_registry().unwrap();
    let resolved = registry.resolve_suggesters(&search_cfg()).unwrap();
    assert!(contains_search_space(&resolved));
    // The plain value next to the suggester is untouched.
    assert_eq!(resolved.retrieve("n_splits").unwrap().as_i64(), Some(3));

    let mut trial = Trial::new(0, 42);
    let walked = suggest_hyperparams_from_cfg(&resolved, &mut trial).unwrap();
    assert!(!contains_search_space(&walked));

    let chosen = walked
        .retrieve("estimator.@estimator_steps")
        .unwrap()
        .as_str()
        .unwrap()
        .to_string();
    match chosen.as_str() {
        "logistic_regression" => {
            let alpha = walked.retrieve("estimator.alpha").unwrap().as_f64().unwrap();
            assert!((1e-4..=0.1).contains(&alpha));
        }
        "gradient_boosting" => {
            let n = walked
                .retrieve("estimator.n_estimators")
                .unwrap()
                .as_i64()
                .unwrap();
            assert!((10..=200).contains(&n));
        }
        other => panic!("unexpected estimator: {other}"),
    }
}

#[test]
fn test_walk_is_deterministic_per_trial_number() {
    let registry = populate_baseline_registry().unwrap();
    let resolved = registry.resolve_suggesters(&search_cfg()).unwrap();

    let mut first = Trial::new(7, 13);
    let mut second = Trial::new(7, 13);
    assert_eq!(
        suggest_hyperparams_from_cfg(&resolved, &mut first).unwrap(),
        suggest_hyperparams_from_cfg(&resolved, &mut second).unwrap()
    );
}

#[test]
fn test_repeated_suggesters_sample_independently() {
    let registry = populate_baseline_registry().unwrap();
    // Two structurally identical estimator suggesters in one tree.
    let cfg = ConfigValue::from(json!({
        "first": {
            "@suggesters": "logistic_regression",
            "alpha": {"@suggesters": "float", "name": "alpha", "low": 0.0, "high": 1.0}
        },
        "second": {
            "@suggesters": "logistic_regression",
            "alpha": {"@suggesters": "float", "name": "alpha", "low": 0.0, "high": 1.0}
        }
    }));
    let resolved = registry.resolve_suggesters(&cfg).unwrap();
    let mut trial = Trial::new(0, 42);
    suggest_hyperparams_from_cfg(&resolved, &mut trial).unwrap();
    // Distinct key prefixes mean two independent asks, not one memoized one.
    assert_eq!(trial.asked_keys().len(), 2);
    assert_ne!(trial.asked_keys()[0], trial.asked_keys()[1]);
}

fn write_csv(dir: &Path) -> PathBuf {
    let path = dir.join("dataset.csv");
    let mut rows = String::from("subject_id,pred_time_uuid,outcome,feature_a\n");
    for group in ["a", "b", "c", "d"] {
        rows.push_str(&format!("{group},{group}-1,1.0,1.0\n"));
        rows.push_str(&format!("{group},{group}-2,0.0,0.0\n"));
    }
    fs::write(&path, rows).unwrap();
    path
}

#[test]
fn test_driver_optimizes_a_baseline_config_end_to_end() {
    let registry = populate_baseline_registry().unwrap();
    let data_dir = TempDir::new().unwrap();
    let experiment_dir = TempDir::new().unwrap();
    let study_dir = TempDir::new().unwrap();
    let data_path = write_csv(data_dir.path());

    let base_cfg = ConfigValue::from(json!({
        "project_info": {
            "experiment_path": experiment_dir.path().join("search").to_string_lossy()
        },
        "logger": {"@loggers": "silent"},
        "trainer": {
            "@trainers": "crossval",
            "data_loader": {"@data_loaders": "csv", "path": data_path.to_string_lossy()},
            "outcome_col": "outcome",
            "n_splits": 4,
            "logger": {"@loggers": "silent"},
            "task_pipeline": {
                "@task_pipelines": "binary_classification",
                "estimator": {
                    "@suggesters": "logistic_regression",
                    "alpha": {
                        "@suggesters": "float",
                        "name": "alpha", "low": 1e-4, "high": 0.1, "logarithmic": true
                    }
                }
            }
        }
    }));

    let store =
        StudyStore::open_or_create(study_dir.path(), "baseline-search", Direction::Maximize, 42)
            .unwrap();
    let objective = |cfg: &ConfigValue| -> Result<f64> {
        train_baseline_model_from_cfg(cfg, &registry).map(|r| r.metric.value)
    };
    let study = OptimizationDriver::new(&registry, base_cfg, &store)
        .with_n_trials(5)
        .with_n_workers(2)
        .run(&objective)
        .unwrap();

    assert_eq!(study.records.len(), 5);
    let best = study.best_trial().expect("at least one completed trial");
    match best.outcome {
        TrialOutcome::Completed(auroc) => assert_eq!(auroc, 1.0),
        _ => panic!("best trial must be completed"),
    }
    // Sampled parameters are recorded under the suggester's unique key.
    assert!(best.params.keys().any(|k| k.ends_with(".alpha")));
}
