//! Optimization driver and study persistence
//!
//! A study is an append-only record of trials, persisted as JSON after every
//! trial so an interrupted run resumes where it stopped. The driver fans
//! trials out over worker threads; trial sampling depends only on the study
//! seed and trial number, so concurrency and restarts never change which
//! point a given trial number evaluates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigValue;
use crate::error::{ClinpredError, Result};
use crate::registry::Registry;
use crate::search::trial::{ParamValue, Trial};
use crate::search::walker::{contains_search_space, suggest_hyperparams_from_cfg};

/// Whether the study wants its metric minimized or maximized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Minimize,
    Maximize,
}

/// Terminal state of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TrialOutcome {
    Completed(f64),
    Pruned(String),
    Failed(String),
}

/// One finished trial as stored in the study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub number: usize,
    pub outcome: TrialOutcome,
    pub params: BTreeMap<String, ParamValue>,
}

/// Full study state: identity, direction, seed, and every finished trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    pub direction: Direction,
    pub seed: u64,
    pub records: Vec<TrialRecord>,
}

impl Study {
    /// The completed trial with the best value under the study direction.
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        let completed = self.records.iter().filter_map(|r| match r.outcome {
            TrialOutcome::Completed(v) => Some((r, v)),
            _ => None,
        });
        match self.direction {
            Direction::Minimize => completed
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)),
            Direction::Maximize => completed
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)),
        }
        .map(|(r, _)| r)
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|r| match r.outcome {
            TrialOutcome::Completed(v) => Some(v),
            _ => None,
        })
    }

    pub fn n_completed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, TrialOutcome::Completed(_)))
            .count()
    }
}

#[derive(Debug)]
struct StoreState {
    study: Study,
    in_flight: usize,
    next_number: usize,
}

/// File-backed study store. One JSON file per study; every recorded trial is
/// flushed before the claim budget frees up, so a crash loses at most the
/// trials that were still running.
#[derive(Debug)]
pub struct StudyStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

/// Persist a study without ever truncating the live file: a crash mid-write
/// leaves either the previous snapshot or the new one, never a torn JSON.
fn write_study(path: &Path, study: &Study) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(study)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl StudyStore {
    /// Open the study `name` under `dir`, creating it if absent. An existing
    /// study must agree on direction; its stored seed wins over `seed`.
    pub fn open_or_create(
        dir: impl AsRef<Path>,
        name: &str,
        direction: Direction,
        seed: u64,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.json"));

        let study = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let stored: Study = serde_json::from_str(&raw)?;
            if stored.direction != direction {
                return Err(ClinpredError::Study(format!(
                    "study '{name}' was created with direction {:?}, requested {:?}",
                    stored.direction, direction
                )));
            }
            stored
        } else {
            let fresh = Study {
                name: name.to_string(),
                direction,
                seed,
                records: Vec::new(),
            };
            write_study(&path, &fresh)?;
            fresh
        };

        let next_number = study
            .records
            .iter()
            .map(|r| r.number + 1)
            .max()
            .unwrap_or(0);
        Ok(Self {
            path,
            state: Mutex::new(StoreState {
                study,
                in_flight: 0,
                next_number,
            }),
        })
    }

    pub fn seed(&self) -> u64 {
        self.state.lock().study.seed
    }

    pub fn direction(&self) -> Direction {
        self.state.lock().study.direction
    }

    /// Claim the next trial number, or `None` once finished and in-flight
    /// trials together exhaust the budget.
    pub fn claim(&self, budget: usize) -> Option<usize> {
        let mut state = self.state.lock();
        if state.study.records.len() + state.in_flight >= budget {
            return None;
        }
        state.in_flight += 1;
        let number = state.next_number;
        state.next_number += 1;
        Some(number)
    }

    /// Record a finished trial and persist the study.
    pub fn record(&self, record: TrialRecord) -> Result<()> {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.study.records.push(record);
        write_study(&self.path, &state.study)
    }

    pub fn snapshot(&self) -> Study {
        self.state.lock().study.clone()
    }
}

/// Decides whether a trial error means "bad hyperparameter point" (record as
/// pruned, keep going) rather than a genuine failure.
pub type PruneClassifier = Arc<dyn Fn(&ClinpredError) -> bool + Send + Sync>;

fn default_prune_classifier() -> PruneClassifier {
    Arc::new(|err| matches!(err, ClinpredError::InvalidInput(_)))
}

/// Runs a fixed budget of trials against an objective, in parallel.
pub struct OptimizationDriver<'a> {
    registry: &'a Registry,
    base_cfg: ConfigValue,
    store: &'a StudyStore,
    n_trials: usize,
    n_workers: usize,
    prune_classifier: PruneClassifier,
}

impl<'a> OptimizationDriver<'a> {
    pub fn new(registry: &'a Registry, base_cfg: ConfigValue, store: &'a StudyStore) -> Self {
        Self {
            registry,
            base_cfg,
            store,
            n_trials: 50,
            n_workers: 1,
            prune_classifier: default_prune_classifier(),
        }
    }

    /// Total trial budget, counting trials already in the study.
    pub fn with_n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers.max(1);
        self
    }

    pub fn with_prune_classifier(mut self, classifier: PruneClassifier) -> Self {
        self.prune_classifier = classifier;
        self
    }

    /// Run trials until the budget is spent, then return the final study.
    ///
    /// The objective receives a fully concrete config tree. Errors the prune
    /// classifier accepts are recorded as pruned; every other objective error
    /// is recorded as failed. Only store persistence errors abort the run.
    pub fn run(
        &self,
        objective: &(dyn Fn(&ConfigValue) -> Result<f64> + Send + Sync),
    ) -> Result<Study> {
        let resolved = self.registry.resolve_suggesters(&self.base_cfg)?;
        if !contains_search_space(&resolved) {
            return Err(ClinpredError::NoSuggester);
        }

        let seed = self.store.seed();
        let store_errors: Mutex<Vec<ClinpredError>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..self.n_workers {
                let resolved = &resolved;
                let store_errors = &store_errors;
                scope.spawn(move || {
                    while let Some(number) = self.store.claim(self.n_trials) {
                        let mut trial = Trial::new(number, seed);
                        let outcome =
                            match suggest_hyperparams_from_cfg(resolved, &mut trial)
                                .and_then(|concrete| objective(&concrete))
                            {
                                Ok(value) => TrialOutcome::Completed(value),
                                Err(err) if (self.prune_classifier)(&err) => {
                                    TrialOutcome::Pruned(err.to_string())
                                }
                                Err(err) => TrialOutcome::Failed(err.to_string()),
                            };
                        let record = TrialRecord {
                            number,
                            outcome,
                            params: trial.params().clone(),
                        };
                        if let Err(err) = self.store.record(record) {
                            store_errors.lock().push(err);
                            return;
                        }
                    }
                });
            }
        });

        if let Some(err) = store_errors.into_inner().into_iter().next() {
            return Err(err);
        }
        Ok(self.store.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::populate_baseline_registry;
    use crate::search::space::SearchSpace;
    use tempfile::TempDir;

    fn quadratic_cfg() -> ConfigValue {
        ConfigValue::from_pairs(vec![(
            "alpha",
            ConfigValue::Search(SearchSpace::float("alpha", 0.0, 1.0).unwrap()),
        )])
    }

    fn quadratic(cfg: &ConfigValue) -> Result<f64> {
        let alpha = cfg
            .retrieve("alpha")?
            .as_f64()
            .ok_or_else(|| ClinpredError::InvalidInput("alpha missing".to_string()))?;
        Ok((alpha - 0.3) * (alpha - 0.3))
    }

    #[test]
    fn test_driver_spends_exactly_the_budget() {
        let registry = populate_baseline_registry().unwrap();
        let dir = TempDir::new().unwrap();
        let store =
            StudyStore::open_or_create(dir.path(), "quadratic", Direction::Minimize, 42).unwrap();
        let driver = OptimizationDriver::new(&registry, quadratic_cfg(), &store)
            .with_n_trials(20)
            .with_n_workers(4);
        let study = driver.run(&quadratic).unwrap();
        assert_eq!(study.records.len(), 20);
        assert_eq!(study.n_completed(), 20);

        let best = study.best_trial().unwrap();
        match best.outcome {
            TrialOutcome::Completed(v) => assert!(v < 0.1),
            _ => panic!("best trial must be completed"),
        }
    }

    #[test]
    fn test_trial_numbers_are_unique() {
        let registry = populate_baseline_registry().unwrap();
        let dir = TempDir::new().unwrap();
        let store =
            StudyStore::open_or_create(dir.path(), "unique", Direction::Minimize, 1).unwrap();
        let driver = OptimizationDriver::new(&registry, quadratic_cfg(), &store)
            .with_n_trials(10)
            .with_n_workers(3);
        let study = driver.run(&quadratic).unwrap();
        let mut numbers: Vec<usize> = study.records.iter().map(|r| r.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_resumed_study_keeps_old_records_and_seed() {
        let registry = populate_baseline_registry().unwrap();
        let dir = TempDir::new().unwrap();
        {
            let store =
                StudyStore::open_or_create(dir.path(), "resume", Direction::Minimize, 42).unwrap();
            OptimizationDriver::new(&registry, quadratic_cfg(), &store)
                .with_n_trials(5)
                .run(&quadratic)
                .unwrap();
        }
        // Re-open with a different requested seed; the stored one wins.
        let store =
            StudyStore::open_or_create(dir.path(), "resume", Direction::Minimize, 99).unwrap();
        assert_eq!(store.seed(), 42);
        let study = OptimizationDriver::new(&registry, quadratic_cfg(), &store)
            .with_n_trials(12)
            .run(&quadratic)
            .unwrap();
        assert_eq!(study.records.len(), 12);
        let mut numbers: Vec<usize> = study.records.iter().map(|r| r.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_record_replaces_study_file_without_leftover_temp() {
        let dir = TempDir::new().unwrap();
        let store =
            StudyStore::open_or_create(dir.path(), "atomic", Direction::Minimize, 42).unwrap();
        // A stale temp file from an interrupted earlier run must not break
        // the next persist; it is simply replaced and renamed away.
        let tmp = dir.path().join("atomic.json.tmp");
        std::fs::write(&tmp, "{ torn").unwrap();

        store
            .record(TrialRecord {
                number: 0,
                outcome: TrialOutcome::Completed(0.25),
                params: Default::default(),
            })
            .unwrap();

        assert!(!tmp.exists());
        let raw = std::fs::read_to_string(dir.path().join("atomic.json")).unwrap();
        let stored: Study = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.records.len(), 1);
    }

    #[test]
    fn test_direction_mismatch_is_an_error() {
        let dir = TempDir::new().unwrap();
        StudyStore::open_or_create(dir.path(), "dir", Direction::Minimize, 42).unwrap();
        let err =
            StudyStore::open_or_create(dir.path(), "dir", Direction::Maximize, 42).unwrap_err();
        assert!(matches!(err, ClinpredError::Study(_)));
    }

    #[test]
    fn test_config_without_search_nodes_is_rejected() {
        let registry = populate_baseline_registry().unwrap();
        let dir = TempDir::new().unwrap();
        let store =
            StudyStore::open_or_create(dir.path(), "static", Direction::Minimize, 42).unwrap();
        let cfg = ConfigValue::from_pairs(vec![("alpha", ConfigValue::Float(0.5))]);
        let err = OptimizationDriver::new(&registry, cfg, &store)
            .run(&quadratic)
            .unwrap_err();
        assert!(matches!(err, ClinpredError::NoSuggester));
    }

    #[test]
    fn test_invalid_input_errors_are_pruned_not_failed() {
        let registry = populate_baseline_registry().unwrap();
        let dir = TempDir::new().unwrap();
        let store =
            StudyStore::open_or_create(dir.path(), "pruned", Direction::Minimize, 42).unwrap();
        let objective = |cfg: &ConfigValue| -> Result<f64> {
            let alpha = cfg.retrieve("alpha")?.as_f64().unwrap();
            if alpha > 0.5 {
                Err(ClinpredError::InvalidInput(
                    "degenerate sample".to_string(),
                ))
            } else {
                Ok(alpha)
            }
        };
        let study = OptimizationDriver::new(&registry, quadratic_cfg(), &store)
            .with_n_trials(30)
            .run(&objective)
            .unwrap();
        assert!(study
            .records
            .iter()
            .any(|r| matches!(r.outcome, TrialOutcome::Pruned(_))));
        assert!(!study
            .records
            .iter()
            .any(|r| matches!(r.outcome, TrialOutcome::Failed(_))));
    }
}
