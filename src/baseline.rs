//! Baseline experiment entry point
//!
//! A baseline config is a top-level map with a `project_info` block, a
//! trainer reference, and optionally a logger and artifact savers. Resolving
//! it yields a [`BaselineSchema`]; running it trains the model, persists
//! artifacts under the experiment directory, and logs the filled config so
//! the run is reproducible from its own output.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::artifacts::ArtifactSaver;
use crate::config::ConfigValue;
use crate::error::{ClinpredError, Result};
use crate::logging::{Logger, TerminalLogger};
use crate::registry::registry::ResolvedArgs;
use crate::registry::{Registry, Resolved};
use crate::training::{Trainer, TrainingResult};

/// Where an experiment writes its output. The directory is created up front
/// so a long training run never fails at save time over a missing path.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub experiment_path: PathBuf,
}

impl ProjectInfo {
    pub fn new(experiment_path: impl Into<PathBuf>) -> Result<Self> {
        let experiment_path = experiment_path.into();
        fs::create_dir_all(&experiment_path)?;
        Ok(Self { experiment_path })
    }
}

/// A fully resolved baseline experiment.
pub struct BaselineSchema {
    pub project_info: ProjectInfo,
    pub logger: Arc<dyn Logger>,
    pub trainer: Box<dyn Trainer>,
    pub artifact_savers: Vec<Arc<dyn ArtifactSaver>>,
    /// The config with all defaults written in, as logged at run start.
    pub filled_cfg: ConfigValue,
}

impl std::fmt::Debug for BaselineSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineSchema")
            .field("project_info", &self.project_info)
            .field("filled_cfg", &self.filled_cfg)
            .finish_non_exhaustive()
    }
}

impl BaselineSchema {
    /// Fill, validate, and resolve a baseline config.
    pub fn from_cfg(cfg: &ConfigValue, registry: &Registry) -> Result<Self> {
        let filled = registry.fill(cfg, true)?;
        let resolved = registry.resolve(&filled)?;
        let map = match resolved {
            Resolved::Map(map) => map,
            _ => {
                return Err(ClinpredError::at(
                    "",
                    "a baseline config must be a map at the top level",
                ))
            }
        };
        let mut args = ResolvedArgs::new(String::new(), map);

        let project_value = args.take_value("project_info")?;
        let experiment_path = project_value
            .retrieve("experiment_path")
            .map_err(|_| ClinpredError::at("project_info.experiment_path", "missing"))?
            .as_str()
            .ok_or_else(|| {
                ClinpredError::at("project_info.experiment_path", "expected a string")
            })?
            .to_string();
        let project_info = ProjectInfo::new(experiment_path)?;

        let logger: Arc<dyn Logger> = if args.has("logger") {
            args.take_logger("logger")?
        } else {
            Arc::new(TerminalLogger::new())
        };
        let trainer = args.take_trainer("trainer")?;
        let artifact_savers = args.take_artifact_savers("artifact_savers")?;
        args.finish()?;

        Ok(Self {
            project_info,
            logger,
            trainer,
            artifact_savers,
            filled_cfg: filled,
        })
    }

    /// Train and persist artifacts.
    pub fn run(&mut self) -> Result<TrainingResult> {
        self.logger.log_config(&self.filled_cfg);
        let result = self.trainer.train()?;
        for saver in &self.artifact_savers {
            let written = saver.save_artifact(&result, &self.project_info.experiment_path)?;
            for path in &written {
                self.logger.log_artifact(path);
            }
        }
        self.logger.good("baseline training run finished");
        Ok(result)
    }
}

/// Resolve and run a baseline config in one call.
pub fn train_baseline_model_from_cfg(
    cfg: &ConfigValue,
    registry: &Registry,
) -> Result<TrainingResult> {
    BaselineSchema::from_cfg(cfg, registry)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{populate_baseline_registry, Category};
    use tempfile::TempDir;

    fn write_csv(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("dataset.csv");
        let mut rows = String::from("subject_id,pred_time_uuid,outcome,age,feature_a\n");
        for (i, group) in ["a", "b", "c"].iter().enumerate() {
            rows.push_str(&format!("{group},{group}-1,1.0,{},1.0\n", 40 + i));
            rows.push_str(&format!("{group},{group}-2,0.0,{},0.0\n", 50 + i));
        }
        fs::write(&path, rows).unwrap();
        path
    }

    fn baseline_cfg(data_path: &std::path::Path, experiment_path: &std::path::Path) -> ConfigValue {
        ConfigValue::from_pairs(vec![
            (
                "project_info".to_string(),
                ConfigValue::from_pairs(vec![(
                    "experiment_path",
                    ConfigValue::from(experiment_path.to_string_lossy().as_ref()),
                )]),
            ),
            (
                "logger".to_string(),
                ConfigValue::from_pairs(vec![(
                    Category::Loggers.sigil_key(),
                    ConfigValue::from("silent"),
                )]),
            ),
            (
                "trainer".to_string(),
                ConfigValue::from_pairs(vec![
                    (
                        Category::Trainers.sigil_key(),
                        ConfigValue::from("crossval"),
                    ),
                    (
                        "data_loader".to_string(),
                        ConfigValue::from_pairs(vec![
                            (
                                Category::DataLoaders.sigil_key(),
                                ConfigValue::from("csv"),
                            ),
                            (
                                "path".to_string(),
                                ConfigValue::from(data_path.to_string_lossy().as_ref()),
                            ),
                        ]),
                    ),
                    ("outcome_col".to_string(), ConfigValue::from("outcome")),
                    ("n_splits".to_string(), ConfigValue::Int(3)),
                    (
                        "logger".to_string(),
                        ConfigValue::from_pairs(vec![(
                            Category::Loggers.sigil_key(),
                            ConfigValue::from("silent"),
                        )]),
                    ),
                    (
                        "preprocessing_steps".to_string(),
                        ConfigValue::Seq(vec![ConfigValue::from_pairs(vec![
                            (
                                Category::PreprocessingSteps.sigil_key(),
                                ConfigValue::from("drop_columns"),
                            ),
                            (
                                "columns".to_string(),
                                ConfigValue::Seq(vec![ConfigValue::from("age")]),
                            ),
                        ])]),
                    ),
                    (
                        "task_pipeline".to_string(),
                        ConfigValue::from_pairs(vec![
                            (
                                Category::TaskPipelines.sigil_key(),
                                ConfigValue::from("binary_classification"),
                            ),
                            (
                                "estimator".to_string(),
                                ConfigValue::from_pairs(vec![(
                                    Category::EstimatorSteps.sigil_key(),
                                    ConfigValue::from("logistic_regression"),
                                )]),
                            ),
                        ]),
                    ),
                ]),
            ),
            (
                "artifact_savers".to_string(),
                ConfigValue::Seq(vec![ConfigValue::from_pairs(vec![(
                    Category::ArtifactSavers.sigil_key(),
                    ConfigValue::from("disk"),
                )])]),
            ),
        ])
    }

    #[test]
    fn test_baseline_trains_and_saves_artifacts() {
        let data_dir = TempDir::new().unwrap();
        let experiment_dir = TempDir::new().unwrap();
        let data_path = write_csv(data_dir.path());
        let experiment_path = experiment_dir.path().join("exp-1");
        let cfg = baseline_cfg(&data_path, &experiment_path);

        let registry = populate_baseline_registry().unwrap();
        let result = train_baseline_model_from_cfg(&cfg, &registry).unwrap();

        assert_eq!(result.metric.name, "oof_binary_auroc");
        assert_eq!(result.metric.value, 1.0);
        assert!(experiment_path.join("eval_dataset.csv").exists());
        assert!(experiment_path.join("metric.json").exists());
    }

    #[test]
    fn test_missing_trainer_is_a_validation_error() {
        let experiment_dir = TempDir::new().unwrap();
        let cfg = ConfigValue::from_pairs(vec![(
            "project_info",
            ConfigValue::from_pairs(vec![(
                "experiment_path",
                ConfigValue::from(experiment_dir.path().to_string_lossy().as_ref()),
            )]),
        )]);
        let registry = populate_baseline_registry().unwrap();
        assert!(matches!(
            BaselineSchema::from_cfg(&cfg, &registry).unwrap_err(),
            ClinpredError::ConfigValidation { .. }
        ));
    }
}
