//! Artifact persistence
//!
//! After a training run, artifact savers turn the in-memory result into
//! files under the experiment directory. Savers return the paths they wrote
//! so the caller can log them.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::Result;
use crate::training::TrainingResult;

/// Persists some view of a training result.
pub trait ArtifactSaver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write artifacts under `experiment_path`, returning the written paths.
    fn save_artifact(
        &self,
        result: &TrainingResult,
        experiment_path: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// Writes the evaluation dataset as CSV and the aggregate metric as JSON.
#[derive(Debug, Clone, Default)]
pub struct DiskArtifactSaver;

impl DiskArtifactSaver {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactSaver for DiskArtifactSaver {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn save_artifact(
        &self,
        result: &TrainingResult,
        experiment_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(experiment_path)?;

        let eval_path = experiment_path.join("eval_dataset.csv");
        let mut df = result.eval_dataset.clone();
        let file = fs::File::create(&eval_path)?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)?;

        let metric_path = experiment_path.join("metric.json");
        fs::write(&metric_path, serde_json::to_string_pretty(&result.metric)?)?;

        Ok(vec![eval_path, metric_path])
    }
}
