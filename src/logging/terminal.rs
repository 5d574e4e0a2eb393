//! Terminal and no-op loggers

use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{error, info, warn};

use crate::config::ConfigValue;
use crate::logging::Logger;
use crate::metrics::CalculatedMetric;

/// Logger that emits through `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TerminalLogger;

impl TerminalLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TerminalLogger {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn good(&self, message: &str) {
        info!("✓ {message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn fail(&self, message: &str) {
        error!("{message}");
    }

    fn log_metric(&self, metric: &CalculatedMetric) {
        info!(metric = %metric.name, value = metric.value, "metric");
    }

    fn log_config(&self, cfg: &ConfigValue) {
        info!(config = %cfg, "config");
    }

    fn log_artifact(&self, path: &Path) {
        info!(artifact = %path.display(), "artifact saved");
    }

    fn log_dataset(&self, df: &DataFrame, filename: &str) {
        info!(
            filename,
            rows = df.height(),
            columns = df.width(),
            "dataset"
        );
    }
}

/// Logger that discards everything. Used by optimization workers where
/// per-trial terminal output would interleave across threads.
#[derive(Debug, Clone, Default)]
pub struct SilentLogger;

impl SilentLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for SilentLogger {
    fn info(&self, _message: &str) {}
    fn good(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn fail(&self, _message: &str) {}
    fn log_metric(&self, _metric: &CalculatedMetric) {}
    fn log_config(&self, _cfg: &ConfigValue) {}
    fn log_artifact(&self, _path: &Path) {}
    fn log_dataset(&self, _df: &DataFrame, _filename: &str) {}
}
