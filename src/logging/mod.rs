//! Run loggers
//!
//! The trainer and the baseline entry point report through a [`Logger`];
//! persistence guarantees are the logger's concern, not the caller's.

mod terminal;

pub use terminal::{SilentLogger, TerminalLogger};

use std::path::Path;

use polars::prelude::DataFrame;

use crate::config::ConfigValue;
use crate::metrics::CalculatedMetric;

/// Sink for run output: messages, metrics, configs, and artifacts.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn good(&self, message: &str);
    fn warn(&self, message: &str);
    fn fail(&self, message: &str);

    fn log_metric(&self, metric: &CalculatedMetric);
    fn log_config(&self, cfg: &ConfigValue);
    fn log_artifact(&self, path: &Path);
    fn log_dataset(&self, df: &DataFrame, filename: &str);
}
