//! clinpred: experiment configuration and training orchestration for
//! clinical prediction models.
//!
//! The crate is organized around a config tree ([`config::ConfigValue`])
//! whose factory-reference nodes a [`registry::Registry`] resolves into
//! built components. A baseline experiment ([`baseline`]) fills, validates,
//! and resolves one such tree, then trains. Hyperparameter search embeds
//! search nodes in the same trees: suggester references resolve first
//! ([`registry::Registry::resolve_suggesters`]), a [`search::Trial`]
//! replaces them with concrete values, and the
//! [`search::OptimizationDriver`] repeats that over a persisted study.
//!
//! # Modules
//!
//! - [`config`]: config value trees, dotted-path access, JSON persistence
//! - [`registry`]: component categories, factories, resolution and filling
//! - [`search`]: search spaces, trials, the config walker, the driver
//! - [`data`]: lazy table loaders
//! - [`preprocessing`]: lazy-frame preprocessing steps and pipelines
//! - [`training`]: estimators, task pipelines, trainers, cross-validation
//! - [`metrics`]: binary classification metrics
//! - [`logging`]: run loggers
//! - [`artifacts`]: artifact savers
//! - [`baseline`]: the baseline experiment entry point

pub mod artifacts;
pub mod baseline;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod preprocessing;
pub mod registry;
pub mod search;
pub mod training;

pub use baseline::{train_baseline_model_from_cfg, BaselineSchema, ProjectInfo};
pub use config::{ConfigMap, ConfigValue};
pub use error::{ClinpredError, Result};
pub use registry::{populate_baseline_registry, Category, Registry};
pub use search::{Direction, OptimizationDriver, SearchSpace, StudyStore, Trial};
pub use training::{Trainer, TrainingResult};
