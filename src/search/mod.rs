//! Hyperparameter search: spaces, trials, the config walker, and the
//! optimization driver.

pub mod driver;
pub mod space;
pub mod trial;
pub mod walker;

pub use driver::{
    Direction, OptimizationDriver, PruneClassifier, Study, StudyStore, TrialOutcome, TrialRecord,
};
pub use space::{CategoricalSpace, EstimatorSpace, FloatSpace, IntSpace, OneOfSpace, SearchSpace};
pub use trial::{ParamValue, Trial};
pub use walker::{contains_search_space, suggest_hyperparams_from_cfg};
