//! Model training: estimators, task pipelines, and trainers.

pub mod cross_validation;
pub mod estimators;
pub mod task;
mod trainer;

pub use cross_validation::{CVSplit, GroupedStratifiedKFold};
pub use estimators::EstimatorStep;
pub use task::TaskPipeline;
pub use trainer::{
    CrossValTrainer, SplitTrainer, Trainer, TrainingResult, OOF_COL, Y_HAT_PROB_COL,
};
