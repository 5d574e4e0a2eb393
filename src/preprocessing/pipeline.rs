//! Preprocessing pipeline
//!
//! An ordered sequence of pure lazy-table transforms applied between loading
//! and training. Steps validate their required columns against the lazy
//! schema up front, so a misconfigured pipeline fails naming the step and
//! the column instead of deep inside a query plan.

use std::sync::Arc;

use polars::prelude::*;

use crate::error::{ClinpredError, Result};

/// A single transform step. Pure: lazy table in, lazy table out, order
/// sensitive.
pub trait PreprocessingStep: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame>;
}

/// Resolve the lazy schema without materializing any data.
pub(crate) fn schema_of(lf: &LazyFrame, step: &str) -> Result<SchemaRef> {
    lf.clone().collect_schema().map_err(|e| {
        ClinpredError::Data(format!("step '{step}': cannot resolve input schema: {e}"))
    })
}

/// Error for a column a step requires but the incoming schema lacks.
pub(crate) fn missing_column(step: &str, column: &str) -> ClinpredError {
    ClinpredError::Data(format!("step '{step}': column '{column}' not found"))
}

/// Ordered composition of preprocessing steps.
#[derive(Clone, Default)]
pub struct PreprocessingPipeline {
    steps: Vec<Arc<dyn PreprocessingStep>>,
}

impl PreprocessingPipeline {
    pub fn new(steps: Vec<Arc<dyn PreprocessingStep>>) -> Self {
        Self { steps }
    }

    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Apply every step in order. The result stays lazy; the trainer decides
    /// when to materialize.
    pub fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let mut lf = lf;
        for step in &self.steps {
            lf = step.apply(lf)?;
        }
        Ok(lf)
    }
}
