//! Task pipelines

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::training::estimators::EstimatorStep;

/// The model side of a training run: fit on a feature matrix, emit
/// predicted probabilities.
pub trait TaskPipeline: Send {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Binary classification over a single estimator step.
pub struct BinaryClassificationPipeline {
    estimator: Box<dyn EstimatorStep>,
}

impl BinaryClassificationPipeline {
    pub fn new(estimator: Box<dyn EstimatorStep>) -> Self {
        Self { estimator }
    }

    pub fn estimator_name(&self) -> &'static str {
        self.estimator.name()
    }
}

impl TaskPipeline for BinaryClassificationPipeline {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.estimator.fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict_proba(x)
    }
}
