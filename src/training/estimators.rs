//! Built-in estimator steps

use ndarray::{Array1, Array2};

use crate::error::{ClinpredError, Result};

/// A fittable binary-probability estimator. `fit` reinitializes all learned
/// state, so one instance can be refit per fold.
pub trait EstimatorStep: Send {
    fn name(&self) -> &'static str;
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ClinpredError::InvalidInput(format!(
            "feature matrix has {} rows but label vector has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(ClinpredError::InvalidInput(
            "cannot fit on an empty partition".to_string(),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ClinpredError::InvalidInput(
            "non-finite value in feature matrix".to_string(),
        ));
    }
    Ok(())
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// L2-regularized logistic regression fit by gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            coefficients: None,
            intercept: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }
}

impl EstimatorStep for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let mut weights = Array1::zeros(n_features);
        let mut bias = 0.0;
        let lr = self.learning_rate;
        let alpha = self.alpha;

        for _iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| ClinpredError::Training("estimator not fitted".to_string()))?;
        let intercept = self.intercept.unwrap_or(0.0);
        let linear = x.dot(coefficients) + intercept;
        Ok(sigmoid(&linear))
    }
}

/// One axis-aligned split with left/right leaf weights.
#[derive(Debug, Clone)]
struct Stump {
    feature: usize,
    threshold: f64,
    left_weight: f64,
    right_weight: f64,
}

impl Stump {
    fn predict(&self, row: ndarray::ArrayView1<'_, f64>) -> f64 {
        if row[self.feature] <= self.threshold {
            self.left_weight
        } else {
            self.right_weight
        }
    }
}

/// Gradient boosting over decision stumps on the log-odds, with
/// second-order leaf weights `-G / (H + lambda)` and gain-scored exact
/// greedy split finding. Deterministic: no row or column subsampling.
#[derive(Debug, Clone)]
pub struct GradientBoostingClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    base_score: f64,
    stumps: Vec<Stump>,
    fitted: bool,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GradientBoostingClassifier {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            reg_lambda: 1.0,
            base_score: 0.0,
            stumps: Vec::new(),
            fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_reg_lambda(mut self, lambda: f64) -> Self {
        self.reg_lambda = lambda;
        self
    }

    /// Exact greedy split search over all features and midpoints,
    /// maximizing GL^2/(HL+lambda) + GR^2/(HR+lambda) - G^2/(H+lambda).
    fn best_stump(&self, x: &Array2<f64>, grad: &Array1<f64>, hess: &Array1<f64>) -> Option<Stump> {
        let n = x.nrows();
        let lambda = self.reg_lambda;
        let g_total: f64 = grad.sum();
        let h_total: f64 = hess.sum();
        let parent_score = g_total * g_total / (h_total + lambda);

        let mut best: Option<(f64, Stump)> = None;
        for feature in 0..x.ncols() {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                x[[a, feature]]
                    .partial_cmp(&x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for window in 0..n.saturating_sub(1) {
                let idx = order[window];
                g_left += grad[idx];
                h_left += hess[idx];

                let here = x[[idx, feature]];
                let next = x[[order[window + 1], feature]];
                if here == next {
                    continue;
                }
                let threshold = (here + next) / 2.0;

                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                let gain = g_left * g_left / (h_left + lambda)
                    + g_right * g_right / (h_right + lambda)
                    - parent_score;

                if gain > best.as_ref().map_or(1e-12, |(g, _)| *g) {
                    best = Some((
                        gain,
                        Stump {
                            feature,
                            threshold,
                            left_weight: -g_left / (h_left + lambda),
                            right_weight: -g_right / (h_right + lambda),
                        },
                    ));
                }
            }
        }
        best.map(|(_, stump)| stump)
    }
}

impl EstimatorStep for GradientBoostingClassifier {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.stumps.clear();

        let mean = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (mean / (1.0 - mean)).ln();

        let mut scores = Array1::from_elem(y.len(), self.base_score);
        for _round in 0..self.n_estimators {
            let probs = sigmoid(&scores);
            let grad = &probs - y;
            let hess = probs.mapv(|p| (p * (1.0 - p)).max(1e-12));

            let stump = match self.best_stump(x, &grad, &hess) {
                Some(stump) => stump,
                None => break, // no split with positive gain left
            };
            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.learning_rate * stump.predict(x.row(i));
            }
            self.stumps.push(stump);
        }

        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(ClinpredError::Training("estimator not fitted".to_string()));
        }
        let mut scores = Array1::from_elem(x.nrows(), self.base_score);
        for stump in &self.stumps {
            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.learning_rate * stump.predict(x.row(i));
            }
        }
        Ok(sigmoid(&scores))
    }
}
