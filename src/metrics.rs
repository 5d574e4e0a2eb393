//! Evaluation metrics for binary classification

use serde::{Deserialize, Serialize};

use crate::error::{ClinpredError, Result};

/// A named scalar metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedMetric {
    pub name: String,
    pub value: f64,
}

/// Metric over true labels and predicted probabilities.
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Compute the metric. `name_prefix` distinguishes within-fold,
    /// out-of-fold, and validation computations of the same metric.
    fn calculate(
        &self,
        y_true: &[f64],
        y_pred_prob: &[f64],
        name_prefix: &str,
    ) -> Result<CalculatedMetric>;
}

fn check_inputs(y_true: &[f64], y_pred_prob: &[f64]) -> Result<()> {
    if y_true.is_empty() {
        return Err(ClinpredError::InvalidInput(
            "metric computed over zero rows".to_string(),
        ));
    }
    if y_true.len() != y_pred_prob.len() {
        return Err(ClinpredError::InvalidInput(format!(
            "label/probability length mismatch: {} vs {}",
            y_true.len(),
            y_pred_prob.len()
        )));
    }
    if y_pred_prob.iter().any(|p| !p.is_finite()) {
        return Err(ClinpredError::InvalidInput(
            "non-finite predicted probability".to_string(),
        ));
    }
    Ok(())
}

/// Area under the ROC curve, computed from the Mann-Whitney U statistic with
/// average ranks for tied probabilities.
///
/// A single-class label vector makes AUROC undefined; that is reported as an
/// invalid-input error, which the optimization driver classifies as prunable.
#[derive(Debug, Clone, Default)]
pub struct BinaryAuroc;

impl Metric for BinaryAuroc {
    fn name(&self) -> &'static str {
        "binary_auroc"
    }

    fn calculate(
        &self,
        y_true: &[f64],
        y_pred_prob: &[f64],
        name_prefix: &str,
    ) -> Result<CalculatedMetric> {
        check_inputs(y_true, y_pred_prob)?;

        let n = y_true.len();
        let n_pos = y_true.iter().filter(|&&y| y >= 0.5).count();
        let n_neg = n - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(ClinpredError::InvalidInput(
                "AUROC undefined: only a single outcome class present".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            y_pred_prob[a]
                .partial_cmp(&y_pred_prob[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Average ranks over tie runs.
        let mut ranks = vec![0.0f64; n];
        let mut i = 0;
        while i < n {
            let mut j = i;
            while j + 1 < n && y_pred_prob[order[j + 1]] == y_pred_prob[order[i]] {
                j += 1;
            }
            let avg_rank = ((i + 1 + j + 1) as f64) / 2.0;
            for &idx in &order[i..=j] {
                ranks[idx] = avg_rank;
            }
            i = j + 1;
        }

        let pos_rank_sum: f64 = (0..n).filter(|&i| y_true[i] >= 0.5).map(|i| ranks[i]).sum();
        let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
        let auroc = u / (n_pos as f64 * n_neg as f64);

        Ok(CalculatedMetric {
            name: format!("{name_prefix}_{}", self.name()),
            value: auroc,
        })
    }
}

/// Classification accuracy at a 0.5 probability threshold.
#[derive(Debug, Clone, Default)]
pub struct BinaryAccuracy;

impl Metric for BinaryAccuracy {
    fn name(&self) -> &'static str {
        "binary_accuracy"
    }

    fn calculate(
        &self,
        y_true: &[f64],
        y_pred_prob: &[f64],
        name_prefix: &str,
    ) -> Result<CalculatedMetric> {
        check_inputs(y_true, y_pred_prob)?;
        let correct = y_true
            .iter()
            .zip(y_pred_prob.iter())
            .filter(|(&y, &p)| (p >= 0.5) == (y >= 0.5))
            .count();
        Ok(CalculatedMetric {
            name: format!("{name_prefix}_{}", self.name()),
            value: correct as f64 / y_true.len() as f64,
        })
    }
}
