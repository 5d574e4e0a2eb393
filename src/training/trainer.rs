//! Trainers
//!
//! A trainer owns one full model-fitting procedure: materialize the
//! preprocessed table, fit the task pipeline on one or more train
//! partitions, and score held-out rows. Both trainers emit an evaluation
//! dataset with one probability per input row plus an aggregate metric.

use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;

use crate::data::DataLoader;
use crate::error::{ClinpredError, Result};
use crate::logging::Logger;
use crate::metrics::{CalculatedMetric, Metric};
use crate::preprocessing::PreprocessingPipeline;
use crate::training::cross_validation::GroupedStratifiedKFold;
use crate::training::task::TaskPipeline;

/// Predicted-probability column of the evaluation dataset.
pub const Y_HAT_PROB_COL: &str = "y_hat_prob";
/// Marks rows whose prediction came from a model that did not train on them.
pub const OOF_COL: &str = "oof";

/// Output of a training run.
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub metric: CalculatedMetric,
    pub eval_dataset: DataFrame,
}

/// A complete fitting procedure over a configured data source.
pub trait Trainer: Send {
    fn train(&mut self) -> Result<TrainingResult>;
}

fn collect_frame(loader: &dyn DataLoader, pipeline: &PreprocessingPipeline) -> Result<DataFrame> {
    let lf = pipeline.apply(loader.load()?)?;
    let df = lf.collect()?;
    if df.height() == 0 {
        return Err(ClinpredError::Data(
            "preprocessed dataset has zero rows".to_string(),
        ));
    }
    Ok(df)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let col = df
        .column(name)
        .map_err(|_| ClinpredError::Data(format!("missing column '{name}'")))?
        .cast(&DataType::String)?;
    let ca = col.str()?;
    let mut out = Vec::with_capacity(df.height());
    for (i, v) in ca.into_iter().enumerate() {
        match v {
            Some(s) => out.push(s.to_string()),
            None => {
                return Err(ClinpredError::Data(format!(
                    "null in column '{name}' at row {i}"
                )))
            }
        }
    }
    Ok(out)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = df
        .column(name)
        .map_err(|_| ClinpredError::Data(format!("missing column '{name}'")))?
        .cast(&DataType::Float64)
        .map_err(|_| ClinpredError::Data(format!("column '{name}' is not numeric")))?;
    let ca = col.f64()?;
    let mut out = Vec::with_capacity(df.height());
    for (i, v) in ca.into_iter().enumerate() {
        match v {
            Some(x) => out.push(x),
            None => {
                return Err(ClinpredError::Data(format!(
                    "null in column '{name}' at row {i}"
                )))
            }
        }
    }
    Ok(out)
}

/// All columns not named in `exclude`, as an f64 matrix in frame order.
fn feature_matrix(df: &DataFrame, exclude: &[&str]) -> Result<Array2<f64>> {
    let feature_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .filter(|n| !exclude.contains(&n.as_str()))
        .collect();
    if feature_names.is_empty() {
        return Err(ClinpredError::Data(
            "no feature columns left after excluding identifier and outcome columns".to_string(),
        ));
    }
    let mut columns = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        columns.push(float_column(df, name)?);
    }
    let n_rows = df.height();
    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| {
        columns[c][r]
    }))
}

fn select_rows(values: &[f64], indices: &[usize]) -> Array1<f64> {
    Array1::from_iter(indices.iter().map(|&i| values[i]))
}

fn build_eval_dataset(
    uuid_col: &str,
    group_col: &str,
    outcome_col: &str,
    uuids: Vec<String>,
    groups: Vec<String>,
    y: Vec<f64>,
    y_hat: Vec<f64>,
    oof: Vec<bool>,
) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(uuid_col.into(), uuids),
        Column::new(group_col.into(), groups),
        Column::new(outcome_col.into(), y),
        Column::new(Y_HAT_PROB_COL.into(), y_hat),
        Column::new(OOF_COL.into(), oof),
    ])?;
    Ok(df)
}

/// Grouped stratified cross-validation trainer.
///
/// Every row is scored exactly once, by the fold model that held it out.
/// The reported metric is computed over the full out-of-fold prediction
/// vector and carries the `oof` prefix.
pub struct CrossValTrainer {
    data_loader: Arc<dyn DataLoader>,
    preprocessing: PreprocessingPipeline,
    task: Box<dyn TaskPipeline>,
    metric: Arc<dyn Metric>,
    logger: Arc<dyn Logger>,
    outcome_col: String,
    group_col: String,
    uuid_col: String,
    n_splits: usize,
    seed: u64,
}

impl CrossValTrainer {
    pub fn new(
        data_loader: Arc<dyn DataLoader>,
        preprocessing: PreprocessingPipeline,
        task: Box<dyn TaskPipeline>,
        metric: Arc<dyn Metric>,
        logger: Arc<dyn Logger>,
        outcome_col: impl Into<String>,
    ) -> Self {
        Self {
            data_loader,
            preprocessing,
            task,
            metric,
            logger,
            outcome_col: outcome_col.into(),
            group_col: "subject_id".to_string(),
            uuid_col: "pred_time_uuid".to_string(),
            n_splits: 5,
            seed: 42,
        }
    }

    pub fn with_group_col(mut self, group_col: impl Into<String>) -> Self {
        self.group_col = group_col.into();
        self
    }

    pub fn with_uuid_col(mut self, uuid_col: impl Into<String>) -> Self {
        self.uuid_col = uuid_col.into();
        self
    }

    pub fn with_n_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Trainer for CrossValTrainer {
    fn train(&mut self) -> Result<TrainingResult> {
        let df = collect_frame(self.data_loader.as_ref(), &self.preprocessing)?;
        let groups = string_column(&df, &self.group_col)?;
        let uuids = string_column(&df, &self.uuid_col)?;
        let y = float_column(&df, &self.outcome_col)?;
        let x = feature_matrix(
            &df,
            &[
                self.group_col.as_str(),
                self.uuid_col.as_str(),
                self.outcome_col.as_str(),
            ],
        )?;

        self.logger.info(&format!(
            "cross-validation over {} rows, {} folds",
            df.height(),
            self.n_splits
        ));

        let splits = GroupedStratifiedKFold::new(self.n_splits)?
            .with_seed(self.seed)
            .split(&groups, &y)?;

        let mut oof_prob: Vec<Option<f64>> = vec![None; df.height()];
        for split in &splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = select_rows(&y, &split.train_indices);
            let x_val = x.select(Axis(0), &split.validation_indices);

            self.task.fit(&x_train, &y_train)?;
            let val_prob = self.task.predict_proba(&x_val)?;

            for (&row, &prob) in split.validation_indices.iter().zip(val_prob.iter()) {
                if oof_prob[row].is_some() {
                    return Err(ClinpredError::Training(format!(
                        "out-of-fold prediction for row {row} written twice"
                    )));
                }
                oof_prob[row] = Some(prob);
            }

            // Diagnostic metric on the rows the fold was fitted on.
            let train_prob = self.task.predict_proba(&x_train)?;
            match self.metric.calculate(
                y_train.as_slice().unwrap_or(&[]),
                train_prob.as_slice().unwrap_or(&[]),
                "within_fold",
            ) {
                Ok(m) => self.logger.log_metric(&m),
                Err(e) => self.logger.warn(&format!(
                    "within-fold metric unavailable for fold {}: {e}",
                    split.fold_idx
                )),
            }

            let y_val = select_rows(&y, &split.validation_indices);
            match self.metric.calculate(
                y_val.as_slice().unwrap_or(&[]),
                val_prob.as_slice().unwrap_or(&[]),
                "out_of_fold",
            ) {
                Ok(m) => self.logger.log_metric(&m),
                Err(e) => self.logger.warn(&format!(
                    "out-of-fold metric unavailable for fold {}: {e}",
                    split.fold_idx
                )),
            }
        }

        let mut y_hat = Vec::with_capacity(oof_prob.len());
        for (row, prob) in oof_prob.into_iter().enumerate() {
            match prob {
                Some(p) => y_hat.push(p),
                None => {
                    return Err(ClinpredError::Training(format!(
                        "out-of-fold prediction missing for row {row}"
                    )))
                }
            }
        }

        let metric = self.metric.calculate(&y, &y_hat, "oof")?;
        self.logger.log_metric(&metric);

        let oof = vec![true; y.len()];
        let eval_dataset =
            build_eval_dataset(&self.uuid_col, &self.group_col, &self.outcome_col, uuids, groups, y, y_hat, oof)?;
        Ok(TrainingResult {
            metric,
            eval_dataset,
        })
    }
}

/// Trainer over a predefined split column.
///
/// Rows whose split value is in `train_splits` fit the model; rows in
/// `validation_splits` are scored held out and drive the reported metric.
/// Rows in neither set are dropped. The evaluation dataset keeps both
/// partitions, with the `oof` flag marking validation rows.
pub struct SplitTrainer {
    data_loader: Arc<dyn DataLoader>,
    preprocessing: PreprocessingPipeline,
    task: Box<dyn TaskPipeline>,
    metric: Arc<dyn Metric>,
    logger: Arc<dyn Logger>,
    outcome_col: String,
    group_col: String,
    uuid_col: String,
    split_col: String,
    train_splits: Vec<String>,
    validation_splits: Vec<String>,
}

impl SplitTrainer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data_loader: Arc<dyn DataLoader>,
        preprocessing: PreprocessingPipeline,
        task: Box<dyn TaskPipeline>,
        metric: Arc<dyn Metric>,
        logger: Arc<dyn Logger>,
        outcome_col: impl Into<String>,
        split_col: impl Into<String>,
        train_splits: Vec<String>,
        validation_splits: Vec<String>,
    ) -> Self {
        Self {
            data_loader,
            preprocessing,
            task,
            metric,
            logger,
            outcome_col: outcome_col.into(),
            group_col: "subject_id".to_string(),
            uuid_col: "pred_time_uuid".to_string(),
            split_col: split_col.into(),
            train_splits,
            validation_splits,
        }
    }

    pub fn with_group_col(mut self, group_col: impl Into<String>) -> Self {
        self.group_col = group_col.into();
        self
    }

    pub fn with_uuid_col(mut self, uuid_col: impl Into<String>) -> Self {
        self.uuid_col = uuid_col.into();
        self
    }
}

impl Trainer for SplitTrainer {
    fn train(&mut self) -> Result<TrainingResult> {
        if self
            .train_splits
            .iter()
            .any(|s| self.validation_splits.contains(s))
        {
            return Err(ClinpredError::InvalidInput(
                "train and validation split sets overlap".to_string(),
            ));
        }

        let df = collect_frame(self.data_loader.as_ref(), &self.preprocessing)?;
        let split_values = string_column(&df, &self.split_col)?;
        let groups = string_column(&df, &self.group_col)?;
        let uuids = string_column(&df, &self.uuid_col)?;
        let y = float_column(&df, &self.outcome_col)?;
        let x = feature_matrix(
            &df,
            &[
                self.group_col.as_str(),
                self.uuid_col.as_str(),
                self.outcome_col.as_str(),
                self.split_col.as_str(),
            ],
        )?;

        let mut train_indices = Vec::new();
        let mut validation_indices = Vec::new();
        for (i, split) in split_values.iter().enumerate() {
            if self.train_splits.contains(split) {
                train_indices.push(i);
            } else if self.validation_splits.contains(split) {
                validation_indices.push(i);
            }
        }
        if train_indices.is_empty() {
            return Err(ClinpredError::Data(format!(
                "no rows matched train splits {:?}",
                self.train_splits
            )));
        }
        if validation_indices.is_empty() {
            return Err(ClinpredError::Data(format!(
                "no rows matched validation splits {:?}",
                self.validation_splits
            )));
        }

        self.logger.info(&format!(
            "split training: {} train rows, {} validation rows",
            train_indices.len(),
            validation_indices.len()
        ));

        let x_train = x.select(Axis(0), &train_indices);
        let y_train = select_rows(&y, &train_indices);
        self.task.fit(&x_train, &y_train)?;

        let x_val = x.select(Axis(0), &validation_indices);
        let val_prob = self.task.predict_proba(&x_val)?;
        let y_val = select_rows(&y, &validation_indices);
        let metric = self.metric.calculate(
            y_val.as_slice().unwrap_or(&[]),
            val_prob.as_slice().unwrap_or(&[]),
            "validation",
        )?;
        self.logger.log_metric(&metric);

        let train_prob = self.task.predict_proba(&x_train)?;

        let mut kept: Vec<(usize, f64, bool)> = Vec::with_capacity(train_indices.len() + validation_indices.len());
        for (&row, &prob) in train_indices.iter().zip(train_prob.iter()) {
            kept.push((row, prob, false));
        }
        for (&row, &prob) in validation_indices.iter().zip(val_prob.iter()) {
            kept.push((row, prob, true));
        }
        kept.sort_by_key(|&(row, _, _)| row);

        let mut out_uuids = Vec::with_capacity(kept.len());
        let mut out_groups = Vec::with_capacity(kept.len());
        let mut out_y = Vec::with_capacity(kept.len());
        let mut out_prob = Vec::with_capacity(kept.len());
        let mut out_oof = Vec::with_capacity(kept.len());
        for (row, prob, oof) in kept {
            out_uuids.push(uuids[row].clone());
            out_groups.push(groups[row].clone());
            out_y.push(y[row]);
            out_prob.push(prob);
            out_oof.push(oof);
        }

        let eval_dataset = build_eval_dataset(
            &self.uuid_col,
            &self.group_col,
            &self.outcome_col,
            out_uuids,
            out_groups,
            out_y,
            out_prob,
            out_oof,
        )?;
        Ok(TrainingResult {
            metric,
            eval_dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataFrameLoader;
    use crate::logging::SilentLogger;
    use crate::metrics::BinaryAuroc;
    use crate::training::estimators::LogisticRegression;
    use crate::training::task::BinaryClassificationPipeline;

    fn separable_frame() -> DataFrame {
        df!(
            "subject_id" => &["a", "a", "b", "b", "c", "c"],
            "pred_time_uuid" => &["a-1", "a-2", "b-1", "b-2", "c-1", "c-2"],
            "outcome" => &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            "x" => &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        )
        .unwrap()
    }

    fn pipeline() -> Box<dyn TaskPipeline> {
        Box::new(BinaryClassificationPipeline::new(Box::new(
            LogisticRegression::new(),
        )))
    }

    #[derive(Default)]
    struct RecordingLogger {
        metrics: parking_lot::Mutex<Vec<CalculatedMetric>>,
    }

    impl Logger for RecordingLogger {
        fn info(&self, _message: &str) {}
        fn good(&self, _message: &str) {}
        fn warn(&self, _message: &str) {}
        fn fail(&self, _message: &str) {}
        fn log_metric(&self, metric: &CalculatedMetric) {
            self.metrics.lock().push(metric.clone());
        }
        fn log_config(&self, _cfg: &crate::config::ConfigValue) {}
        fn log_artifact(&self, _path: &std::path::Path) {}
        fn log_dataset(&self, _df: &DataFrame, _filename: &str) {}
    }

    #[test]
    fn test_crossval_separable_scores_perfectly() {
        let mut trainer = CrossValTrainer::new(
            Arc::new(DataFrameLoader::new(separable_frame())),
            PreprocessingPipeline::empty(),
            pipeline(),
            Arc::new(BinaryAuroc),
            Arc::new(SilentLogger),
            "outcome",
        )
        .with_n_splits(3);

        let result = trainer.train().unwrap();
        assert_eq!(result.metric.name, "oof_binary_auroc");
        assert_eq!(result.metric.value, 1.0);
        assert_eq!(result.eval_dataset.height(), 6);

        let oof = result.eval_dataset.column(OOF_COL).unwrap();
        assert_eq!(oof.bool().unwrap().into_iter().flatten().filter(|b| *b).count(), 6);
    }

    #[test]
    fn test_crossval_logs_train_and_validation_metrics_per_fold() {
        let logger = Arc::new(RecordingLogger::default());
        let mut trainer = CrossValTrainer::new(
            Arc::new(DataFrameLoader::new(separable_frame())),
            PreprocessingPipeline::empty(),
            pipeline(),
            Arc::new(BinaryAuroc),
            logger.clone(),
            "outcome",
        )
        .with_n_splits(3);
        trainer.train().unwrap();

        let logged = logger.metrics.lock();
        let within: Vec<&CalculatedMetric> = logged
            .iter()
            .filter(|m| m.name == "within_fold_binary_auroc")
            .collect();
        let per_fold_val = logged
            .iter()
            .filter(|m| m.name == "out_of_fold_binary_auroc")
            .count();
        assert_eq!(within.len(), 3);
        assert_eq!(per_fold_val, 3);
        // Each fold trains on linearly separable rows, so the
        // training-row diagnostic must be perfect too.
        assert!(within.iter().all(|m| m.value == 1.0));
        assert_eq!(
            logged.iter().filter(|m| m.name == "oof_binary_auroc").count(),
            1
        );
    }

    #[test]
    fn test_crossval_eval_dataset_columns() {
        let mut trainer = CrossValTrainer::new(
            Arc::new(DataFrameLoader::new(separable_frame())),
            PreprocessingPipeline::empty(),
            pipeline(),
            Arc::new(BinaryAuroc),
            Arc::new(SilentLogger),
            "outcome",
        )
        .with_n_splits(3);
        let result = trainer.train().unwrap();
        let names: Vec<String> = result
            .eval_dataset
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["pred_time_uuid", "subject_id", "outcome", "y_hat_prob", "oof"]
        );
    }

    #[test]
    fn test_split_trainer_marks_validation_rows() {
        let frame = df!(
            "subject_id" => &["a", "a", "b", "b", "c", "c", "d", "d"],
            "pred_time_uuid" => &["a-1", "a-2", "b-1", "b-2", "c-1", "c-2", "d-1", "d-2"],
            "split" => &["train", "train", "train", "train", "val", "val", "val", "val"],
            "outcome" => &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            "x" => &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        )
        .unwrap();

        let mut trainer = SplitTrainer::new(
            Arc::new(DataFrameLoader::new(frame)),
            PreprocessingPipeline::empty(),
            pipeline(),
            Arc::new(BinaryAuroc),
            Arc::new(SilentLogger),
            "outcome",
            "split",
            vec!["train".to_string()],
            vec!["val".to_string()],
        );

        let result = trainer.train().unwrap();
        assert_eq!(result.metric.name, "validation_binary_auroc");
        assert_eq!(result.metric.value, 1.0);
        assert_eq!(result.eval_dataset.height(), 8);

        let oof: Vec<bool> = result
            .eval_dataset
            .column(OOF_COL)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(oof.iter().filter(|b| **b).count(), 4);
    }

    #[test]
    fn test_split_trainer_rejects_overlapping_sets() {
        let mut trainer = SplitTrainer::new(
            Arc::new(DataFrameLoader::new(separable_frame())),
            PreprocessingPipeline::empty(),
            pipeline(),
            Arc::new(BinaryAuroc),
            Arc::new(SilentLogger),
            "outcome",
            "split",
            vec!["train".to_string()],
            vec!["train".to_string()],
        );
        assert!(matches!(
            trainer.train(),
            Err(ClinpredError::InvalidInput(_))
        ));
    }
}
