//! Built-in component factories
//!
//! One factory per registered short name. Each factory declares its
//! argument manifest, so filling a config makes every default explicit and
//! resolution catches unknown or leftover arguments by dotted path.

use std::sync::Arc;

use crate::artifacts::DiskArtifactSaver;
use crate::config::ConfigValue;
use crate::data::{CsvLoader, ParquetLoader};
use crate::error::Result;
use crate::logging::{SilentLogger, TerminalLogger};
use crate::metrics::{BinaryAccuracy, BinaryAuroc};
use crate::preprocessing::steps::{AgeFilter, BoolToInt, DropColumns, SelectColumns, SplitFilter};
use crate::preprocessing::PreprocessingPipeline;
use crate::registry::registry::{Component, ComponentFactory, ParamSpec, Registry, ResolvedArgs};
use crate::registry::Category;
use crate::search::space::{
    CategoricalSpace, EstimatorSpace, FloatSpace, IntSpace, OneOfSpace, SearchSpace,
};
use crate::training::estimators::{GradientBoostingClassifier, LogisticRegression};
use crate::training::task::BinaryClassificationPipeline;
use crate::training::{CrossValTrainer, SplitTrainer};

struct TerminalLoggerFactory;

impl ComponentFactory for TerminalLoggerFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::Logger(Arc::new(TerminalLogger::new())))
    }
}

struct SilentLoggerFactory;

impl ComponentFactory for SilentLoggerFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::Logger(Arc::new(SilentLogger::new())))
    }
}

struct CsvLoaderFactory;

impl ComponentFactory for CsvLoaderFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let path = args.take_str("path")?;
        args.finish()?;
        Ok(Component::DataLoader(Arc::new(CsvLoader::new(path))))
    }
}

struct ParquetLoaderFactory;

impl ComponentFactory for ParquetLoaderFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let path = args.take_str("path")?;
        args.finish()?;
        Ok(Component::DataLoader(Arc::new(ParquetLoader::new(path))))
    }
}

struct SelectColumnsFactory;

impl ComponentFactory for SelectColumnsFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("columns")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let columns = args.take_string_seq("columns")?;
        args.finish()?;
        Ok(Component::PreprocessingStep(Arc::new(SelectColumns::new(
            columns,
        ))))
    }
}

struct DropColumnsFactory;

impl ComponentFactory for DropColumnsFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("columns")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let columns = args.take_string_seq("columns")?;
        args.finish()?;
        Ok(Component::PreprocessingStep(Arc::new(DropColumns::new(
            columns,
        ))))
    }
}

struct AgeFilterFactory;

impl ComponentFactory for AgeFilterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("age_col", "age"),
            ParamSpec::optional("min_age"),
            ParamSpec::optional("max_age"),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let age_col = args.take_str("age_col")?;
        let min_age = args.take_opt_f64("min_age")?;
        let max_age = args.take_opt_f64("max_age")?;
        args.finish()?;
        Ok(Component::PreprocessingStep(Arc::new(AgeFilter::new(
            age_col, min_age, max_age,
        ))))
    }
}

struct BoolToIntFactory;

impl ComponentFactory for BoolToIntFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::PreprocessingStep(Arc::new(BoolToInt::new())))
    }
}

struct SplitFilterFactory;

impl ComponentFactory for SplitFilterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("split_col", "split"),
            ParamSpec::required("splits_to_keep"),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let split_col = args.take_str("split_col")?;
        let splits_to_keep = args.take_string_seq("splits_to_keep")?;
        args.finish()?;
        Ok(Component::PreprocessingStep(Arc::new(SplitFilter::new(
            split_col,
            splits_to_keep,
        ))))
    }
}

struct BinaryClassificationFactory;

impl ComponentFactory for BinaryClassificationFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("estimator")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let estimator = args.take_estimator_step("estimator")?;
        args.finish()?;
        Ok(Component::TaskPipeline(Box::new(
            BinaryClassificationPipeline::new(estimator),
        )))
    }
}

struct LogisticRegressionFactory;

impl ComponentFactory for LogisticRegressionFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("alpha", 0.01),
            ParamSpec::with_default("max_iter", 1000i64),
            ParamSpec::with_default("learning_rate", 0.1),
            ParamSpec::with_default("tol", 1e-6),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let model = LogisticRegression::new()
            .with_alpha(args.take_f64("alpha")?)
            .with_max_iter(args.take_usize("max_iter")?)
            .with_learning_rate(args.take_f64("learning_rate")?)
            .with_tol(args.take_f64("tol")?);
        args.finish()?;
        Ok(Component::EstimatorStep(Box::new(model)))
    }
}

struct GradientBoostingFactory;

impl ComponentFactory for GradientBoostingFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("n_estimators", 100i64),
            ParamSpec::with_default("learning_rate", 0.1),
            ParamSpec::with_default("reg_lambda", 1.0),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let model = GradientBoostingClassifier::new()
            .with_n_estimators(args.take_usize("n_estimators")?)
            .with_learning_rate(args.take_f64("learning_rate")?)
            .with_reg_lambda(args.take_f64("reg_lambda")?);
        args.finish()?;
        Ok(Component::EstimatorStep(Box::new(model)))
    }
}

struct BinaryAurocFactory;

impl ComponentFactory for BinaryAurocFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::Metric(Arc::new(BinaryAuroc)))
    }
}

struct BinaryAccuracyFactory;

impl ComponentFactory for BinaryAccuracyFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::Metric(Arc::new(BinaryAccuracy)))
    }
}

fn terminal_logger_ref() -> ConfigValue {
    ConfigValue::from_pairs(vec![(
        Category::Loggers.sigil_key(),
        ConfigValue::from("terminal"),
    )])
}

fn binary_auroc_ref() -> ConfigValue {
    ConfigValue::from_pairs(vec![(
        Category::Metrics.sigil_key(),
        ConfigValue::from("binary_auroc"),
    )])
}

struct CrossValTrainerFactory;

impl ComponentFactory for CrossValTrainerFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("data_loader"),
            ParamSpec::required("outcome_col"),
            ParamSpec::required("task_pipeline"),
            ParamSpec::optional("preprocessing_steps"),
            ParamSpec::with_default("metric", binary_auroc_ref()),
            ParamSpec::with_default("logger", terminal_logger_ref()),
            ParamSpec::with_default("group_col", "subject_id"),
            ParamSpec::with_default("uuid_col", "pred_time_uuid"),
            ParamSpec::with_default("n_splits", 5i64),
            ParamSpec::with_default("seed", 42i64),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let trainer = CrossValTrainer::new(
            args.take_data_loader("data_loader")?,
            PreprocessingPipeline::new(args.take_steps("preprocessing_steps")?),
            args.take_task_pipeline("task_pipeline")?,
            args.take_metric("metric")?,
            args.take_logger("logger")?,
            args.take_str("outcome_col")?,
        )
        .with_group_col(args.take_str("group_col")?)
        .with_uuid_col(args.take_str("uuid_col")?)
        .with_n_splits(args.take_usize("n_splits")?)
        .with_seed(args.take_u64("seed")?);
        args.finish()?;
        Ok(Component::Trainer(Box::new(trainer)))
    }
}

struct SplitTrainerFactory;

impl ComponentFactory for SplitTrainerFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("data_loader"),
            ParamSpec::required("outcome_col"),
            ParamSpec::required("task_pipeline"),
            ParamSpec::required("train_splits"),
            ParamSpec::required("validation_splits"),
            ParamSpec::optional("preprocessing_steps"),
            ParamSpec::with_default("metric", binary_auroc_ref()),
            ParamSpec::with_default("logger", terminal_logger_ref()),
            ParamSpec::with_default("split_col", "split"),
            ParamSpec::with_default("group_col", "subject_id"),
            ParamSpec::with_default("uuid_col", "pred_time_uuid"),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let trainer = SplitTrainer::new(
            args.take_data_loader("data_loader")?,
            PreprocessingPipeline::new(args.take_steps("preprocessing_steps")?),
            args.take_task_pipeline("task_pipeline")?,
            args.take_metric("metric")?,
            args.take_logger("logger")?,
            args.take_str("outcome_col")?,
            args.take_str("split_col")?,
            args.take_string_seq("train_splits")?,
            args.take_string_seq("validation_splits")?,
        )
        .with_group_col(args.take_str("group_col")?)
        .with_uuid_col(args.take_str("uuid_col")?);
        args.finish()?;
        Ok(Component::Trainer(Box::new(trainer)))
    }
}

struct FloatSuggesterFactory;

impl ComponentFactory for FloatSuggesterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("name"),
            ParamSpec::required("low"),
            ParamSpec::required("high"),
            ParamSpec::with_default("logarithmic", false),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let space = FloatSpace::new(
            args.take_str("name")?,
            args.take_f64("low")?,
            args.take_f64("high")?,
            args.take_bool("logarithmic")?,
        )?;
        args.finish()?;
        Ok(Component::Suggester(SearchSpace::Float(space)))
    }
}

struct IntSuggesterFactory;

impl ComponentFactory for IntSuggesterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("name"),
            ParamSpec::required("low"),
            ParamSpec::required("high"),
            ParamSpec::with_default("logarithmic", false),
        ]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let space = IntSpace::new(
            args.take_str("name")?,
            args.take_i64("low")?,
            args.take_i64("high")?,
            args.take_bool("logarithmic")?,
        )?;
        args.finish()?;
        Ok(Component::Suggester(SearchSpace::Int(space)))
    }
}

struct CategoricalSuggesterFactory;

impl ComponentFactory for CategoricalSuggesterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("name"), ParamSpec::required("choices")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let name = args.take_str("name")?;
        let choices = match args.take_value("choices")? {
            ConfigValue::Seq(items) => items,
            single => vec![single],
        };
        args.finish()?;
        Ok(Component::Suggester(SearchSpace::Categorical(
            CategoricalSpace::new(name, choices)?,
        )))
    }
}

/// Estimator suggesters are free-form: every argument is a sub-suggester for
/// the hyperparameter of the same name.
struct EstimatorSuggesterFactory {
    estimator: &'static str,
}

impl ComponentFactory for EstimatorSuggesterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let params = args.take_suggester_map()?;
        args.finish()?;
        Ok(Component::Suggester(SearchSpace::Estimator(
            EstimatorSpace::new(self.estimator, params),
        )))
    }
}

struct OneOfSuggesterFactory;

impl ComponentFactory for OneOfSuggesterFactory {
    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("choices")]
    }

    fn build(&self, mut args: ResolvedArgs) -> Result<Component> {
        let choices = args.take_suggester_seq("choices")?;
        args.finish()?;
        Ok(Component::Suggester(SearchSpace::OneOf(OneOfSpace::new(
            choices,
        )?)))
    }
}

struct DiskArtifactSaverFactory;

impl ComponentFactory for DiskArtifactSaverFactory {
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn build(&self, args: ResolvedArgs) -> Result<Component> {
        args.finish()?;
        Ok(Component::ArtifactSaver(Arc::new(DiskArtifactSaver::new())))
    }
}

/// Registry preloaded with every built-in component.
pub fn populate_baseline_registry() -> Result<Registry> {
    let mut registry = Registry::new();

    registry.register(Category::Loggers, "terminal", Arc::new(TerminalLoggerFactory))?;
    registry.register(Category::Loggers, "silent", Arc::new(SilentLoggerFactory))?;

    registry.register(Category::DataLoaders, "csv", Arc::new(CsvLoaderFactory))?;
    registry.register(Category::DataLoaders, "parquet", Arc::new(ParquetLoaderFactory))?;

    registry.register(
        Category::PreprocessingSteps,
        "select_columns",
        Arc::new(SelectColumnsFactory),
    )?;
    registry.register(
        Category::PreprocessingSteps,
        "drop_columns",
        Arc::new(DropColumnsFactory),
    )?;
    registry.register(
        Category::PreprocessingSteps,
        "age_filter",
        Arc::new(AgeFilterFactory),
    )?;
    registry.register(
        Category::PreprocessingSteps,
        "bool_to_int",
        Arc::new(BoolToIntFactory),
    )?;
    registry.register(
        Category::PreprocessingSteps,
        "split_filter",
        Arc::new(SplitFilterFactory),
    )?;

    registry.register(
        Category::TaskPipelines,
        "binary_classification",
        Arc::new(BinaryClassificationFactory),
    )?;

    registry.register(
        Category::EstimatorSteps,
        "logistic_regression",
        Arc::new(LogisticRegressionFactory),
    )?;
    registry.register(
        Category::EstimatorSteps,
        "gradient_boosting",
        Arc::new(GradientBoostingFactory),
    )?;

    registry.register(Category::Metrics, "binary_auroc", Arc::new(BinaryAurocFactory))?;
    registry.register(
        Category::Metrics,
        "binary_accuracy",
        Arc::new(BinaryAccuracyFactory),
    )?;

    registry.register(Category::Trainers, "crossval", Arc::new(CrossValTrainerFactory))?;
    registry.register(Category::Trainers, "split", Arc::new(SplitTrainerFactory))?;

    registry.register(Category::Suggesters, "float", Arc::new(FloatSuggesterFactory))?;
    registry.register(Category::Suggesters, "int", Arc::new(IntSuggesterFactory))?;
    registry.register(
        Category::Suggesters,
        "categorical",
        Arc::new(CategoricalSuggesterFactory),
    )?;
    registry.register(
        Category::Suggesters,
        "logistic_regression",
        Arc::new(EstimatorSuggesterFactory {
            estimator: "logistic_regression",
        }),
    )?;
    registry.register(
        Category::Suggesters,
        "gradient_boosting",
        Arc::new(EstimatorSuggesterFactory {
            estimator: "gradient_boosting",
        }),
    )?;
    registry.register(Category::Suggesters, "one_of", Arc::new(OneOfSuggesterFactory))?;

    registry.register(Category::ArtifactSavers, "disk", Arc::new(DiskArtifactSaverFactory))?;

    Ok(registry)
}
