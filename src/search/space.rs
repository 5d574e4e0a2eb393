//! Search space definitions for hyperparameter optimization
//!
//! A [`SearchSpace`] is a declarative placeholder embedded in a config tree,
//! standing in for a value a trial will choose. Ranges are validated at
//! construction so a malformed config fails before any trial is spent.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ConfigValue;
use crate::error::{ClinpredError, Result};
use crate::registry::Category;
use crate::search::trial::Trial;

/// Process-wide counter used to disambiguate trial keys when the same
/// suggester type appears more than once in a tree.
static SPACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn next_space_id() -> usize {
    SPACE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A hyperparameter search space node.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchSpace {
    Float(FloatSpace),
    Int(IntSpace),
    Categorical(CategoricalSpace),
    Estimator(EstimatorSpace),
    OneOf(OneOfSpace),
}

/// Continuous range, optionally sampled on a log scale.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatSpace {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub logarithmic: bool,
}

impl FloatSpace {
    pub fn new(name: impl Into<String>, low: f64, high: f64, logarithmic: bool) -> Result<Self> {
        let name = name.into();
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(ClinpredError::InvalidSearchSpace(format!(
                "float range '{name}' requires low < high, got [{low}, {high}]"
            )));
        }
        if logarithmic && low <= 0.0 {
            return Err(ClinpredError::InvalidSearchSpace(format!(
                "log-scale float range '{name}' requires strictly positive bounds, got low = {low}"
            )));
        }
        Ok(Self {
            name,
            low,
            high,
            logarithmic,
        })
    }
}

/// Integer range, optionally sampled on a log scale.
#[derive(Debug, Clone, PartialEq)]
pub struct IntSpace {
    pub name: String,
    pub low: i64,
    pub high: i64,
    pub logarithmic: bool,
}

impl IntSpace {
    pub fn new(name: impl Into<String>, low: i64, high: i64, logarithmic: bool) -> Result<Self> {
        let name = name.into();
        if low >= high {
            return Err(ClinpredError::InvalidSearchSpace(format!(
                "int range '{name}' requires low < high, got [{low}, {high}]"
            )));
        }
        if logarithmic && low <= 0 {
            return Err(ClinpredError::InvalidSearchSpace(format!(
                "log-scale int range '{name}' requires strictly positive bounds, got low = {low}"
            )));
        }
        Ok(Self {
            name,
            low,
            high,
            logarithmic,
        })
    }
}

/// Ordered, enumerated choice set.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSpace {
    pub name: String,
    pub choices: Vec<ConfigValue>,
}

impl CategoricalSpace {
    pub fn new(name: impl Into<String>, choices: Vec<ConfigValue>) -> Result<Self> {
        let name = name.into();
        if choices.is_empty() {
            return Err(ClinpredError::InvalidSearchSpace(format!(
                "categorical space '{name}' has no choices"
            )));
        }
        Ok(Self { name, choices })
    }
}

/// Composite suggester: suggests an estimator-step factory reference plus
/// search nodes for that estimator's hyperparameters. The walker recurses
/// into the suggestion result, so the nested nodes are sampled in the same
/// trial.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorSpace {
    /// Unique per-construction trial-key prefix; two suggesters for the same
    /// estimator family in one tree sample independently.
    key_prefix: String,
    pub estimator: String,
    pub params: BTreeMap<String, SearchSpace>,
}

impl EstimatorSpace {
    pub fn new(estimator: impl Into<String>, params: BTreeMap<String, SearchSpace>) -> Self {
        let estimator = estimator.into();
        let key_prefix = format!("{}_{}", estimator, next_space_id());
        Self {
            key_prefix,
            estimator,
            params,
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

/// Space of suggesters: the trial first picks which alternative is active,
/// then the chosen alternative suggests.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOfSpace {
    /// Synthesized from all candidate labels plus a unique suffix.
    key: String,
    pub choices: Vec<SearchSpace>,
}

impl OneOfSpace {
    pub fn new(choices: Vec<SearchSpace>) -> Result<Self> {
        if choices.is_empty() {
            return Err(ClinpredError::InvalidSearchSpace(
                "one_of space has no alternatives".to_string(),
            ));
        }
        let labels: Vec<&str> = choices.iter().map(SearchSpace::label).collect();
        let key = format!("one_of<{}>_{}", labels.join("|"), next_space_id());
        Ok(Self { key, choices })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl SearchSpace {
    /// Shorthand constructors, mirroring the suggester factory arguments.
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        Ok(SearchSpace::Float(FloatSpace::new(name, low, high, false)?))
    }

    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        Ok(SearchSpace::Float(FloatSpace::new(name, low, high, true)?))
    }

    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Result<Self> {
        Ok(SearchSpace::Int(IntSpace::new(name, low, high, false)?))
    }

    pub fn categorical(name: impl Into<String>, choices: Vec<ConfigValue>) -> Result<Self> {
        Ok(SearchSpace::Categorical(CategoricalSpace::new(
            name, choices,
        )?))
    }

    /// Short label used in synthesized keys and display output.
    pub fn label(&self) -> &str {
        match self {
            SearchSpace::Float(s) => &s.name,
            SearchSpace::Int(s) => &s.name,
            SearchSpace::Categorical(s) => &s.name,
            SearchSpace::Estimator(s) => &s.estimator,
            SearchSpace::OneOf(_) => "one_of",
        }
    }

    /// Return a copy with the trial key renamed. Composite spaces keep their
    /// synthesized keys.
    fn renamed(&self, name: String) -> SearchSpace {
        match self {
            SearchSpace::Float(s) => SearchSpace::Float(FloatSpace { name, ..s.clone() }),
            SearchSpace::Int(s) => SearchSpace::Int(IntSpace { name, ..s.clone() }),
            SearchSpace::Categorical(s) => {
                SearchSpace::Categorical(CategoricalSpace { name, ..s.clone() })
            }
            other => other.clone(),
        }
    }

    /// Ask the trial for one concrete value. Composite suggesters return a
    /// subtree that may itself contain further search nodes; the caller is
    /// expected to keep walking the result.
    pub fn suggest(&self, trial: &mut Trial) -> Result<ConfigValue> {
        match self {
            SearchSpace::Float(s) => Ok(ConfigValue::Float(trial.suggest_float(
                &s.name,
                s.low,
                s.high,
                s.logarithmic,
            ))),
            SearchSpace::Int(s) => Ok(ConfigValue::Int(trial.suggest_int(
                &s.name,
                s.low,
                s.high,
                s.logarithmic,
            ))),
            SearchSpace::Categorical(s) => Ok(trial.suggest_categorical(&s.name, &s.choices)),
            SearchSpace::Estimator(s) => {
                let mut subtree = crate::config::ConfigMap::new();
                subtree.insert(
                    Category::EstimatorSteps.sigil_key(),
                    ConfigValue::Str(s.estimator.clone()),
                );
                for (param, space) in &s.params {
                    let keyed = space.renamed(format!("{}.{param}", s.key_prefix));
                    subtree.insert(param.clone(), ConfigValue::Search(keyed));
                }
                Ok(ConfigValue::Map(subtree))
            }
            SearchSpace::OneOf(s) => {
                let idx =
                    trial.suggest_int(&s.key, 0, (s.choices.len() - 1) as i64, false) as usize;
                s.choices[idx].suggest(trial)
            }
        }
    }
}
