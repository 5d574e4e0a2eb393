//! Trial handles for hyperparameter sampling
//!
//! A [`Trial`] is one sampled point in a study: a deterministic, seeded
//! sampler that memoizes every suggested value by key. Asking for the same
//! key twice in one trial returns the first sampled value; distinct keys
//! sample independently.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::config::ConfigValue;

/// A sampled parameter, as recorded in the study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
}

/// One trial of a hyperparameter search.
pub struct Trial {
    number: usize,
    rng: Xoshiro256PlusPlus,
    memo: BTreeMap<String, ConfigValue>,
    asked: Vec<String>,
    params: BTreeMap<String, ParamValue>,
}

impl Trial {
    /// Create a trial. The sampler is a pure function of the study seed and
    /// trial number, so resuming a study replays nothing and repeats nothing.
    pub fn new(number: usize, study_seed: u64) -> Self {
        let seed = study_seed ^ (number as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            number,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            memo: BTreeMap::new(),
            asked: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Sample a float in `[low, high]`, optionally log-uniform.
    pub fn suggest_float(&mut self, key: &str, low: f64, high: f64, logarithmic: bool) -> f64 {
        if let Some(v) = self.memo.get(key).and_then(ConfigValue::as_f64) {
            return v;
        }
        let value = if logarithmic {
            let log_low = low.ln();
            let log_high = high.ln();
            (self.rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
        } else {
            self.rng.gen::<f64>() * (high - low) + low
        };
        let value = value.clamp(low, high);
        self.record(key, ConfigValue::Float(value), ParamValue::Float(value));
        value
    }

    /// Sample an integer in `[low, high]`, optionally log-uniform.
    pub fn suggest_int(&mut self, key: &str, low: i64, high: i64, logarithmic: bool) -> i64 {
        if let Some(v) = self.memo.get(key).and_then(ConfigValue::as_i64) {
            return v;
        }
        let value = if logarithmic {
            let log_low = (low as f64).ln();
            let log_high = ((high + 1) as f64).ln();
            let sampled = (self.rng.gen::<f64>() * (log_high - log_low) + log_low).exp() as i64;
            sampled.clamp(low, high)
        } else {
            self.rng.gen_range(low..=high)
        };
        self.record(key, ConfigValue::Int(value), ParamValue::Int(value));
        value
    }

    /// Pick one of an ordered choice set.
    pub fn suggest_categorical(&mut self, key: &str, choices: &[ConfigValue]) -> ConfigValue {
        if let Some(v) = self.memo.get(key) {
            return v.clone();
        }
        let idx = self.rng.gen_range(0..choices.len());
        let choice = choices[idx].clone();
        // String choices are recorded bare, without display quoting.
        let recorded = match &choice {
            ConfigValue::Str(s) => s.clone(),
            other => other.to_string(),
        };
        self.record(key, choice.clone(), ParamValue::Str(recorded));
        choice
    }

    fn record(&mut self, key: &str, memo: ConfigValue, param: ParamValue) {
        self.memo.insert(key.to_string(), memo);
        self.asked.push(key.to_string());
        self.params.insert(key.to_string(), param);
    }

    /// Keys this trial was asked for, in ask order, first ask only.
    pub fn asked_keys(&self) -> &[String] {
        &self.asked
    }

    /// Sampled parameters, as recorded in the study.
    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_memoizes() {
        let mut trial = Trial::new(0, 42);
        let a = trial.suggest_float("alpha", 0.0, 1.0, false);
        let b = trial.suggest_float("alpha", 0.0, 1.0, false);
        assert_eq!(a, b);
        assert_eq!(trial.asked_keys(), ["alpha"]);
    }

    #[test]
    fn test_distinct_keys_sample_independently() {
        let mut trial = Trial::new(0, 42);
        trial.suggest_float("a", 0.0, 1.0, false);
        trial.suggest_float("b", 0.0, 1.0, false);
        assert_eq!(trial.asked_keys(), ["a", "b"]);
        assert_eq!(trial.params().len(), 2);
    }

    #[test]
    fn test_trials_are_deterministic_in_seed_and_number() {
        let mut first = Trial::new(3, 11);
        let mut second = Trial::new(3, 11);
        assert_eq!(
            first.suggest_float("alpha", 0.0, 1.0, false),
            second.suggest_float("alpha", 0.0, 1.0, false)
        );

        let mut other_number = Trial::new(4, 11);
        // Not a guarantee in general, but these seeds are fixed.
        assert_ne!(
            first.suggest_float("beta", 0.0, 1.0, false),
            other_number.suggest_float("beta", 0.0, 1.0, false)
        );
    }

    #[test]
    fn test_categorical_returns_one_of_the_choices() {
        let choices = vec![
            ConfigValue::Str("xgboost".into()),
            ConfigValue::Str("logistic_regression".into()),
        ];
        let mut trial = Trial::new(1, 5);
        let picked = trial.suggest_categorical("model", &choices);
        assert!(choices.contains(&picked));

        let ConfigValue::Str(name) = picked else {
            panic!("categorical over strings must pick a string");
        };
        assert_eq!(trial.params()["model"], ParamValue::Str(name));
        let ParamValue::Str(recorded) = &trial.params()["model"] else {
            unreachable!();
        };
        assert!(!recorded.contains('"'));
    }
}
