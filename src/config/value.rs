//! Declarative configuration trees
//!
//! A [`ConfigValue`] is the in-memory form of an experiment configuration: a
//! nested mapping/sequence/scalar structure. A map node whose single
//! `@`-prefixed key names a registered component category is a factory
//! reference; its sibling keys are the constructor arguments. The
//! [`Search`](ConfigValue::Search) variant only appears after partial
//! resolution has replaced `@suggesters` references with live search spaces
//! and never survives a hyperparameter walk.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ClinpredError, Result};
use crate::search::space::SearchSpace;

/// Map node of a config tree. BTreeMap keeps key iteration deterministic, so
/// resolving the same tree twice constructs components in the same order.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A single node of a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<ConfigValue>),
    Map(ConfigMap),
    /// A live hyperparameter search space embedded in an otherwise concrete
    /// tree. Produced by `Registry::resolve_suggesters`, removed by the
    /// tree-walker.
    Search(SearchSpace),
}

impl ConfigValue {
    /// Build a map node from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> ConfigValue
    where
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        ConfigValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric accessor; integers widen to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Retrieve the node at a dotted path. Wildcards are not allowed here:
    /// a retrieval must address exactly one node.
    pub fn retrieve(&self, path: &str) -> Result<&ConfigValue> {
        let mut node = self;
        let mut walked = String::new();
        for segment in path.split('.') {
            if segment == "*" {
                return Err(ClinpredError::at(path, "wildcard not allowed in retrieve"));
            }
            push_segment(&mut walked, segment);
            let map = node
                .as_map()
                .ok_or_else(|| ClinpredError::at(&walked, "not a mapping node"))?;
            node = map
                .get(segment)
                .ok_or_else(|| ClinpredError::at(&walked, "path does not exist"))?;
        }
        Ok(node)
    }

    /// Replace the value at an existing dotted path. A `*` segment applies
    /// the mutation to every child of the map node at that point.
    pub fn mutate(&mut self, path: &str, value: ConfigValue) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        self.apply(&segments, "", false, &mut |map, key, at| {
            if !map.contains_key(key) {
                return Err(ClinpredError::at(at, "path does not exist"));
            }
            map.insert(key.to_string(), value.clone());
            Ok(())
        })
    }

    /// Insert a value at a dotted path that does not yet exist, creating
    /// intermediate map nodes along the way.
    pub fn add(&mut self, path: &str, value: ConfigValue) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        self.apply(&segments, "", true, &mut |map, key, at| {
            if map.contains_key(key) {
                return Err(ClinpredError::at(at, "path already exists"));
            }
            map.insert(key.to_string(), value.clone());
            Ok(())
        })
    }

    /// Remove the node at a dotted path, returning it. With a wildcard, every
    /// removed value is returned as a sequence.
    pub fn remove(&mut self, path: &str) -> Result<ConfigValue> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut removed = Vec::new();
        self.apply(&segments, "", false, &mut |map, key, at| {
            let value = map
                .remove(key)
                .ok_or_else(|| ClinpredError::at(at, "path does not exist"))?;
            removed.push(value);
            Ok(())
        })?;
        if !path.contains('*') && removed.len() == 1 {
            if let Some(value) = removed.pop() {
                return Ok(value);
            }
        }
        Ok(ConfigValue::Seq(removed))
    }

    /// Walk `segments`, fanning out on `*`, and hand the final map node plus
    /// leaf key to `op`. With `create_missing`, intermediate map nodes are
    /// created for concrete segments (`add` semantics).
    fn apply(
        &mut self,
        segments: &[&str],
        walked: &str,
        create_missing: bool,
        op: &mut dyn FnMut(&mut ConfigMap, &str, &str) -> Result<()>,
    ) -> Result<()> {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Err(ClinpredError::at(walked, "empty path")),
        };
        let mut at = walked.to_string();
        push_segment(&mut at, head);

        if *head == "*" {
            let map = self
                .as_map_mut()
                .ok_or_else(|| ClinpredError::at(&at, "not a mapping node"))?;
            if rest.is_empty() {
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    op(map, &key, &at)?;
                }
                return Ok(());
            }
            for (key, child) in map.iter_mut() {
                let mut child_at = walked.to_string();
                push_segment(&mut child_at, key);
                child.apply(rest, &child_at, create_missing, op)?;
            }
            return Ok(());
        }

        if rest.is_empty() {
            let map = self
                .as_map_mut()
                .ok_or_else(|| ClinpredError::at(&at, "not a mapping node"))?;
            return op(map, head, &at);
        }

        let map = self
            .as_map_mut()
            .ok_or_else(|| ClinpredError::at(&at, "not a mapping node"))?;
        let child = if create_missing {
            map.entry(head.to_string())
                .or_insert_with(|| ConfigValue::Map(ConfigMap::new()))
        } else {
            map.get_mut(*head)
                .ok_or_else(|| ClinpredError::at(&at, "path does not exist"))?
        };
        child.apply(rest, &at, create_missing, op)
    }

    /// Convert to a JSON value. Fails when the tree still carries live search
    /// spaces, which have no serialized form.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value;
        Ok(match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(v) => Value::Bool(*v),
            ConfigValue::Int(v) => Value::from(*v),
            ConfigValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .ok_or_else(|| {
                    ClinpredError::Serialization(format!("non-finite float {v} in config"))
                })?,
            ConfigValue::Str(s) => Value::String(s.clone()),
            ConfigValue::Seq(items) => Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json())
                    .collect::<Result<Vec<_>>>()?,
            ),
            ConfigValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<serde_json::Map<_, _>>>()?,
            ),
            ConfigValue::Search(space) => {
                return Err(ClinpredError::Serialization(format!(
                    "cannot serialize unresolved search space '{}'",
                    space.label()
                )))
            }
        })
    }
}

fn push_segment(walked: &mut String, segment: &str) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(segment);
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<usize> for ConfigValue {
    fn from(v: usize) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(v: Vec<ConfigValue>) -> Self {
        ConfigValue::Seq(v)
    }
}

impl From<SearchSpace> for ConfigValue {
    fn from(v: SearchSpace) -> Self {
        ConfigValue::Search(v)
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Int(i)
                } else {
                    ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ConfigValue::Str(s),
            Value::Array(items) => {
                ConfigValue::Seq(items.into_iter().map(ConfigValue::from).collect())
            }
            Value::Object(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => write!(f, "null"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Str(s) => write!(f, "{s:?}"),
            ConfigValue::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ConfigValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            ConfigValue::Search(space) => write!(f, "<search:{}>", space.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_tree() -> ConfigValue {
        ConfigValue::from_pairs([(
            "trainer",
            ConfigValue::from_pairs([
                ("n_splits", ConfigValue::Int(5)),
                (
                    "preprocessing_pipeline",
                    ConfigValue::from_pairs([
                        (
                            "step_a",
                            ConfigValue::from_pairs([("keep", ConfigValue::Bool(true))]),
                        ),
                        (
                            "step_b",
                            ConfigValue::from_pairs([("keep", ConfigValue::Bool(true))]),
                        ),
                    ]),
                ),
            ]),
        )])
    }

    #[test]
    fn test_retrieve_nested() {
        let tree = nested_tree();
        let v = tree.retrieve("trainer.n_splits").unwrap();
        assert_eq!(v, &ConfigValue::Int(5));
    }

    #[test]
    fn test_retrieve_missing_path_names_prefix() {
        let tree = nested_tree();
        let err = tree.retrieve("trainer.missing.deeper").unwrap_err();
        assert!(err.to_string().contains("trainer.missing"));
    }

    #[test]
    fn test_mutate_requires_existing_path() {
        let mut tree = nested_tree();
        tree.mutate("trainer.n_splits", ConfigValue::Int(3)).unwrap();
        assert_eq!(tree.retrieve("trainer.n_splits").unwrap(), &ConfigValue::Int(3));

        let err = tree.mutate("trainer.n_folds", ConfigValue::Int(3)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_add_creates_intermediate_maps() {
        let mut tree = nested_tree();
        tree.add("trainer.metric.threshold", ConfigValue::Float(0.5))
            .unwrap();
        assert_eq!(
            tree.retrieve("trainer.metric.threshold").unwrap(),
            &ConfigValue::Float(0.5)
        );

        let err = tree.add("trainer.n_splits", ConfigValue::Int(2)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_wildcard_mutate_hits_all_children() {
        let mut tree = nested_tree();
        tree.mutate(
            "trainer.preprocessing_pipeline.*.keep",
            ConfigValue::Bool(false),
        )
        .unwrap();
        for step in ["step_a", "step_b"] {
            let path = format!("trainer.preprocessing_pipeline.{step}.keep");
            assert_eq!(tree.retrieve(&path).unwrap(), &ConfigValue::Bool(false));
        }
    }

    #[test]
    fn test_wildcard_remove_returns_seq() {
        let mut tree = nested_tree();
        let removed = tree.remove("trainer.preprocessing_pipeline.*").unwrap();
        assert_eq!(removed.as_seq().map(<[_]>::len), Some(2));
        assert!(tree
            .retrieve("trainer.preprocessing_pipeline")
            .unwrap()
            .as_map()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let tree = ConfigValue::from_pairs([
            ("an_int", ConfigValue::Int(3)),
            ("a_float", ConfigValue::Float(0.25)),
            ("a_str", ConfigValue::Str("hello".into())),
            (
                "a_list",
                ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::Int(2)]),
            ),
        ]);
        let json = tree.to_json().unwrap();
        let back = ConfigValue::from(json);
        assert_eq!(back, tree);
    }
}
