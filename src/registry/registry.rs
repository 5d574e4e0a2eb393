//! Component registry and config-tree resolution
//!
//! A config tree references components through factory-reference maps: a map
//! holding exactly one category sigil key (`"@loggers": "terminal"`) names a
//! factory, and its sibling keys are the constructor arguments. Resolution
//! walks the tree bottom-up, building every referenced component; filling
//! walks it top-down, inserting declared defaults so a stored config is
//! self-describing.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::artifacts::ArtifactSaver;
use crate::config::{ConfigMap, ConfigValue};
use crate::data::DataLoader;
use crate::error::{ClinpredError, Result};
use crate::logging::Logger;
use crate::metrics::Metric;
use crate::preprocessing::PreprocessingStep;
use crate::registry::Category;
use crate::search::SearchSpace;
use crate::training::{EstimatorStep, TaskPipeline, Trainer};

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// One declared constructor argument. `default: None` marks it required.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<ConfigValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, default: impl Into<ConfigValue>) -> Self {
        Self {
            name,
            default: Some(default.into()),
        }
    }

    /// Declared but defaulting to null; extractors read that as absent.
    pub fn optional(name: &'static str) -> Self {
        Self {
            name,
            default: Some(ConfigValue::Null),
        }
    }
}

/// A built component, tagged by category.
pub enum Component {
    Logger(Arc<dyn Logger>),
    Trainer(Box<dyn Trainer>),
    DataLoader(Arc<dyn DataLoader>),
    PreprocessingStep(Arc<dyn PreprocessingStep>),
    TaskPipeline(Box<dyn TaskPipeline>),
    EstimatorStep(Box<dyn EstimatorStep>),
    Metric(Arc<dyn Metric>),
    Suggester(SearchSpace),
    ArtifactSaver(Arc<dyn ArtifactSaver>),
}

impl Component {
    pub fn category(&self) -> Category {
        match self {
            Component::Logger(_) => Category::Loggers,
            Component::Trainer(_) => Category::Trainers,
            Component::DataLoader(_) => Category::DataLoaders,
            Component::PreprocessingStep(_) => Category::PreprocessingSteps,
            Component::TaskPipeline(_) => Category::TaskPipelines,
            Component::EstimatorStep(_) => Category::EstimatorSteps,
            Component::Metric(_) => Category::Metrics,
            Component::Suggester(_) => Category::Suggesters,
            Component::ArtifactSaver(_) => Category::ArtifactSavers,
        }
    }
}

/// A resolved config subtree: plain values stay values, factory references
/// become built components, and containers resolve element-wise.
pub enum Resolved {
    Value(ConfigValue),
    Object(Component),
    Seq(Vec<Resolved>),
    Map(BTreeMap<String, Resolved>),
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Resolved::Object(c) => write!(f, "Object(<{} component>)", c.category()),
            Resolved::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Resolved::Map(map) => f.debug_tuple("Map").field(map).finish(),
        }
    }
}

impl Resolved {
    /// Collapse back into a plain config value. Fails if any component object
    /// is embedded in the subtree.
    fn into_value(self, path: &str) -> Result<ConfigValue> {
        match self {
            Resolved::Value(v) => Ok(v),
            Resolved::Object(c) => Err(ClinpredError::at(
                path,
                &format!("expected a plain value, found a built {} component", c.category()),
            )),
            Resolved::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.into_value(path)?);
                }
                Ok(ConfigValue::Seq(out))
            }
            Resolved::Map(map) => {
                let mut out = ConfigMap::new();
                for (key, item) in map {
                    out.insert(key.clone(), item.into_value(&join_path(path, &key))?);
                }
                Ok(ConfigValue::Map(out))
            }
        }
    }
}

/// Resolved constructor arguments handed to a factory. Extractors remove
/// entries; [`ResolvedArgs::finish`] then rejects anything unconsumed, so a
/// typo in an argument name surfaces as an error instead of silence.
pub struct ResolvedArgs {
    path: String,
    args: BTreeMap<String, Resolved>,
}

impl ResolvedArgs {
    pub(crate) fn new(path: String, args: BTreeMap<String, Resolved>) -> Self {
        Self { path, args }
    }

    pub fn has(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    fn missing(&self, key: &str) -> ClinpredError {
        ClinpredError::at(&join_path(&self.path, key), "missing required argument")
    }

    fn wrong_type(&self, key: &str, expected: &str) -> ClinpredError {
        ClinpredError::at(&join_path(&self.path, key), &format!("expected {expected}"))
    }

    fn take(&mut self, key: &str) -> Result<Resolved> {
        self.args.remove(key).ok_or_else(|| self.missing(key))
    }

    pub fn take_value(&mut self, key: &str) -> Result<ConfigValue> {
        let resolved = self.take(key)?;
        resolved.into_value(&join_path(&self.path, key))
    }

    pub fn take_str(&mut self, key: &str) -> Result<String> {
        match self.take_value(key)? {
            ConfigValue::Str(s) => Ok(s),
            _ => Err(self.wrong_type(key, "a string")),
        }
    }

    pub fn take_bool(&mut self, key: &str) -> Result<bool> {
        self.take_value(key)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(key, "a bool"))
    }

    pub fn take_f64(&mut self, key: &str) -> Result<f64> {
        self.take_value(key)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(key, "a number"))
    }

    pub fn take_i64(&mut self, key: &str) -> Result<i64> {
        self.take_value(key)?
            .as_i64()
            .ok_or_else(|| self.wrong_type(key, "an integer"))
    }

    pub fn take_usize(&mut self, key: &str) -> Result<usize> {
        let v = self.take_i64(key)?;
        usize::try_from(v).map_err(|_| self.wrong_type(key, "a non-negative integer"))
    }

    pub fn take_u64(&mut self, key: &str) -> Result<u64> {
        let v = self.take_i64(key)?;
        u64::try_from(v).map_err(|_| self.wrong_type(key, "a non-negative integer"))
    }

    /// Absent keys and explicit nulls both read as `None`.
    pub fn take_opt_f64(&mut self, key: &str) -> Result<Option<f64>> {
        match self.args.remove(key) {
            None => Ok(None),
            Some(resolved) => match resolved.into_value(&join_path(&self.path, key))? {
                ConfigValue::Null => Ok(None),
                v => v.as_f64().map(Some).ok_or_else(|| self.wrong_type(key, "a number")),
            },
        }
    }

    pub fn take_string_seq(&mut self, key: &str) -> Result<Vec<String>> {
        match self.take_value(key)? {
            ConfigValue::Seq(items) => items
                .into_iter()
                .map(|item| match item {
                    ConfigValue::Str(s) => Ok(s),
                    _ => Err(self.wrong_type(key, "a sequence of strings")),
                })
                .collect(),
            _ => Err(self.wrong_type(key, "a sequence of strings")),
        }
    }

    pub fn take_logger(&mut self, key: &str) -> Result<Arc<dyn Logger>> {
        match self.take(key)? {
            Resolved::Object(Component::Logger(logger)) => Ok(logger),
            _ => Err(self.wrong_type(key, "a logger reference")),
        }
    }

    pub fn take_data_loader(&mut self, key: &str) -> Result<Arc<dyn DataLoader>> {
        match self.take(key)? {
            Resolved::Object(Component::DataLoader(loader)) => Ok(loader),
            _ => Err(self.wrong_type(key, "a data loader reference")),
        }
    }

    pub fn take_metric(&mut self, key: &str) -> Result<Arc<dyn Metric>> {
        match self.take(key)? {
            Resolved::Object(Component::Metric(metric)) => Ok(metric),
            _ => Err(self.wrong_type(key, "a metric reference")),
        }
    }

    pub fn take_task_pipeline(&mut self, key: &str) -> Result<Box<dyn TaskPipeline>> {
        match self.take(key)? {
            Resolved::Object(Component::TaskPipeline(task)) => Ok(task),
            _ => Err(self.wrong_type(key, "a task pipeline reference")),
        }
    }

    pub fn take_estimator_step(&mut self, key: &str) -> Result<Box<dyn EstimatorStep>> {
        match self.take(key)? {
            Resolved::Object(Component::EstimatorStep(step)) => Ok(step),
            _ => Err(self.wrong_type(key, "an estimator step reference")),
        }
    }

    pub fn take_trainer(&mut self, key: &str) -> Result<Box<dyn Trainer>> {
        match self.take(key)? {
            Resolved::Object(Component::Trainer(trainer)) => Ok(trainer),
            _ => Err(self.wrong_type(key, "a trainer reference")),
        }
    }

    /// Preprocessing steps, accepting a sequence, a map (values in key
    /// order), or null/absent for no steps.
    pub fn take_steps(&mut self, key: &str) -> Result<Vec<Arc<dyn PreprocessingStep>>> {
        let resolved = match self.args.remove(key) {
            None => return Ok(Vec::new()),
            Some(r) => r,
        };
        let items: Vec<Resolved> = match resolved {
            Resolved::Value(ConfigValue::Null) => return Ok(Vec::new()),
            Resolved::Seq(items) => items,
            Resolved::Map(map) => map.into_values().collect(),
            _ => return Err(self.wrong_type(key, "a sequence of preprocessing step references")),
        };
        items
            .into_iter()
            .map(|item| match item {
                Resolved::Object(Component::PreprocessingStep(step)) => Ok(step),
                _ => Err(self.wrong_type(key, "a sequence of preprocessing step references")),
            })
            .collect()
    }

    pub fn take_suggester_seq(&mut self, key: &str) -> Result<Vec<SearchSpace>> {
        match self.take(key)? {
            Resolved::Seq(items) => items
                .into_iter()
                .map(|item| match item {
                    Resolved::Object(Component::Suggester(space)) => Ok(space),
                    _ => Err(self.wrong_type(key, "a sequence of suggester references")),
                })
                .collect(),
            _ => Err(self.wrong_type(key, "a sequence of suggester references")),
        }
    }

    pub fn take_artifact_savers(&mut self, key: &str) -> Result<Vec<Arc<dyn ArtifactSaver>>> {
        let resolved = match self.args.remove(key) {
            None => return Ok(Vec::new()),
            Some(r) => r,
        };
        let items: Vec<Resolved> = match resolved {
            Resolved::Value(ConfigValue::Null) => return Ok(Vec::new()),
            Resolved::Seq(items) => items,
            _ => return Err(self.wrong_type(key, "a sequence of artifact saver references")),
        };
        items
            .into_iter()
            .map(|item| match item {
                Resolved::Object(Component::ArtifactSaver(saver)) => Ok(saver),
                _ => Err(self.wrong_type(key, "a sequence of artifact saver references")),
            })
            .collect()
    }

    /// Suggester params as (name, subspace) pairs; the value side must be a
    /// built suggester.
    pub fn take_suggester_map(&mut self) -> Result<BTreeMap<String, SearchSpace>> {
        let mut out = BTreeMap::new();
        let keys: Vec<String> = self.args.keys().cloned().collect();
        for key in keys {
            match self.args.remove(&key) {
                Some(Resolved::Object(Component::Suggester(space))) => {
                    out.insert(key, space);
                }
                _ => return Err(self.wrong_type(&key, "a suggester reference")),
            }
        }
        Ok(out)
    }

    /// Reject any arguments no extractor consumed.
    pub fn finish(self) -> Result<()> {
        if self.args.is_empty() {
            return Ok(());
        }
        let leftover: Vec<&str> = self.args.keys().map(String::as_str).collect();
        Err(ClinpredError::at(
            &self.path,
            &format!("unexpected arguments: {}", leftover.join(", ")),
        ))
    }
}

/// Builds one kind of component from resolved arguments.
pub trait ComponentFactory: Send + Sync {
    /// Declared arguments, in manifest order. Anything without a default is
    /// required.
    fn params(&self) -> Vec<ParamSpec>;

    fn build(&self, args: ResolvedArgs) -> Result<Component>;
}

/// If `map` is a factory reference, return its category, component name, and
/// the sigil key. A map with two sigil keys is malformed.
fn factory_reference(map: &ConfigMap, path: &str) -> Result<Option<(Category, String, String)>> {
    let mut found = None;
    for (key, value) in map {
        if let Some(category) = Category::from_sigil_key(key) {
            if found.is_some() {
                return Err(ClinpredError::at(
                    path,
                    "a factory reference must hold exactly one category key",
                ));
            }
            let name = match value.as_str() {
                Some(name) => name.to_string(),
                None => {
                    return Err(ClinpredError::at(
                        &join_path(path, key),
                        "component name must be a string",
                    ))
                }
            };
            found = Some((category, name, key.clone()));
        }
    }
    Ok(found)
}

/// Registry of component factories, keyed by category and short name.
#[derive(Default)]
pub struct Registry {
    tables: BTreeMap<Category, BTreeMap<String, Arc<dyn ComponentFactory>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        category: Category,
        name: &str,
        factory: Arc<dyn ComponentFactory>,
    ) -> Result<()> {
        let table = self.tables.entry(category).or_default();
        if table.contains_key(name) {
            return Err(ClinpredError::DuplicateRegistration {
                category: category.as_str(),
                name: name.to_string(),
            });
        }
        table.insert(name.to_string(), factory);
        Ok(())
    }

    fn get(&self, category: Category, name: &str, path: &str) -> Result<&Arc<dyn ComponentFactory>> {
        self.tables
            .get(&category)
            .and_then(|table| table.get(name))
            .ok_or_else(|| ClinpredError::UnknownComponent {
                category: category.as_str(),
                name: name.to_string(),
                path: path.to_string(),
            })
    }

    /// Resolve a config tree into values and built components.
    pub fn resolve(&self, cfg: &ConfigValue) -> Result<Resolved> {
        self.resolve_at(cfg, "")
    }

    fn resolve_at(&self, cfg: &ConfigValue, path: &str) -> Result<Resolved> {
        match cfg {
            ConfigValue::Map(map) => {
                if let Some((category, name, sigil)) = factory_reference(map, path)? {
                    let component = self.build_component(category, &name, &sigil, map, path)?;
                    return Ok(Resolved::Object(component));
                }
                let mut out = BTreeMap::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.resolve_at(child, &join_path(path, key))?);
                }
                Ok(Resolved::Map(out))
            }
            ConfigValue::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.resolve_at(item, &join_path(path, &i.to_string()))?);
                }
                Ok(Resolved::Seq(out))
            }
            ConfigValue::Search(space) => Err(ClinpredError::at(
                path,
                &format!("unresolved search space '{}'", space.label()),
            )),
            value => Ok(Resolved::Value(value.clone())),
        }
    }

    fn build_component(
        &self,
        category: Category,
        name: &str,
        sigil: &str,
        map: &ConfigMap,
        path: &str,
    ) -> Result<Component> {
        let factory = self.get(category, name, path)?;

        let mut args = BTreeMap::new();
        for (key, child) in map {
            if key == sigil {
                continue;
            }
            args.insert(key.clone(), self.resolve_at(child, &join_path(path, key))?);
        }
        // Declared defaults stand in for absent arguments. A default may
        // itself be a factory reference, so it resolves like any subtree.
        for spec in factory.params() {
            if args.contains_key(spec.name) {
                continue;
            }
            if let Some(default) = spec.default {
                args.insert(
                    spec.name.to_string(),
                    self.resolve_at(&default, &join_path(path, spec.name))?,
                );
            }
        }

        let component = factory.build(ResolvedArgs::new(path.to_string(), args))?;
        if component.category() != category {
            return Err(ClinpredError::at(
                path,
                &format!(
                    "factory '{name}' built a {} component, expected {category}",
                    component.category()
                ),
            ));
        }
        Ok(component)
    }

    /// Return a copy of the tree with every factory reference's declared
    /// defaults written in. With `validate` set, a required argument missing
    /// anywhere in the tree is an error naming its dotted path.
    pub fn fill(&self, cfg: &ConfigValue, validate: bool) -> Result<ConfigValue> {
        self.fill_at(cfg, "", validate)
    }

    fn fill_at(&self, cfg: &ConfigValue, path: &str, validate: bool) -> Result<ConfigValue> {
        match cfg {
            ConfigValue::Map(map) => {
                let reference = factory_reference(map, path)?;
                let mut out = ConfigMap::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.fill_at(child, &join_path(path, key), validate)?);
                }
                if let Some((category, name, sigil)) = reference {
                    let factory = self.get(category, &name, path)?;
                    for spec in factory.params() {
                        let arg_path = join_path(path, spec.name);
                        if out.contains_key(spec.name) {
                            continue;
                        }
                        match spec.default {
                            Some(default) => {
                                // Defaults that are factory references get
                                // their own defaults filled in turn.
                                out.insert(
                                    spec.name.to_string(),
                                    self.fill_at(&default, &arg_path, validate)?,
                                );
                            }
                            None if validate => {
                                return Err(ClinpredError::at(
                                    &arg_path,
                                    "missing required argument",
                                ));
                            }
                            None => {}
                        }
                    }
                    debug_assert!(out.contains_key(&sigil));
                }
                Ok(ConfigValue::Map(out))
            }
            ConfigValue::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.fill_at(item, &join_path(path, &i.to_string()), validate)?);
                }
                Ok(ConfigValue::Seq(out))
            }
            value => Ok(value.clone()),
        }
    }

    /// First resolution pass: build only suggester references, turning each
    /// into a search node in place. Everything else is left for the second
    /// pass, after a trial has replaced the search nodes with concrete
    /// values.
    pub fn resolve_suggesters(&self, cfg: &ConfigValue) -> Result<ConfigValue> {
        self.resolve_suggesters_at(cfg, "")
    }

    fn resolve_suggesters_at(&self, cfg: &ConfigValue, path: &str) -> Result<ConfigValue> {
        match cfg {
            ConfigValue::Map(map) => {
                if let Some((Category::Suggesters, name, sigil)) = factory_reference(map, path)? {
                    let component =
                        self.build_component(Category::Suggesters, &name, &sigil, map, path)?;
                    return match component {
                        Component::Suggester(space) => Ok(ConfigValue::Search(space)),
                        other => Err(ClinpredError::at(
                            path,
                            &format!("suggester '{name}' built a {} component", other.category()),
                        )),
                    };
                }
                let mut out = ConfigMap::new();
                for (key, child) in map {
                    out.insert(
                        key.clone(),
                        self.resolve_suggesters_at(child, &join_path(path, key))?,
                    );
                }
                Ok(ConfigValue::Map(out))
            }
            ConfigValue::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.resolve_suggesters_at(item, &join_path(path, &i.to_string()))?);
                }
                Ok(ConfigValue::Seq(out))
            }
            value => Ok(value.clone()),
        }
    }

    /// The registered component names, per category, as a config value.
    pub fn to_dict(&self) -> ConfigValue {
        let mut out = ConfigMap::new();
        for category in Category::ALL {
            let names: Vec<ConfigValue> = self
                .tables
                .get(&category)
                .map(|table| {
                    table
                        .keys()
                        .map(|name| ConfigValue::Str(name.clone()))
                        .collect()
                })
                .unwrap_or_default();
            out.insert(category.as_str().to_string(), ConfigValue::Seq(names));
        }
        ConfigValue::Map(out)
    }
}
