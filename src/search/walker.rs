//! Config-tree hyperparameter walker
//!
//! Replaces every search node in a config tree with a concrete value drawn
//! from a trial. Composite suggesters return subtrees that may hold further
//! search nodes, so the walker re-walks every suggestion result until the
//! tree is fully concrete.

use crate::config::{ConfigMap, ConfigValue};
use crate::error::Result;
use crate::search::trial::Trial;

/// Produce a concrete copy of `cfg` with every search node resolved through
/// `trial`. A tree without search nodes comes back deep-equal to its input.
pub fn suggest_hyperparams_from_cfg(cfg: &ConfigValue, trial: &mut Trial) -> Result<ConfigValue> {
    match cfg {
        ConfigValue::Search(space) => {
            let suggested = space.suggest(trial)?;
            // Composite suggesters emit subtrees with nested search nodes.
            suggest_hyperparams_from_cfg(&suggested, trial)
        }
        ConfigValue::Map(map) => {
            let mut out = ConfigMap::new();
            for (key, child) in map {
                out.insert(key.clone(), suggest_hyperparams_from_cfg(child, trial)?);
            }
            Ok(ConfigValue::Map(out))
        }
        ConfigValue::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(suggest_hyperparams_from_cfg(item, trial)?);
            }
            Ok(ConfigValue::Seq(out))
        }
        concrete => Ok(concrete.clone()),
    }
}

/// Whether any search node remains anywhere in the tree.
pub fn contains_search_space(cfg: &ConfigValue) -> bool {
    match cfg {
        ConfigValue::Search(_) => true,
        ConfigValue::Map(map) => map.values().any(contains_search_space),
        ConfigValue::Seq(items) => items.iter().any(contains_search_space),
        _ => false,
    }
}
