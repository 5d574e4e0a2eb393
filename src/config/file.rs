//! Config file loading and saving
//!
//! Config trees are persisted as JSON; the file syntax is an opaque
//! serialization of the in-memory tree and carries no invariants of its own.

use std::fs;
use std::path::Path;

use crate::config::value::ConfigValue;
use crate::error::Result;

/// Load a config tree from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigValue> {
    let text = fs::read_to_string(path.as_ref())?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(ConfigValue::from(json))
}

/// Save a config tree to a JSON file. Fails if the tree still contains
/// unresolved search spaces.
pub fn save_config(cfg: &ConfigValue, path: impl AsRef<Path>) -> Result<()> {
    let json = cfg.to_json()?;
    let text = serde_json::to_string_pretty(&json)?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}
