//! Declarative experiment configuration
//!
//! Provides the config tree value type, addressed mutation operations, and
//! file round-tripping.

mod file;
mod value;

pub use file::{load_config, save_config};
pub use value::{ConfigMap, ConfigValue};
