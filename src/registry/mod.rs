//! Component registry: categories, factories, and config-tree resolution.

mod builtin;
mod category;
pub mod registry;

pub use builtin::populate_baseline_registry;
pub use category::Category;
pub use registry::{Component, ComponentFactory, ParamSpec, Registry, Resolved, ResolvedArgs};
