//! Preprocessing pipeline and built-in transform steps

mod pipeline;
pub mod steps;

pub use pipeline::{PreprocessingPipeline, PreprocessingStep};
