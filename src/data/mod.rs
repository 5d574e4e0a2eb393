//! Data loaders

mod loader;

pub use loader::{CsvLoader, DataFrameLoader, DataLoader, ParquetLoader};
