//! Data loading
//!
//! A loader produces a lazy table; no I/O happens until the trainer
//! materializes the preprocessed frame.

use std::path::PathBuf;

use polars::prelude::*;

use crate::error::Result;

/// Source of the feature table.
pub trait DataLoader: Send + Sync {
    fn load(&self) -> Result<LazyFrame>;
}

/// Lazily scan a CSV file with header and schema inference.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataLoader for CsvLoader {
    fn load(&self) -> Result<LazyFrame> {
        let lf = LazyCsvReader::new(&self.path)
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .finish()?;
        Ok(lf)
    }
}

/// Lazily scan a Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetLoader {
    path: PathBuf,
}

impl ParquetLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataLoader for ParquetLoader {
    fn load(&self) -> Result<LazyFrame> {
        let lf = LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?;
        Ok(lf)
    }
}

/// Serve an in-memory frame. Mostly useful in tests and synthetic-data runs.
#[derive(Debug, Clone)]
pub struct DataFrameLoader {
    df: DataFrame,
}

impl DataFrameLoader {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }
}

impl DataLoader for DataFrameLoader {
    fn load(&self) -> Result<LazyFrame> {
        Ok(self.df.clone().lazy())
    }
}
