//! Built-in preprocessing steps

use polars::prelude::*;

use crate::error::Result;
use crate::preprocessing::pipeline::{missing_column, schema_of, PreprocessingStep};

/// Keep only the named columns, in the given order.
#[derive(Debug, Clone)]
pub struct SelectColumns {
    columns: Vec<String>,
}

impl SelectColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl PreprocessingStep for SelectColumns {
    fn name(&self) -> &'static str {
        "select_columns"
    }

    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let schema = schema_of(&lf, self.name())?;
        for column in &self.columns {
            if schema.get(column.as_str()).is_none() {
                return Err(missing_column(self.name(), column));
            }
        }
        let exprs: Vec<Expr> = self.columns.iter().map(|c| col(c.as_str())).collect();
        Ok(lf.select(exprs))
    }
}

/// Drop the named columns, keeping everything else in schema order.
#[derive(Debug, Clone)]
pub struct DropColumns {
    columns: Vec<String>,
}

impl DropColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl PreprocessingStep for DropColumns {
    fn name(&self) -> &'static str {
        "drop_columns"
    }

    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let schema = schema_of(&lf, self.name())?;
        for column in &self.columns {
            if schema.get(column.as_str()).is_none() {
                return Err(missing_column(self.name(), column));
            }
        }
        let keep: Vec<Expr> = schema
            .iter_names()
            .filter(|name| !self.columns.iter().any(|c| c == name.as_str()))
            .map(|name| col(name.as_str()))
            .collect();
        Ok(lf.select(keep))
    }
}

/// Keep rows whose age falls inside the closed interval `[min_age, max_age]`.
/// Standard cohort-definition filter for clinical prediction tables.
#[derive(Debug, Clone)]
pub struct AgeFilter {
    age_col: String,
    min_age: Option<f64>,
    max_age: Option<f64>,
}

impl AgeFilter {
    pub fn new(age_col: impl Into<String>, min_age: Option<f64>, max_age: Option<f64>) -> Self {
        Self {
            age_col: age_col.into(),
            min_age,
            max_age,
        }
    }
}

impl PreprocessingStep for AgeFilter {
    fn name(&self) -> &'static str {
        "age_filter"
    }

    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let schema = schema_of(&lf, self.name())?;
        if schema.get(self.age_col.as_str()).is_none() {
            return Err(missing_column(self.name(), &self.age_col));
        }
        let mut predicate = lit(true);
        if let Some(min_age) = self.min_age {
            predicate = predicate.and(col(self.age_col.as_str()).gt_eq(lit(min_age)));
        }
        if let Some(max_age) = self.max_age {
            predicate = predicate.and(col(self.age_col.as_str()).lt_eq(lit(max_age)));
        }
        Ok(lf.filter(predicate))
    }
}

/// Cast every boolean column to integer so downstream estimators see a
/// uniform numeric feature matrix.
#[derive(Debug, Clone, Default)]
pub struct BoolToInt;

impl BoolToInt {
    pub fn new() -> Self {
        Self
    }
}

impl PreprocessingStep for BoolToInt {
    fn name(&self) -> &'static str {
        "bool_to_int"
    }

    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let schema = schema_of(&lf, self.name())?;
        let casts: Vec<Expr> = schema
            .iter()
            .filter(|(_, dtype)| matches!(dtype, DataType::Boolean))
            .map(|(name, _)| col(name.as_str()).cast(DataType::Int64))
            .collect();
        if casts.is_empty() {
            return Ok(lf);
        }
        Ok(lf.with_columns(casts))
    }
}

/// Keep rows whose split-column value is one of the named splits. Used to
/// carve train/validation/test slices out of a pre-labelled table.
#[derive(Debug, Clone)]
pub struct SplitFilter {
    split_col: String,
    splits_to_keep: Vec<String>,
}

impl SplitFilter {
    pub fn new(split_col: impl Into<String>, splits_to_keep: Vec<String>) -> Self {
        Self {
            split_col: split_col.into(),
            splits_to_keep,
        }
    }
}

impl PreprocessingStep for SplitFilter {
    fn name(&self) -> &'static str {
        "split_filter"
    }

    fn apply(&self, lf: LazyFrame) -> Result<LazyFrame> {
        let schema = schema_of(&lf, self.name())?;
        if schema.get(self.split_col.as_str()).is_none() {
            return Err(missing_column(self.name(), &self.split_col));
        }
        let predicate = self
            .splits_to_keep
            .iter()
            .map(|split| col(self.split_col.as_str()).eq(lit(split.as_str())))
            .reduce(|a, b| a.or(b))
            .unwrap_or_else(|| lit(false));
        Ok(lf.filter(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_columns_keeps_order() {
        let df = df!("a" => &[1], "b" => &[2], "c" => &[3]).unwrap();
        let out = DropColumns::new(vec!["b".into()])
            .apply(df.lazy())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.get_column_names_str(), ["a", "c"]);
    }

    #[test]
    fn test_bool_to_int_casts_all_boolean_columns() {
        let df = df!(
            "flag" => &[true, false],
            "x" => &[1.0, 2.0],
        )
        .unwrap();
        let out = BoolToInt::new().apply(df.lazy()).unwrap().collect().unwrap();
        assert_eq!(out.column("flag").unwrap().dtype(), &DataType::Int64);
        assert_eq!(out.column("x").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_split_filter() {
        let df = df!(
            "split" => &["train", "val", "train", "test"],
            "x" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let out = SplitFilter::new("split", vec!["train".into(), "val".into()])
            .apply(df.lazy())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.height(), 3);
    }

    #[test]
    fn test_age_filter_bounds_are_inclusive() {
        let df = df!("age" => &[17.9, 18.0, 65.0, 65.1]).unwrap();
        let out = AgeFilter::new("age", Some(18.0), Some(65.0))
            .apply(df.lazy())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.height(), 2);
    }
}
