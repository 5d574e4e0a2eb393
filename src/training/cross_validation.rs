//! Grouped stratified cross-validation splitting
//!
//! All rows of one group (patient) stay on the same side of every fold's
//! train/validation boundary, and the greedy assignment keeps the outcome
//! proportion of each fold close to the overall proportion. Fold assignment
//! is a pure function of (groups, labels, n_splits, seed).

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{ClinpredError, Result};

/// A single train/validation split.
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub validation_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Grouped, stratified K-fold splitter.
#[derive(Debug, Clone)]
pub struct GroupedStratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl GroupedStratifiedKFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(ClinpredError::Data(
                "n_splits must be at least 2".to_string(),
            ));
        }
        Ok(Self { n_splits, seed: 42 })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Compute the folds. `groups[i]` is row `i`'s group id and `y[i]` its
    /// binary outcome label.
    pub fn split(&self, groups: &[String], y: &[f64]) -> Result<Vec<CVSplit>> {
        if groups.len() != y.len() {
            return Err(ClinpredError::Data(format!(
                "group column has {} rows but outcome column has {}",
                groups.len(),
                y.len()
            )));
        }

        let n_pos_total = y.iter().filter(|&&v| v >= 0.5).count();
        if n_pos_total == 0 || n_pos_total == y.len() {
            return Err(ClinpredError::InvalidInput(
                "stratified folds undefined: only a single outcome class present".to_string(),
            ));
        }

        // Per-group row indices and positive-label counts.
        let mut per_group: BTreeMap<&str, (Vec<usize>, usize)> = BTreeMap::new();
        for (idx, (group, &label)) in groups.iter().zip(y.iter()).enumerate() {
            let entry = per_group.entry(group.as_str()).or_default();
            entry.0.push(idx);
            if label >= 0.5 {
                entry.1 += 1;
            }
        }
        if per_group.len() < self.n_splits {
            return Err(ClinpredError::Data(format!(
                "number of groups ({}) must be >= n_splits ({})",
                per_group.len(),
                self.n_splits
            )));
        }

        // Seeded shuffle breaks ties between groups with identical label
        // counts; the stable sort afterwards keeps the assignment order a
        // function of (groups, y, seed) only.
        let mut group_stats: Vec<(&str, Vec<usize>, usize)> = per_group
            .into_iter()
            .map(|(gid, (rows, pos))| (gid, rows, pos))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        group_stats.shuffle(&mut rng);
        group_stats.sort_by(|a, b| {
            (b.2, b.1.len()).cmp(&(a.2, a.1.len())) // most positives first
        });

        // Greedy: each group goes to the fold with the fewest positives so
        // far, then the fewest rows.
        let mut fold_rows: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut fold_pos = vec![0usize; self.n_splits];
        for (_gid, rows, pos) in group_stats {
            let target = (0..self.n_splits)
                .min_by_key(|&f| (fold_pos[f], fold_rows[f].len(), f))
                .unwrap_or(0);
            fold_pos[target] += pos;
            fold_rows[target].extend(rows);
        }

        let mut splits = Vec::with_capacity(self.n_splits);
        for fold_idx in 0..self.n_splits {
            let mut validation_indices = fold_rows[fold_idx].clone();
            validation_indices.sort_unstable();
            let mut train_indices: Vec<usize> = fold_rows
                .iter()
                .enumerate()
                .filter(|(f, _)| *f != fold_idx)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            train_indices.sort_unstable();
            splits.push(CVSplit {
                train_indices,
                validation_indices,
                fold_idx,
            });
        }
        Ok(splits)
    }
}
