//! Component categories
//!
//! Categories are fixed namespaces: two unrelated components may share a
//! short name as long as they live in different categories. Config trees
//! reference a category through a sigil key such as `"@loggers"`.

/// Namespace of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Loggers,
    Trainers,
    DataLoaders,
    PreprocessingSteps,
    TaskPipelines,
    EstimatorSteps,
    Metrics,
    Suggesters,
    ArtifactSavers,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Loggers,
        Category::Trainers,
        Category::DataLoaders,
        Category::PreprocessingSteps,
        Category::TaskPipelines,
        Category::EstimatorSteps,
        Category::Metrics,
        Category::Suggesters,
        Category::ArtifactSavers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Loggers => "loggers",
            Category::Trainers => "trainers",
            Category::DataLoaders => "data_loaders",
            Category::PreprocessingSteps => "preprocessing_steps",
            Category::TaskPipelines => "task_pipelines",
            Category::EstimatorSteps => "estimator_steps",
            Category::Metrics => "metrics",
            Category::Suggesters => "suggesters",
            Category::ArtifactSavers => "artifact_savers",
        }
    }

    /// The factory-reference key for this category, e.g. `"@loggers"`.
    pub fn sigil_key(&self) -> String {
        format!("@{}", self.as_str())
    }

    /// Parse a map key like `"@trainers"` into its category.
    pub fn from_sigil_key(key: &str) -> Option<Category> {
        let name = key.strip_prefix('@')?;
        Category::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
