//! Pipeline configuration

use crate::error::{CohortError, Result};
use crate::features::{ClickExtractor, ViewExtractor};

/// Default identifier column shared by both input tables
pub const DEFAULT_ID_COLUMN: &str = "MLID";

/// K-Means settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// Number of cohorts to produce
    pub n_clusters: usize,
    /// Seed for centroid initialization
    pub random_state: u64,
    /// Independent initializations; the lowest-inertia run wins
    pub n_init: usize,
    /// Maximum iterations per run
    pub max_iters: u64,
    /// Convergence tolerance
    pub tolerance: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            random_state: 42,
            n_init: 10,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Everything a pipeline run needs besides the two input tables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub id_column: String,
    pub click: ClickExtractor,
    pub view: ViewExtractor,
    pub clustering: ClusterParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            click: ClickExtractor::default(),
            view: ViewExtractor::default(),
            clustering: ClusterParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let params = &self.clustering;
        if self.id_column.is_empty() {
            return Err(CohortError::InvalidConfig(
                "identifier column name is empty".to_string(),
            ));
        }
        if params.n_clusters == 0 {
            return Err(CohortError::InvalidConfig(
                "number of clusters must be at least 1".to_string(),
            ));
        }
        if params.n_init == 0 {
            return Err(CohortError::InvalidConfig(
                "number of initializations must be at least 1".to_string(),
            ));
        }
        if params.max_iters == 0 {
            return Err(CohortError::InvalidConfig(
                "maximum iterations must be at least 1".to_string(),
            ));
        }
        if params.tolerance.is_nan() || params.tolerance <= 0.0 {
            return Err(CohortError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                params.tolerance
            )));
        }
        Ok(())
    }
}
