//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ClusterParams, PipelineConfig};
use crate::features::{DEFAULT_CLICK_COLUMN, DEFAULT_VIEW_COLUMN};

/// Click and view event cohort analysis using K-Means clustering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the click events CSV file
    #[arg(long)]
    pub clicks: PathBuf,

    /// Path to the view events CSV file
    #[arg(long)]
    pub views: PathBuf,

    /// Header of the click events column
    #[arg(long, default_value = DEFAULT_CLICK_COLUMN)]
    pub click_column: String,

    /// Header of the view events column
    #[arg(long, default_value = DEFAULT_VIEW_COLUMN)]
    pub view_column: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Random seed for centroid initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of K-Means initializations; the lowest-inertia run is kept
    #[arg(long, default_value = "10")]
    pub n_init: usize,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Directory for the exported CSV files
    #[arg(short, long, default_value = "cohorts")]
    pub output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "COHORTFORGE_LOG")]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the pipeline configuration from the parsed flags
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new();
        config.click.column = self.click_column.clone();
        config.view.column = self.view_column.clone();
        config.clustering = ClusterParams {
            n_clusters: self.clusters,
            random_state: self.seed,
            n_init: self.n_init,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
        };
        config
    }
}
