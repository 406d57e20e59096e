//! CohortForge: click and view event cohort analysis using K-Means clustering
//!
//! This library decodes per-user click and view event lists, derives
//! engagement features, joins them on the user identifier and groups users
//! into cohorts with K-Means, producing mean and median summaries per cohort.

pub mod cli;
pub mod config;
pub mod data;
pub mod decode;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod report;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ClusterParams, PipelineConfig};
pub use data::{load_table, StandardScaler};
pub use decode::{decode_events, try_decode_events, Token};
pub use error::{CohortError, Result};
pub use features::{assemble, Category, ClickExtractor, FeatureFrame, ViewExtractor};
pub use model::{cluster_and_summary, fit_kmeans, CohortResult, KMeansModel, CLUSTER_COLUMN};
pub use pipeline::{build_feature_table, run_pipeline};
pub use report::{export_artifacts, print_cluster_statistics, write_cluster_statistics};
