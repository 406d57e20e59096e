//! K-Means cohort clustering and per-cluster summaries

use std::collections::BTreeSet;

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::ClusterParams;
use crate::data::StandardScaler;
use crate::error::{CohortError, Result};
use crate::features::FeatureFrame;

/// Name of the appended label column
pub const CLUSTER_COLUMN: &str = "cluster";

/// K-Means model wrapper with fitted parameters
#[derive(Debug)]
pub struct KMeansModel {
    /// Fitted K-Means model from linfa
    pub model: KMeans<f64, L2Dist>,
    /// Requested number of clusters
    pub n_clusters: usize,
    /// Cluster assignment per row of the training data
    pub labels: Array1<usize>,
    /// Cluster centroids in standardized space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl KMeansModel {
    /// Rows per label, indexed by label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Number of labels that received at least one row
    pub fn effective_clusters(&self) -> usize {
        self.cluster_sizes().iter().filter(|&&size| size > 0).count()
    }
}

/// Standardize `features` and fit K-Means on the result.
///
/// Every run is seeded from `params.random_state`, so identical input and
/// parameters give identical labels.
pub fn fit_kmeans(features: &Array2<f64>, params: &ClusterParams) -> Result<KMeansModel> {
    let n_clusters = params.n_clusters;
    if n_clusters == 0 {
        return Err(CohortError::InvalidConfig(
            "number of clusters must be at least 1".to_string(),
        ));
    }
    if features.nrows() < n_clusters {
        return Err(CohortError::InsufficientRows {
            requested: n_clusters,
            available: features.nrows(),
        });
    }

    let scaled = StandardScaler::fit(features).transform(features);
    let dataset = DatasetBase::from(scaled.clone());

    let rng = StdRng::seed_from_u64(params.random_state);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .n_runs(params.n_init)
        .max_n_iterations(params.max_iters)
        .tolerance(params.tolerance)
        .fit(&dataset)
        .map_err(|e| CohortError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&scaled);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(&scaled, &labels, &centroids);

    debug!(
        "Fitted K-Means on {} rows x {} features",
        scaled.nrows(),
        scaled.ncols()
    );

    Ok(KMeansModel {
        model,
        n_clusters,
        labels,
        centroids,
        inertia,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            inertia += point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
        }
    }

    inertia
}

/// Clustered feature table plus its summaries.
#[derive(Debug)]
pub struct CohortResult {
    /// Feature table with the appended `cluster` column
    pub clustered: DataFrame,
    /// Per-cluster mean of every feature, sorted by label
    pub summary_mean: DataFrame,
    /// Per-cluster median of every feature, sorted by label
    pub summary_median: DataFrame,
    /// Joined features the model was fitted on
    pub features: FeatureFrame,
    /// User identifiers in row order
    pub ids: Vec<String>,
    pub model: KMeansModel,
}

impl CohortResult {
    /// Label of every row, in table order
    pub fn labels(&self) -> &Array1<usize> {
        &self.model.labels
    }

    /// Rows per label, indexed by label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        self.model.cluster_sizes()
    }

    /// Number of cohorts that actually received rows
    pub fn effective_clusters(&self) -> usize {
        self.model.effective_clusters()
    }

    /// Labels that received at least one row
    pub fn present_labels(&self) -> Vec<usize> {
        self.model
            .labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Identifiers assigned to `label`, in table order
    pub fn members(&self, label: usize) -> Vec<&str> {
        self.ids
            .iter()
            .zip(self.model.labels.iter())
            .filter(|(_, &l)| l == label)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Cluster the feature table and aggregate each cohort.
pub fn cluster_and_summary(features: FeatureFrame, params: &ClusterParams) -> Result<CohortResult> {
    let matrix = features.to_matrix()?;
    let model = fit_kmeans(&matrix, params)?;

    let effective = model.effective_clusters();
    if effective < model.n_clusters {
        warn!(
            "K-Means produced {} non-empty clusters out of {} requested",
            effective, model.n_clusters
        );
    }
    info!(
        "Clustered {} users into {} cohorts (inertia {:.4})",
        features.height(),
        effective,
        model.inertia
    );

    let mut clustered = features.dataframe().clone();
    let labels: Vec<i64> = model.labels.iter().map(|&l| l as i64).collect();
    clustered.with_column(Series::new(CLUSTER_COLUMN, labels))?;

    let feature_names = features.feature_names();
    let summary_mean = cluster_summary(&clustered, &feature_names, |e| e.mean())?;
    let summary_median = cluster_summary(&clustered, &feature_names, |e| e.median())?;

    Ok(CohortResult {
        clustered,
        summary_mean,
        summary_median,
        ids: features.ids()?,
        features,
        model,
    })
}

/// One row per label with `aggregate` applied to every feature column.
fn cluster_summary(
    clustered: &DataFrame,
    feature_names: &[String],
    aggregate: fn(Expr) -> Expr,
) -> Result<DataFrame> {
    let aggs: Vec<Expr> = feature_names
        .iter()
        .map(|name| aggregate(col(name.as_str())))
        .collect();

    let summary = clustered
        .clone()
        .lazy()
        .group_by([col(CLUSTER_COLUMN)])
        .agg(aggs)
        .sort([CLUSTER_COLUMN], SortMultipleOptions::default())
        .collect()?;
    Ok(summary)
}
