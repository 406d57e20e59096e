//! End-to-end batch pipeline
//!
//! raw click table + raw view table → decode → extract → join → cluster
//! → {clustered table, mean summary, median summary}

use polars::prelude::DataFrame;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::data::require_columns;
use crate::error::Result;
use crate::features::{assemble, FeatureFrame};
use crate::model::{cluster_and_summary, CohortResult};

/// Extract click and view features and inner-join them on the identifier.
///
/// Both tables are checked for their required columns before any row is
/// decoded.
pub fn build_feature_table(
    click_df: &DataFrame,
    view_df: &DataFrame,
    config: &PipelineConfig,
) -> Result<FeatureFrame> {
    let id = config.id_column.as_str();
    require_columns(click_df, "click", &[id, config.click.column.as_str()])?;
    require_columns(view_df, "view", &[id, config.view.column.as_str()])?;

    let clicks = config.click.extract(click_df, id)?;
    let views = config.view.extract(view_df, id)?;
    assemble(&clicks, &views)
}

/// Run the whole pipeline. Nothing is returned on a fatal error.
pub fn run_pipeline(
    click_df: &DataFrame,
    view_df: &DataFrame,
    config: &PipelineConfig,
) -> Result<CohortResult> {
    config.validate()?;
    debug!(
        "Running pipeline on {} click rows and {} view rows",
        click_df.height(),
        view_df.height()
    );

    let features = build_feature_table(click_df, view_df, config)?;
    cluster_and_summary(features, &config.clustering)
}
