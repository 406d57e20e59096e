//! Console report and CSV export of cohort results

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::data::write_table;
use crate::error::Result;
use crate::model::CohortResult;

/// File name of the clustered feature table
pub const FEATURES_FILE: &str = "features_with_clusters.csv";
/// File name of the mean summary
pub const MEAN_SUMMARY_FILE: &str = "summary_mean.csv";
/// File name of the median summary
pub const MEDIAN_SUMMARY_FILE: &str = "summary_median.csv";

/// File name of one cohort's identifier list
pub fn cohort_file_name(label: usize) -> String {
    format!("cluster_{}_mlids.csv", label)
}

/// Print cluster statistics to console
pub fn print_cluster_statistics(result: &CohortResult) -> Result<()> {
    let stdout = io::stdout();
    write_cluster_statistics(result, &mut stdout.lock())?;
    Ok(())
}

/// Write cluster sizes, inertia and both summaries as text
pub fn write_cluster_statistics<W: Write>(result: &CohortResult, out: &mut W) -> io::Result<()> {
    let total = result.features.height();
    let model = &result.model;

    writeln!(out, "\n=== Cluster Statistics ===")?;
    writeln!(out, "Number of clusters: {}", model.n_clusters)?;
    writeln!(out, "Total users: {}", total)?;
    writeln!(
        out,
        "Within-cluster sum of squares (Inertia): {:.2}",
        model.inertia
    )?;

    writeln!(out, "\nCluster sizes:")?;
    for (i, &size) in result.cluster_sizes().iter().enumerate() {
        let percentage = if total > 0 {
            (size as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        writeln!(out, "  Cluster {}: {} users ({:.1}%)", i, size, percentage)?;
    }

    writeln!(out, "\n=== Cluster Summary (mean) ===")?;
    writeln!(out, "{}", result.summary_mean)?;
    writeln!(out, "\n=== Cluster Summary (median) ===")?;
    writeln!(out, "{}", result.summary_median)
}

/// Identifier list of one cohort as a single-column table
pub fn cohort_table(result: &CohortResult, label: usize, id_column: &str) -> Result<DataFrame> {
    let members = result.members(label);
    Ok(DataFrame::new(vec![Series::new(id_column, members)])?)
}

/// Write the clustered table, both summaries and one identifier list per
/// produced cohort into `output_dir`. Returns the written paths.
pub fn export_artifacts(
    result: &CohortResult,
    output_dir: impl AsRef<Path>,
    id_column: &str,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    let tables = [
        (FEATURES_FILE, &result.clustered),
        (MEAN_SUMMARY_FILE, &result.summary_mean),
        (MEDIAN_SUMMARY_FILE, &result.summary_median),
    ];
    for (name, table) in tables {
        let path = output_dir.join(name);
        write_table(&mut table.clone(), &path)?;
        written.push(path);
    }

    for label in result.present_labels() {
        let path = output_dir.join(cohort_file_name(label));
        write_table(&mut cohort_table(result, label, id_column)?, &path)?;
        written.push(path);
    }

    debug!("Wrote {} files to {}", written.len(), output_dir.display());
    Ok(written)
}
