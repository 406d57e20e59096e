//! Table loading, column access and feature scaling using Polars and ndarray

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use tracing::debug;

use crate::error::{CohortError, Result};

/// Load a CSV event table with every column read as text.
///
/// Schema inference is disabled so identifiers keep leading zeros and event
/// cells are never coerced into numbers.
pub fn load_table(file_path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = file_path.as_ref();
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    debug!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Write a table to CSV with a header row.
pub fn write_table(df: &mut DataFrame, file_path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(file_path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Fail with [`CohortError::MissingColumn`] if any column is absent.
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    for column in columns {
        if df.get_column_index(column).is_none() {
            return Err(CohortError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Read the identifier column as text, rejecting nulls and duplicates.
pub fn read_identifiers(df: &DataFrame, table: &str, id_column: &str) -> Result<Vec<String>> {
    let ids = df.column(id_column)?.cast(&DataType::String)?;
    let ids = ids.str()?;

    let mut seen = HashSet::with_capacity(ids.len());
    let mut out = Vec::with_capacity(ids.len());
    for (row, id) in ids.into_iter().enumerate() {
        let id = id.ok_or_else(|| CohortError::MissingIdentifier {
            table: table.to_string(),
            row,
        })?;
        if !seen.insert(id) {
            return Err(CohortError::DuplicateIdentifier {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        out.push(id.to_string());
    }
    Ok(out)
}

/// Read an event column cell by cell.
///
/// Cells of a non-text column, and null cells, come back as `None` so the
/// decoder treats them as empty.
pub fn read_text_cells<'a>(df: &'a DataFrame, column: &str) -> Result<Vec<Option<&'a str>>> {
    let series = df.column(column)?;
    if series.dtype() != &DataType::String {
        debug!(
            "Column '{}' has dtype {}; treating every cell as empty",
            column,
            series.dtype()
        );
        return Ok(vec![None; series.len()]);
    }
    Ok(series.str()?.into_iter().collect())
}

/// Standardizes features to zero mean and unit variance.
///
/// Uses the population standard deviation; constant columns keep a scale of
/// one so they map to zero instead of dividing by zero.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    /// Per-column mean of the fitted data
    pub mean: Array1<f64>,
    /// Per-column standard deviation of the fitted data
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit the scaler on a (n_samples, n_features) matrix
    pub fn fit(features: &Array2<f64>) -> Self {
        let mean = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features.ncols()));
        let scale = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 0.0 { s } else { 1.0 });
        Self { mean, scale }
    }

    /// Apply the fitted scaling to a matrix with the same column layout
    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.mean) / &self.scale
    }
}
