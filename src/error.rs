//! Error types for the cohort pipeline

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Decode failures and malformed tokens never show up here: they are
/// recovered inside the extractors and only shrink the affected counts.
#[derive(Debug, Error)]
pub enum CohortError {
    /// A required column is absent from an input table.
    #[error("Missing required column '{column}' in {table} table")]
    MissingColumn { table: String, column: String },

    /// An identifier cell is null.
    #[error("Missing identifier in {table} table at row {row}")]
    MissingIdentifier { table: String, row: usize },

    /// The same identifier appears on more than one row of a table.
    #[error("Duplicate identifier '{id}' in {table} table")]
    DuplicateIdentifier { table: String, id: String },

    /// A view duration could not be converted to a number.
    #[error("Invalid view duration {value} for identifier '{id}'")]
    InvalidDuration { id: String, value: String },

    /// The feature table has fewer rows than requested clusters.
    #[error("Number of users ({available}) must be at least equal to number of clusters ({requested})")]
    InsufficientRows { requested: usize, available: usize },

    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The clustering backend rejected the input.
    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, CohortError>;
