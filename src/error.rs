//! Error taxonomy for the analytics core.
//!
//! Insufficient data and numeric instability in the estimators are *expected*
//! outcomes and travel as `Ok(None)` from the functions that can hit them;
//! the variants here cover conditions the caller must not ignore: invalid
//! requests, malformed input tables, and clustering failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller-side programming error: rejected before any computation runs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Too little data for the requested computation.
    #[error("insufficient data for {context}: have {actual}, need at least {needed}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        actual: usize,
    },

    /// A required column held a null where the schema forbids one.
    #[error("null value in required column '{column}' at row {row}")]
    NullValue { column: &'static str, row: usize },

    /// Timestamp string that matches none of the accepted formats.
    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),

    #[error("clustering failed: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),

    #[error(transparent)]
    Frame(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
