//! FILENAME: core/pivot-table/src/error.rs

use thiserror::Error;

/// Reasons a layout cannot be used to build a table.
/// The messages are shown to the end user as-is.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("At least one dimension must be specified as row or column")]
    MissingRowOrColumn,

    #[error("At least one period must be specified as column, row or filter")]
    MissingPeriod,

    #[error("Layout configuration must be a JSON object")]
    NotAnObject,

    #[error("Invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The analytics response does not have the shape the engine needs.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Data invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data invalid: response has no headers")]
    MissingHeaders,

    #[error("Data invalid: row {row} has {found} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Data invalid: response has no value header")]
    MissingValueHeader,

    #[error("Data invalid: no header for dimension '{0}'")]
    MissingDimensionHeader(String),
}

/// Top-level error for building a pivot table.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("Dimension '{0}' has no items")]
    EmptyDimension(String),

    #[error("{message}")]
    Network { status: u16, message: String },
}

impl PivotError {
    /// Maps an HTTP failure from the analytics fetch to a user-facing error.
    pub fn network(status: u16, url: &str) -> Self {
        let message = crate::request::status_message(status, url)
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        PivotError::Network { status, message }
    }
}
