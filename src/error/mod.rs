//! Error handling for the sequence pipeline.

use std::io;
use std::path::{Path, PathBuf};

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors raised while reading tables, building sequences or persisting artifacts
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// IO error tied to a specific path
    #[error("IO error at {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error from an Arrow compute kernel or array construction
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error (de)serializing JSON artifacts
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is missing from an input table
    #[error("Column '{column}' not found in {table} table")]
    ColumnNotFound { table: String, column: String },

    /// A required column has a type that cannot be normalized
    #[error("Column '{column}' in {table} table has unsupported type {data_type}")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: DataType,
    },

    /// Identifier values that are present but not integers
    #[error(
        "Column '{column}' in {table} table has {count} non-integer identifiers (first: '{example}')"
    )]
    InvalidIdentifier {
        table: String,
        column: String,
        count: usize,
        example: String,
    },

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted artifacts are missing, corrupt or disagree with each other
    #[error("Artifact error: {0}")]
    Artifact(String),
}

impl PipelineError {
    /// Wrap an IO error with the path it occurred at
    pub fn io_at(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::IoAt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a missing column error
    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact(message.into())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
