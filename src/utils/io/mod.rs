//! Table readers and artifact persistence

pub mod artifacts;
pub mod csv;
pub mod parquet;

use std::path::Path;

use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

pub use artifacts::{
    ArtifactPaths, ArtifactSet, read_person_index, read_vocabulary, write_mortality,
    write_sequences,
};
pub use csv::{read_csv, write_csv};
pub use parquet::{read_parquet, write_parquet};

/// Read a whole input table, picking the reader from the file extension
///
/// `.parquet` and `.csv` are supported.
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("parquet") => read_parquet(path, None),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv(path),
        _ => Err(PipelineError::Config(format!(
            "unsupported table format for {}: expected .parquet or .csv",
            path.display()
        ))),
    }
}
