//! CSV input and output through `arrow::csv`

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Rows sampled for schema inference
pub const INFER_SCHEMA_ROWS: usize = 1000;

/// Read a headered CSV file into a single record batch, inferring the schema
///
/// ISO dates are inferred as `Date32`; other date layouts stay strings and are
/// parsed later by the column normalizers.
pub fn read_csv(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading csv file", path);

    let mut file = File::open(path).map_err(|e| PipelineError::io_at(path, e))?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, Some(INFER_SCHEMA_ROWS))?;
    file.rewind().map_err(|e| PipelineError::io_at(path, e))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Write a record batch as a headered CSV file
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io_at(path, e))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    log_operation_complete("wrote", path, batch.num_rows(), None);
    Ok(())
}
