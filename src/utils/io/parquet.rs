//! Reading and writing Parquet files

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use itertools::Itertools;
use parquet::arrow::ArrowWriter;
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::schema::types::SchemaDescriptor;

use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Rows per batch when reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Projection mask selecting the named columns
///
/// Names missing from the file are skipped with a warning; when nothing
/// matches, `None` is returned and every column is read.
#[must_use]
pub fn create_projection(
    columns: &[&str],
    file_schema: &Schema,
    parquet_schema: &SchemaDescriptor,
) -> Option<ProjectionMask> {
    let projection = columns
        .iter()
        .filter_map(|name| match file_schema.index_of(name) {
            Ok(idx) => Some(idx),
            Err(_) => {
                log_warning(
                    &format!("Column {name} not found in parquet file, skipping"),
                    None,
                );
                None
            }
        })
        .collect_vec();

    if projection.is_empty() {
        log_warning("No projected column found, reading all columns", None);
        None
    } else {
        Some(ProjectionMask::roots(parquet_schema, projection))
    }
}

/// Read a parquet file into a single record batch
///
/// Schema metadata written by [`write_parquet`] is kept on the returned batch.
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column projection
pub fn read_parquet(path: &Path, columns: Option<&[&str]>) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path).map_err(|e| PipelineError::io_at(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(DEFAULT_BATCH_SIZE);
    let metadata = builder.schema().metadata().clone();

    let projection = columns
        .and_then(|columns| create_projection(columns, builder.schema(), builder.parquet_schema()));
    let reader = match projection {
        Some(mask) => builder.with_projection(mask).build()?,
        None => builder.build()?,
    };

    let schema = Arc::new(Schema::new_with_metadata(
        reader.schema().fields().clone(),
        metadata,
    ));
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Write a record batch to a snappy-compressed parquet file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let start = Instant::now();
    let file = File::create(path).map_err(|e| PipelineError::io_at(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    log_operation_complete("wrote", path, batch.num_rows(), Some(start.elapsed()));
    Ok(())
}
