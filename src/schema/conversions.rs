//! Normalization of input columns to the types the pipeline computes on.
//!
//! Identifier columns become `Int64`, date columns become `Date32`. Everything
//! downstream works on these two representations only.

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Int64Array, StringArray};
use arrow::compute::is_not_null;
use arrow::compute::kernels::{boolean, cast};
use arrow::datatypes::{DataType, Date32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use log::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::schema::date_utils::{DateFormatConfig, date_to_days, parse_date_string};

/// Look up a column by name, failing with a schema violation if it is missing
pub fn get_column(batch: &RecordBatch, table: &str, column_name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(column_name)
        .cloned()
        .ok_or_else(|| PipelineError::column_not_found(table, column_name))
}

/// Check that every named column exists before any processing starts
pub fn require_columns(batch: &RecordBatch, table: &str, columns: &[&str]) -> Result<()> {
    for column in columns {
        get_column(batch, table, column)?;
    }
    Ok(())
}

/// Extract an identifier or code column as `Int64`
///
/// Integer, float and numeric string columns are accepted. Missing values stay
/// null, but a present value that does not convert to an integer (`"P1"`, NaN)
/// fails the whole column with [`PipelineError::InvalidIdentifier`].
pub fn id_column(batch: &RecordBatch, table: &str, column_name: &str) -> Result<Int64Array> {
    let column = get_column(batch, table, column_name)?;
    let converted = match column.data_type() {
        DataType::Int64 => column.clone(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64
        | DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Null => {
            debug!(
                "Converting column '{column_name}' from {:?} to Int64",
                column.data_type()
            );
            cast::cast(&column, &DataType::Int64)?
        }
        other => {
            return Err(PipelineError::UnsupportedType {
                table: table.to_string(),
                column: column_name.to_string(),
                data_type: other.clone(),
            });
        }
    };
    // Logical counts, since an all-null `Null` column has no validity buffer
    if converted.logical_null_count() > column.logical_null_count() {
        return Err(invalid_identifiers(&column, &converted, table, column_name)?);
    }
    Ok(converted.as_primitive::<Int64Type>().clone())
}

/// Describe the values a safe cast turned into null
fn invalid_identifiers(
    original: &ArrayRef,
    converted: &ArrayRef,
    table: &str,
    column_name: &str,
) -> Result<PipelineError> {
    let lost = boolean::and_not(&is_not_null(original)?, &is_not_null(converted)?)?;
    let count = lost.true_count();
    let example = match lost.values().set_indices().next() {
        Some(row) => array_value_to_string(original, row)?,
        None => String::new(),
    };
    Ok(PipelineError::InvalidIdentifier {
        table: table.to_string(),
        column: column_name.to_string(),
        count,
        example,
    })
}

/// Extract a date column as `Date32`
///
/// Timestamps are truncated to their calendar day and strings are parsed with
/// the configured formats. Values that cannot be parsed become null and are
/// reported in a single warning per column.
pub fn date_column(
    batch: &RecordBatch,
    table: &str,
    column_name: &str,
    config: &DateFormatConfig,
) -> Result<Date32Array> {
    let column = get_column(batch, table, column_name)?;
    match column.data_type() {
        DataType::Date32 => Ok(column.as_primitive::<Date32Type>().clone()),
        DataType::Date64 | DataType::Timestamp(_, _) | DataType::Null => {
            let converted = cast::cast(&column, &DataType::Date32)?;
            Ok(converted.as_primitive::<Date32Type>().clone())
        }
        DataType::LargeUtf8 => {
            let utf8 = cast::cast(&column, &DataType::Utf8)?;
            Ok(parse_date_strings(utf8.as_string::<i32>(), table, column_name, config))
        }
        DataType::Utf8 => Ok(parse_date_strings(
            column.as_string::<i32>(),
            table,
            column_name,
            config,
        )),
        other => Err(PipelineError::UnsupportedType {
            table: table.to_string(),
            column: column_name.to_string(),
            data_type: other.clone(),
        }),
    }
}

fn parse_date_strings(
    strings: &StringArray,
    table: &str,
    column_name: &str,
    config: &DateFormatConfig,
) -> Date32Array {
    let mut unparsed = 0usize;
    let days: Date32Array = strings
        .iter()
        .map(|value| {
            let value = value?;
            // Empty cells in CSV input mean "absent", not "malformed"
            if value.trim().is_empty() {
                return None;
            }
            let parsed = parse_date_string(value, config).map(date_to_days);
            if parsed.is_none() {
                unparsed += 1;
            }
            parsed
        })
        .collect();

    if unparsed > 0 {
        warn!(
            "{unparsed} values in column '{column_name}' of the {table} table could not be parsed as dates and were treated as missing"
        );
    }
    days
}
