//! Bulk helpers over Arrow arrays.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Int64Array, UInt32Array};
use arrow::compute::kernels::cmp;
use arrow::compute::{SortColumn, SortOptions, concat, lexsort_to_indices, take_record_batch};
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Ascending sort order with nulls placed last
pub const ASCENDING_NULLS_LAST: SortOptions = SortOptions {
    descending: false,
    nulls_first: false,
};

/// Stable lexicographic sort indices over several key columns
///
/// Rows that compare equal on every key keep their input order, which makes
/// the result independent of the sort algorithm.
pub fn stable_sort_indices(keys: &[ArrayRef]) -> Result<UInt32Array> {
    let num_rows = keys.first().map_or(0, |k| k.len());
    let positions: ArrayRef = Arc::new(UInt32Array::from_iter_values(
        (0..u32::MAX).take(num_rows),
    ));

    let columns: Vec<SortColumn> = keys
        .iter()
        .chain(std::iter::once(&positions))
        .map(|values| SortColumn {
            values: values.clone(),
            options: Some(ASCENDING_NULLS_LAST),
        })
        .collect();

    Ok(lexsort_to_indices(&columns, None)?)
}

/// Reorder every column of a batch by the given indices
pub fn take_batch(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    Ok(take_record_batch(batch, indices)?)
}

/// Mask of the first row of every run of equal values in a sorted, null-free
/// key column
///
/// Filtering a batch sorted by `(key, value)` with this mask keeps the smallest
/// value per key.
pub fn run_starts(sorted: &Int64Array) -> Result<BooleanArray> {
    if sorted.is_empty() {
        return Ok(BooleanArray::from(Vec::<bool>::new()));
    }
    let len = sorted.len() - 1;
    let changed = cmp::neq(&sorted.slice(1, len), &sorted.slice(0, len))?;
    let starts = concat(&[&BooleanArray::from(vec![true]), &changed])?;
    Ok(starts.as_boolean().clone())
}

/// Count the true values of a mask, treating nulls as false
#[must_use]
pub fn count_true(mask: &BooleanArray) -> usize {
    mask.iter().filter(|v| *v == Some(true)).count()
}
