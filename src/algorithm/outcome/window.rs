//! Vectorized day-window arithmetic shared by the outcome and mortality labelers

use arrow::array::{Array, AsArray, BooleanArray, Date32Array, Int32Array};
use arrow::compute::kernels::{boolean, cast, cmp, numeric};
use arrow::compute::prep_null_mask_filter;
use arrow::datatypes::{DataType, Int32Type};

use crate::config::DayWindow;
use crate::error::Result;

/// Elapsed days `end - start` per row; null where either date is missing
pub fn elapsed_days(start: &Date32Array, end: &Date32Array) -> Result<Int32Array> {
    let start = cast::cast(start, &DataType::Int32)?;
    let end = cast::cast(end, &DataType::Int32)?;
    let elapsed = numeric::sub(&end, &start)?;
    Ok(elapsed.as_primitive::<Int32Type>().clone())
}

/// Whether each elapsed day count lies inside the inclusive window
///
/// Missing values never qualify: the result has no nulls.
pub fn within_window(elapsed: &Int32Array, window: DayWindow) -> Result<BooleanArray> {
    let above = cmp::gt_eq(elapsed, &Int32Array::new_scalar(window.lower))?;
    let below = cmp::lt_eq(elapsed, &Int32Array::new_scalar(window.upper))?;
    let inside = boolean::and(&above, &below)?;
    if inside.null_count() > 0 {
        Ok(prep_null_mask_filter(&inside))
    } else {
        Ok(inside)
    }
}

/// Label rows whose `end` date falls inside the window measured from `start`
pub fn window_labels(
    start: &Date32Array,
    end: &Date32Array,
    window: DayWindow,
) -> Result<BooleanArray> {
    within_window(&elapsed_days(start, end)?, window)
}
