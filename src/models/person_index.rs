//! Person id to row index mapping
//!
//! Every persisted array of a run is row-aligned through this mapping: row `i`
//! of the token matrix, the valid lengths, the outcome labels and any later
//! label array (mortality) belong to `person_at(i)`.

use std::sync::Arc;

use arrow::array::{Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};
use crate::schema::{id_column, tables};

pub const PERSON_ID_COLUMN: &str = "person_id";
pub const ROW_INDEX_COLUMN: &str = "row_index";

/// Bijection between person ids and row positions `0..N`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersonIndex {
    ids: Vec<i64>,
    rows: FxHashMap<i64, usize>,
}

impl PersonIndex {
    /// Create a mapping where row `i` belongs to `ids[i]`
    pub fn from_ids(ids: Vec<i64>) -> Result<Self> {
        let mut rows = FxHashMap::default();
        rows.reserve(ids.len());
        for (row, &id) in ids.iter().enumerate() {
            if rows.insert(id, row).is_some() {
                return Err(PipelineError::artifact(format!(
                    "person id {id} appears more than once in the person index"
                )));
            }
        }
        Ok(Self { ids, rows })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Person id stored at a row
    #[must_use]
    pub fn person_at(&self, row: usize) -> Option<i64> {
        self.ids.get(row).copied()
    }

    /// Row of a person id
    #[must_use]
    pub fn row_of(&self, person_id: i64) -> Option<usize> {
        self.rows.get(&person_id).copied()
    }

    /// Person ids in row order
    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// `(person_id, row)` pairs in row order
    pub fn iter(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.ids.iter().enumerate().map(|(row, &id)| (id, row))
    }

    /// Two-column table `person_id, row_index`, one row per patient
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new(PERSON_ID_COLUMN, DataType::Int64, false),
            Field::new(ROW_INDEX_COLUMN, DataType::Int64, false),
        ]);
        let rows: Int64Array = (0_i64..).take(self.ids.len()).map(Some).collect();
        Ok(RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(self.ids.clone())),
                Arc::new(rows),
            ],
        )?)
    }

    /// Rebuild the mapping from its tabular form
    ///
    /// Rows may come in any order, but the row indices must cover `0..N`
    /// exactly once and person ids must be unique.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let ids = id_column(batch, tables::PERSON_INDEX, PERSON_ID_COLUMN)?;
        let rows = id_column(batch, tables::PERSON_INDEX, ROW_INDEX_COLUMN)?;
        if ids.null_count() > 0 || rows.null_count() > 0 {
            return Err(PipelineError::artifact("person index contains missing values"));
        }

        let n = batch.num_rows();
        let mut slots: Vec<Option<i64>> = vec![None; n];
        for (id, row) in ids.values().iter().zip(rows.values()) {
            let slot = usize::try_from(*row)
                .ok()
                .and_then(|row| slots.get_mut(row))
                .ok_or_else(|| {
                    PipelineError::artifact(format!("row index {row} is outside 0..{n}"))
                })?;
            if slot.replace(*id).is_some() {
                return Err(PipelineError::artifact(format!(
                    "row index {row} is assigned more than once"
                )));
            }
        }

        // n slots filled by n distinct rows, so none can be empty
        Self::from_ids(slots.into_iter().flatten().collect())
    }
}
