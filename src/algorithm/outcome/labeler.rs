//! Outcome labeling
//!
//! Left-joins each patient's outcome date onto the index-date table and labels
//! the row 1 when the outcome falls inside the follow-up window measured from
//! the index date. Patients without an outcome are labeled 0.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Date32Array, Int64Array};
use arrow::compute::{and, filter, filter_record_batch, is_not_null};
use arrow::datatypes::{DataType, Date32Type, Field, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::algorithm::outcome::window::window_labels;
use crate::config::{ColumnNames, DayWindow, PipelineConfig};
use crate::error::Result;
use crate::schema::{DateFormatConfig, date_column, id_column, require_columns, tables};
use crate::utils::arrow::{count_true, run_starts, stable_sort_indices, take_batch};

/// One label per index-date row, in input order
///
/// Duplicate person ids are labeled independently.
#[derive(Debug, Clone)]
pub struct OutcomeLabels {
    pub person_ids: Int64Array,
    pub index_dates: Date32Array,
    pub labels: BooleanArray,
}

impl OutcomeLabels {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn positives(&self) -> usize {
        count_true(&self.labels)
    }

    /// Label per row as 0/1
    #[must_use]
    pub fn values(&self) -> Vec<u8> {
        self.labels.iter().map(|v| u8::from(v == Some(true))).collect()
    }

    /// One label per patient, taken from the patient's earliest index date
    ///
    /// Rows with a missing index date lose to any dated row; exact ties keep
    /// the first row in input order.
    pub fn first_per_person(&self) -> Result<FxHashMap<i64, u8>> {
        let keys: [ArrayRef; 2] = [
            Arc::new(self.person_ids.clone()),
            Arc::new(self.index_dates.clone()),
        ];
        let order = stable_sort_indices(&keys)?;

        let mut resolved = FxHashMap::default();
        let mut duplicates = 0usize;
        for row in order.values().iter().map(|&i| i as usize) {
            match resolved.entry(self.person_ids.value(row)) {
                Entry::Vacant(slot) => {
                    slot.insert(u8::from(self.labels.value(row)));
                }
                Entry::Occupied(_) => duplicates += 1,
            }
        }

        if duplicates > 0 {
            warn!(
                "{duplicates} duplicate index-date rows resolved to each patient's earliest index date"
            );
        }
        Ok(resolved)
    }
}

/// Computes binary outcome labels over an index-date table
#[derive(Debug, Clone)]
pub struct OutcomeLabeler {
    window: DayWindow,
    person_id_column: String,
    outcome_date_column: String,
    date_format: DateFormatConfig,
}

impl OutcomeLabeler {
    #[must_use]
    pub fn new(window: DayWindow, columns: &ColumnNames, date_format: DateFormatConfig) -> Self {
        Self {
            window,
            person_id_column: columns.person_id.clone(),
            outcome_date_column: columns.outcome_date.clone(),
            date_format,
        }
    }

    /// Labeler for the MACE outcome as configured
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.outcome_window,
            &config.columns,
            config.date_format.clone(),
        )
    }

    /// Use a different outcome date column, e.g. for a second outcome source
    #[must_use]
    pub fn with_outcome_column(mut self, column: impl Into<String>) -> Self {
        self.outcome_date_column = column.into();
        self
    }

    #[must_use]
    pub fn window(&self) -> DayWindow {
        self.window
    }

    /// Label every row of the index-date table
    ///
    /// Index rows without a person id are skipped. A patient with several
    /// outcome rows is joined on the earliest outcome date. An inverted window
    /// is rejected before any column is read.
    pub fn label(
        &self,
        index: &RecordBatch,
        outcomes: &RecordBatch,
        index_date_column: &str,
    ) -> Result<OutcomeLabels> {
        self.window.validate()?;
        require_columns(
            index,
            tables::INDEX,
            &[self.person_id_column.as_str(), index_date_column],
        )?;
        require_columns(
            outcomes,
            tables::OUTCOME,
            &[
                self.person_id_column.as_str(),
                self.outcome_date_column.as_str(),
            ],
        )?;

        let mut person_ids = id_column(index, tables::INDEX, &self.person_id_column)?;
        let mut index_dates =
            date_column(index, tables::INDEX, index_date_column, &self.date_format)?;

        if person_ids.null_count() > 0 {
            warn!(
                "Skipping {} index-date rows without a person id",
                person_ids.null_count()
            );
            let keep = is_not_null(&person_ids)?;
            person_ids = filter(&person_ids, &keep)?
                .as_primitive::<Int64Type>()
                .clone();
            index_dates = filter(&index_dates, &keep)?
                .as_primitive::<Date32Type>()
                .clone();
        }

        let first_outcome = self.first_outcome_dates(outcomes)?;
        let outcome_dates: Date32Array = person_ids
            .values()
            .iter()
            .map(|id| first_outcome.get(id).copied())
            .collect();

        let labels = window_labels(&index_dates, &outcome_dates, self.window)?;
        let result = OutcomeLabels {
            person_ids,
            index_dates,
            labels,
        };

        info!(
            "Labeled {} index rows with window {}: {} positive",
            result.len(),
            self.window,
            result.positives()
        );
        Ok(result)
    }

    /// Earliest non-missing outcome day per patient
    ///
    /// Rows are sorted by `(person, date)` and reduced to the first row of each
    /// person before the map is built.
    fn first_outcome_dates(&self, outcomes: &RecordBatch) -> Result<FxHashMap<i64, i32>> {
        let ids = id_column(outcomes, tables::OUTCOME, &self.person_id_column)?;
        let dates = date_column(
            outcomes,
            tables::OUTCOME,
            &self.outcome_date_column,
            &self.date_format,
        )?;

        let schema = Schema::new(vec![
            Field::new("person_id", DataType::Int64, true),
            Field::new("outcome_date", DataType::Date32, true),
        ]);
        let mut observed = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(ids.clone()), Arc::new(dates.clone())],
        )?;
        if ids.null_count() > 0 || dates.null_count() > 0 {
            let keep = and(&is_not_null(&ids)?, &is_not_null(&dates)?)?;
            observed = filter_record_batch(&observed, &keep)?;
        }

        let keys: [ArrayRef; 2] = [observed.column(0).clone(), observed.column(1).clone()];
        let sorted = take_batch(&observed, &stable_sort_indices(&keys)?)?;
        let earliest = filter_record_batch(
            &sorted,
            &run_starts(sorted.column(0).as_primitive::<Int64Type>())?,
        )?;

        let first: FxHashMap<i64, i32> = earliest
            .column(0)
            .as_primitive::<Int64Type>()
            .values()
            .iter()
            .copied()
            .zip(earliest.column(1).as_primitive::<Date32Type>().values().iter().copied())
            .collect();
        debug!(
            "{} patients with an observed outcome date out of {} outcome rows",
            first.len(),
            outcomes.num_rows()
        );
        Ok(first)
    }
}
