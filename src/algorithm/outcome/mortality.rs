//! Mortality labels aligned to an existing person index

use std::path::PathBuf;

use arrow::array::AsArray;
use arrow::compute::filter;
use arrow::datatypes::Int64Type;
use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::algorithm::outcome::window::window_labels;
use crate::config::{ColumnNames, DayWindow, OutputConfig, PipelineConfig};
use crate::error::Result;
use crate::models::person_index::PersonIndex;
use crate::schema::{DateFormatConfig, date_column, id_column, require_columns, tables};
use crate::utils::io::artifacts::{read_person_index, write_mortality};

/// Mortality labels, row-aligned to the person index they were built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MortalityLabels {
    /// One 0/1 value per person index row
    pub labels: Vec<u8>,
    /// Death rows whose person id is not in the index
    pub unmatched_rows: usize,
}

impl MortalityLabels {
    #[must_use]
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&v| v == 1).count()
    }
}

/// Attaches a death outcome to the row order of a previous assembly run
#[derive(Debug, Clone)]
pub struct MortalityAligner {
    window: DayWindow,
    person_id_column: String,
    exposure_date_column: String,
    death_date_column: String,
    date_format: DateFormatConfig,
}

impl MortalityAligner {
    #[must_use]
    pub fn new(window: DayWindow, columns: &ColumnNames, date_format: DateFormatConfig) -> Self {
        Self {
            window,
            person_id_column: columns.person_id.clone(),
            exposure_date_column: columns.first_exposure_date.clone(),
            death_date_column: columns.death_date.clone(),
            date_format,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.mortality_window,
            &config.columns,
            config.date_format.clone(),
        )
    }

    /// Label every row of `index`: 1 when a death falls inside the window
    /// after first exposure, otherwise 0
    ///
    /// Persons missing from `index` are ignored. A person with several death
    /// rows is labeled 1 if any of them qualifies.
    pub fn align(&self, deaths: &RecordBatch, index: &PersonIndex) -> Result<MortalityLabels> {
        self.window.validate()?;
        require_columns(
            deaths,
            tables::DEATH,
            &[
                self.person_id_column.as_str(),
                self.exposure_date_column.as_str(),
                self.death_date_column.as_str(),
            ],
        )?;

        let ids = id_column(deaths, tables::DEATH, &self.person_id_column)?;
        let exposure = date_column(
            deaths,
            tables::DEATH,
            &self.exposure_date_column,
            &self.date_format,
        )?;
        let death = date_column(
            deaths,
            tables::DEATH,
            &self.death_date_column,
            &self.date_format,
        )?;
        let qualifies = window_labels(&exposure, &death, self.window)?;
        let qualifying_ids = filter(&ids, &qualifies)?;

        // Hash join against the person index, probing only qualifying rows
        let mut labels = vec![0u8; index.len()];
        for id in qualifying_ids.as_primitive::<Int64Type>().iter().flatten() {
            if let Some(row) = index.row_of(id) {
                labels[row] = 1;
            }
        }
        let unmatched_rows = ids
            .iter()
            .filter(|id| id.and_then(|id| index.row_of(id)).is_none())
            .count();

        if unmatched_rows > 0 {
            warn!("Ignoring {unmatched_rows} death rows for persons outside the person index");
        }

        let result = MortalityLabels {
            labels,
            unmatched_rows,
        };
        info!(
            "Aligned mortality labels for {} patients with window {}: {} positive",
            index.len(),
            self.window,
            result.positives()
        );
        Ok(result)
    }

    /// Align against the person index persisted in `output` and write the
    /// labels next to it
    pub fn align_and_persist(
        &self,
        deaths: &RecordBatch,
        output: &OutputConfig,
    ) -> Result<(MortalityLabels, PathBuf)> {
        let index = read_person_index(output)?;
        let labels = self.align(deaths, &index)?;
        let path = write_mortality(&labels.labels, output)?;
        Ok((labels, path))
    }
}
