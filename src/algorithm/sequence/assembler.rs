//! Patient sequence assembly
//!
//! Turns the raw event table into a padded token matrix, one row per patient,
//! with the outcome label and valid length of each row and the person index
//! tying rows back to patients.
//!
//! Rows are ordered by ascending person id. Each patient is first built as a
//! [`PatientRecord`] and the records are projected into the parallel output
//! arrays in a single pass, so row `i` refers to the same patient in every
//! array.

use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Int64Array};
use arrow::compute::{and, filter_record_batch, is_not_null};
use arrow::datatypes::{DataType, Date32Type, Field, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::algorithm::outcome::labeler::OutcomeLabeler;
use crate::algorithm::sequence::tokenizer::{Tokenizer, pad_sequence};
use crate::algorithm::sequence::vocabulary::Vocabulary;
use crate::config::{OutputConfig, PipelineConfig};
use crate::error::Result;
use crate::models::sequences::{AssemblySummary, PatientRecord, PatientSequences};
use crate::schema::{date_column, id_column, require_columns, tables};
use crate::utils::arrow::{stable_sort_indices, take_batch};
use crate::utils::io::artifacts::{ArtifactPaths, write_sequences};
use crate::utils::logging::{finish_and_clear, task_progress_bar};

/// Normalized event columns, sorted by person and date
struct SortedEvents {
    person_ids: Int64Array,
    concept_ids: Int64Array,
    event_days: Date32Array,
    dropped: usize,
}

/// Builds [`PatientSequences`] from the three input tables
#[derive(Debug, Clone)]
pub struct SequenceAssembler<'a> {
    config: &'a PipelineConfig,
    vocabulary: Option<Vocabulary>,
}

impl<'a> SequenceAssembler<'a> {
    #[must_use]
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            vocabulary: None,
        }
    }

    /// Tokenize against an existing vocabulary instead of building one
    ///
    /// Codes outside the vocabulary are coerced to the padding id and counted.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Assemble sequences, labels and the person index
    ///
    /// # Errors
    /// Fails before any processing when a required column is missing from one
    /// of the tables, or when the configuration is invalid.
    pub fn assemble(
        &self,
        events: &RecordBatch,
        index: &RecordBatch,
        outcomes: &RecordBatch,
        index_date_column: &str,
    ) -> Result<PatientSequences> {
        let start = Instant::now();
        self.config.validate()?;
        let columns = &self.config.columns;
        require_columns(
            events,
            tables::EVENT,
            &[
                columns.person_id.as_str(),
                columns.concept_id.as_str(),
                columns.event_date.as_str(),
            ],
        )?;

        // 1. Outcome labels over the whole index table
        let labels = OutcomeLabeler::from_config(self.config).label(
            index,
            outcomes,
            index_date_column,
        )?;
        let label_by_person = labels.first_per_person()?;

        // 2. Normalize and sort events by (person, date)
        let sorted = self.sort_events(events)?;

        // 3. Vocabulary over the full event table
        let vocabulary = match &self.vocabulary {
            Some(vocabulary) => vocabulary.clone(),
            None => Vocabulary::from_code_array(&sorted.concept_ids),
        };
        info!(
            "Vocabulary has {} tokens ({} concept codes)",
            vocabulary.len(),
            vocabulary.code_count()
        );

        // 4-6. Group per patient, join the label, tokenize and pad
        let records = self.build_records(&sorted, &vocabulary, &label_by_person);
        let summary = summarize(&records, &vocabulary, self.config.max_len, sorted.dropped);

        // 7. Project into row-aligned arrays
        let sequences =
            PatientSequences::from_records(records, self.config.max_len, vocabulary, summary)?;

        if sequences.summary.truncated_sequences > 0 {
            warn!(
                "{} sequences exceeded {} tokens and were truncated to their most recent suffix",
                sequences.summary.truncated_sequences, self.config.max_len
            );
        }
        if sequences.summary.unknown_codes > 0 {
            warn!(
                "{} codes were not in the vocabulary and were mapped to the padding id",
                sequences.summary.unknown_codes
            );
        }
        info!("{}", sequences.summary);
        info!("Assembled {} patient sequences in {:?}", sequences.len(), start.elapsed());

        Ok(sequences)
    }

    /// Assemble and persist the full artifact set
    pub fn assemble_and_persist(
        &self,
        events: &RecordBatch,
        index: &RecordBatch,
        outcomes: &RecordBatch,
        index_date_column: &str,
        output: &OutputConfig,
    ) -> Result<(PatientSequences, ArtifactPaths)> {
        let sequences = self.assemble(events, index, outcomes, index_date_column)?;
        let paths = write_sequences(&sequences, output)?;
        Ok((sequences, paths))
    }

    fn sort_events(&self, events: &RecordBatch) -> Result<SortedEvents> {
        let columns = &self.config.columns;
        let person_ids = id_column(events, tables::EVENT, &columns.person_id)?;
        let concept_ids = id_column(events, tables::EVENT, &columns.concept_id)?;
        let event_days = date_column(
            events,
            tables::EVENT,
            &columns.event_date,
            &self.config.date_format,
        )?;

        let schema = Schema::new(vec![
            Field::new("person_id", DataType::Int64, true),
            Field::new("concept_id", DataType::Int64, true),
            Field::new("event_date", DataType::Date32, true),
        ]);
        let mut normalized = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(person_ids.clone()),
                Arc::new(concept_ids),
                Arc::new(event_days.clone()),
            ],
        )?;

        let mut dropped = 0;
        if person_ids.null_count() > 0 || event_days.null_count() > 0 {
            let keep = and(&is_not_null(&person_ids)?, &is_not_null(&event_days)?)?;
            let before = normalized.num_rows();
            normalized = filter_record_batch(&normalized, &keep)?;
            dropped = before - normalized.num_rows();
            warn!("Dropped {dropped} events without a person id or event date");
        }

        let keys: [ArrayRef; 2] = [normalized.column(0).clone(), normalized.column(2).clone()];
        let order = stable_sort_indices(&keys)?;
        let sorted = take_batch(&normalized, &order)?;
        debug!("Sorted {} events by person and date", sorted.num_rows());

        Ok(SortedEvents {
            person_ids: sorted.column(0).as_primitive::<Int64Type>().clone(),
            concept_ids: sorted.column(1).as_primitive::<Int64Type>().clone(),
            event_days: sorted.column(2).as_primitive::<Date32Type>().clone(),
            dropped,
        })
    }

    fn build_records(
        &self,
        events: &SortedEvents,
        vocabulary: &Vocabulary,
        label_by_person: &FxHashMap<i64, u8>,
    ) -> Vec<PatientRecord> {
        let max_len = self.config.max_len;
        let tokenizer = Tokenizer::new(vocabulary, max_len);
        let codes: Vec<Option<i64>> = events.concept_ids.iter().collect();
        let days = events.event_days.values();

        // Consecutive runs of the same person id
        let mut groups = Vec::new();
        let mut offset = 0;
        for (count, &person_id) in events.person_ids.values().iter().dedup_with_count() {
            groups.push((person_id, offset..offset + count));
            offset += count;
        }

        let missing_labels = groups
            .iter()
            .filter(|(person_id, _)| !label_by_person.contains_key(person_id))
            .count();
        if missing_labels > 0 {
            warn!("{missing_labels} patients have events but no index date; labeled 0");
        }

        let progress = task_progress_bar(
            groups.len() as u64,
            "Tokenizing patients",
            self.config.show_progress,
        );

        let records = groups
            .par_iter()
            .progress_with(progress.clone())
            .map(|(person_id, range)| {
                let encoded = tokenizer.encode(&codes[range.clone()], &days[range.clone()]);
                PatientRecord {
                    person_id: *person_id,
                    tokens: pad_sequence(&encoded.tokens, max_len),
                    valid_len: encoded.tokens.len(),
                    raw_len: encoded.raw_len,
                    unknown_codes: encoded.unknown_codes,
                    outcome: label_by_person.get(person_id).copied().unwrap_or(0),
                }
            })
            .collect();

        finish_and_clear(&progress);
        records
    }
}

fn summarize(
    records: &[PatientRecord],
    vocabulary: &Vocabulary,
    max_len: usize,
    dropped_events: usize,
) -> AssemblySummary {
    let patients = records.len();
    let outcome_positives = records.iter().filter(|r| r.outcome == 1).count();
    AssemblySummary {
        patients,
        max_len,
        vocabulary_size: vocabulary.len(),
        max_raw_len: records.iter().map(|r| r.raw_len).max().unwrap_or(0),
        truncated_sequences: records.iter().filter(|r| r.raw_len > r.valid_len).count(),
        unknown_codes: records.iter().map(|r| r.unknown_codes).sum(),
        dropped_events,
        outcome_positives,
        outcome_rate: if patients == 0 {
            0.0
        } else {
            outcome_positives as f64 / patients as f64
        },
    }
}
