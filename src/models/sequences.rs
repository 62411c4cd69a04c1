//! Row-aligned output of one assembly run

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithm::sequence::vocabulary::{TokenId, Vocabulary};
use crate::models::person_index::PersonIndex;

/// Everything known about one patient after tokenization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub person_id: i64,
    /// Tokens padded to the maximum length
    pub tokens: Vec<TokenId>,
    /// Number of real tokens at the start of `tokens`
    pub valid_len: usize,
    /// Token count before truncation
    pub raw_len: usize,
    /// Codes coerced to the padding id
    pub unknown_codes: usize,
    /// Binary outcome label
    pub outcome: u8,
}

/// Diagnostic summary of an assembly run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySummary {
    pub patients: usize,
    pub max_len: usize,
    pub vocabulary_size: usize,
    /// Longest untruncated sequence seen
    pub max_raw_len: usize,
    pub truncated_sequences: usize,
    pub unknown_codes: usize,
    pub dropped_events: usize,
    pub outcome_positives: usize,
    pub outcome_rate: f64,
}

impl AssemblySummary {
    /// Shape of the token matrix, `(patients, max_len)`
    #[must_use]
    pub fn token_matrix_shape(&self) -> (usize, usize) {
        (self.patients, self.max_len)
    }
}

impl fmt::Display for AssemblySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.token_matrix_shape();
        writeln!(f, "Sequence Assembly Summary:")?;
        writeln!(f, "  Patients: {}", self.patients)?;
        writeln!(f, "  Vocabulary Size: {}", self.vocabulary_size)?;
        writeln!(f, "  Max Raw Sequence Length: {}", self.max_raw_len)?;
        writeln!(f, "  Token Matrix Shape: ({rows}, {cols})")?;
        writeln!(f, "  Valid Lengths Shape: ({rows},)")?;
        writeln!(f, "  Outcomes Shape: ({rows},)")?;
        writeln!(
            f,
            "  Outcome Positives: {} ({:.2}%)",
            self.outcome_positives,
            self.outcome_rate * 100.0
        )?;
        writeln!(f, "  Truncated Sequences: {}", self.truncated_sequences)?;
        writeln!(f, "  Unknown Codes: {}", self.unknown_codes)?;
        write!(f, "  Dropped Events: {}", self.dropped_events)
    }
}

/// Parallel per-patient arrays produced by one assembly run
///
/// Row `i` of every array belongs to `person_index.person_at(i)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSequences {
    /// Row-major `N x max_len` token matrix
    pub token_matrix: Vec<TokenId>,
    pub max_len: usize,
    pub valid_lengths: Vec<u32>,
    pub outcomes: Vec<u8>,
    pub person_index: PersonIndex,
    pub vocabulary: Vocabulary,
    pub summary: AssemblySummary,
}

impl PatientSequences {
    /// Project per-patient records into row-aligned arrays in one pass
    ///
    /// Records must already be in their final row order and padded to `max_len`.
    pub fn from_records(
        records: Vec<PatientRecord>,
        max_len: usize,
        vocabulary: Vocabulary,
        summary: AssemblySummary,
    ) -> crate::error::Result<Self> {
        let n = records.len();
        let mut token_matrix = Vec::with_capacity(n * max_len);
        let mut valid_lengths = Vec::with_capacity(n);
        let mut outcomes = Vec::with_capacity(n);
        let mut ids = Vec::with_capacity(n);

        for record in records {
            debug_assert_eq!(record.tokens.len(), max_len);
            token_matrix.extend_from_slice(&record.tokens);
            // max_len is validated to fit in u32
            valid_lengths.push(record.valid_len as u32);
            outcomes.push(record.outcome);
            ids.push(record.person_id);
        }

        Ok(Self {
            token_matrix,
            max_len,
            valid_lengths,
            outcomes,
            person_index: PersonIndex::from_ids(ids)?,
            vocabulary,
            summary,
        })
    }

    /// Number of patients (rows)
    #[must_use]
    pub fn len(&self) -> usize {
        self.valid_lengths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid_lengths.is_empty()
    }

    /// Padded tokens of one row
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[TokenId]> {
        let start = row.checked_mul(self.max_len)?;
        self.token_matrix.get(start..start + self.max_len)
    }

    /// Padded tokens of one patient
    #[must_use]
    pub fn tokens_for(&self, person_id: i64) -> Option<&[TokenId]> {
        self.row(self.person_index.row_of(person_id)?)
    }

    /// Real (unpadded) tokens of one row
    #[must_use]
    pub fn valid_row(&self, row: usize) -> Option<&[TokenId]> {
        let len = *self.valid_lengths.get(row)? as usize;
        self.row(row).map(|tokens| &tokens[..len])
    }
}
