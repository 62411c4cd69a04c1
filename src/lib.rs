//! Tokenize EHR event tables into fixed-length patient sequences with
//! time-windowed MACE and mortality labels.
//!
//! The pipeline reads three tables (events, index dates, outcomes), builds a
//! vocabulary over concept codes, turns every patient's history into a
//! day-bucketed token sequence and labels each patient by whether the outcome
//! falls inside the follow-up window. All outputs are row-aligned through a
//! person index, which a later mortality pass reuses.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod utils;

// Core types
pub use config::{ColumnNames, DayWindow, OutputConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use models::{AssemblySummary, PatientSequences, PersonIndex};

// Pipeline stages
pub use algorithm::outcome::{MortalityAligner, MortalityLabels, OutcomeLabeler, OutcomeLabels};
pub use algorithm::sequence::{SequenceAssembler, Tokenizer, Vocabulary, pad_sequence};

// Persistence
pub use utils::io::{ArtifactPaths, ArtifactSet, read_table};

// Arrow types
pub use arrow::record_batch::RecordBatch;
