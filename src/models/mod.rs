//! Output models of an assembly run

pub mod person_index;
pub mod sequences;

pub use person_index::PersonIndex;
pub use sequences::{AssemblySummary, PatientRecord, PatientSequences};
