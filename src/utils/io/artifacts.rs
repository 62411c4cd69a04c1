//! Persisted artifact set of one assembly run
//!
//! A run writes six files into the output directory, all named
//! `<stem><suffix>.<ext>`:
//!
//! | file | content |
//! |------|---------|
//! | `token_matrix` (parquet) | `tokens: List<UInt32>`, every list `max_len` long |
//! | `valid_lengths` (parquet) | `valid_length: UInt32` |
//! | `outcomes` (parquet) | `outcome: UInt8` |
//! | `vocab` (json) | token string to id |
//! | `person_index` (csv) | `person_id,row_index` |
//! | `summary` (json) | run summary |
//!
//! The files are first written to a staging directory and only moved into
//! place once all of them were written, so a failed write leaves the previous
//! set untouched. The mortality labels of a later pass go to
//! `mortality<suffix>.parquet`; a rebuild deletes that file before the new
//! set is moved in, since its rows follow the old person index.
//!
//! Moving the staged files in is one rename per file. Other runs may share
//! the output directory under different suffixes, so it cannot be swapped as
//! a whole. A failure between two renames (disk removed, permissions changed
//! mid-run) can leave old and new files side by side; `ArtifactSet::load`
//! rejects such a set when the row counts differ, and a rerun repairs it.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, ListArray, UInt8Array, UInt32Array};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field, Schema, UInt8Type, UInt32Type};
use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::algorithm::sequence::vocabulary::{TokenId, Vocabulary};
use crate::config::OutputConfig;
use crate::error::{PipelineError, Result};
use crate::models::person_index::PersonIndex;
use crate::models::sequences::{AssemblySummary, PatientSequences};
use crate::schema::{get_column, tables};
use crate::utils::io::csv::{read_csv, write_csv};
use crate::utils::io::parquet::{read_parquet, write_parquet};
use crate::utils::logging::log_operation_start;

pub const TOKENS_COLUMN: &str = "tokens";
pub const VALID_LENGTH_COLUMN: &str = "valid_length";
pub const OUTCOME_COLUMN: &str = "outcome";
pub const MORTALITY_COLUMN: &str = "mortality";
/// Schema metadata key holding the row length of the token matrix
pub const MAX_LEN_KEY: &str = "max_len";

/// File locations of an artifact set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub token_matrix: PathBuf,
    pub valid_lengths: PathBuf,
    pub outcomes: PathBuf,
    pub vocab: PathBuf,
    pub person_index: PathBuf,
    pub summary: PathBuf,
    pub mortality: PathBuf,
}

impl ArtifactPaths {
    #[must_use]
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            token_matrix: output.artifact_path("token_matrix", "parquet"),
            valid_lengths: output.artifact_path("valid_lengths", "parquet"),
            outcomes: output.artifact_path("outcomes", "parquet"),
            vocab: output.artifact_path("vocab", "json"),
            person_index: output.artifact_path("person_index", "csv"),
            summary: output.artifact_path("summary", "json"),
            mortality: output.artifact_path("mortality", "parquet"),
        }
    }

    /// Files written together by one assembly run
    #[must_use]
    pub fn sequence_files(&self) -> [&Path; 6] {
        [
            &self.token_matrix,
            &self.valid_lengths,
            &self.outcomes,
            &self.vocab,
            &self.person_index,
            &self.summary,
        ]
    }
}

/// Write the artifact set of an assembly run
///
/// Existing files with the same suffix are replaced only after every new file
/// was written successfully.
pub fn write_sequences(sequences: &PatientSequences, output: &OutputConfig) -> Result<ArtifactPaths> {
    log_operation_start("Writing sequence artifacts to", &output.dir);
    fs::create_dir_all(&output.dir).map_err(|e| PipelineError::io_at(&output.dir, e))?;

    let staging_dir = output
        .dir
        .join(format!(".staging{}-{}", output.suffix, std::process::id()));
    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir).map_err(|e| PipelineError::io_at(&staging_dir, e))?;
    }
    fs::create_dir(&staging_dir).map_err(|e| PipelineError::io_at(&staging_dir, e))?;

    let staged = ArtifactPaths::new(&OutputConfig {
        dir: staging_dir.clone(),
        suffix: output.suffix.clone(),
    });
    let paths = ArtifactPaths::new(output);

    let result = write_staged(sequences, &staged).and_then(|()| {
        remove_stale_mortality(&paths.mortality)?;
        for (from, to) in staged.sequence_files().into_iter().zip(paths.sequence_files()) {
            fs::rename(from, to).map_err(|e| PipelineError::io_at(to, e))?;
        }
        Ok(())
    });
    if let Err(e) = fs::remove_dir_all(&staging_dir) {
        debug!("Could not remove staging directory {}: {e}", staging_dir.display());
    }
    result?;

    info!(
        "Wrote {} patient rows with suffix '{}' to {}",
        sequences.len(),
        output.suffix,
        output.dir.display()
    );
    Ok(paths)
}

/// Mortality labels are aligned to the person index they were built from
fn remove_stale_mortality(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            warn!(
                "Removed mortality labels {} of the previous run; rerun the mortality pass",
                path.display()
            );
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io_at(path, e)),
    }
}

fn write_staged(sequences: &PatientSequences, paths: &ArtifactPaths) -> Result<()> {
    write_parquet(&paths.token_matrix, &token_matrix_batch(sequences)?)?;
    write_column(
        &paths.valid_lengths,
        VALID_LENGTH_COLUMN,
        Arc::new(UInt32Array::from(sequences.valid_lengths.clone())),
    )?;
    write_column(
        &paths.outcomes,
        OUTCOME_COLUMN,
        Arc::new(UInt8Array::from(sequences.outcomes.clone())),
    )?;
    write_json(&paths.vocab, &sequences.vocabulary.to_token_map())?;
    write_csv(&paths.person_index, &sequences.person_index.to_record_batch()?)?;
    write_json(&paths.summary, &sequences.summary)
}

/// Write mortality labels next to an existing artifact set
///
/// The labels must follow the row order of the set's person index.
pub fn write_mortality(labels: &[u8], output: &OutputConfig) -> Result<PathBuf> {
    let path = ArtifactPaths::new(output).mortality;
    let partial = path.with_extension("parquet.partial");
    write_column(&partial, MORTALITY_COLUMN, Arc::new(UInt8Array::from(labels.to_vec())))?;
    fs::rename(&partial, &path).map_err(|e| PipelineError::io_at(&path, e))?;
    Ok(path)
}

/// Read the person index of an artifact set
pub fn read_person_index(output: &OutputConfig) -> Result<PersonIndex> {
    let path = ArtifactPaths::new(output).person_index;
    PersonIndex::from_record_batch(&read_csv(&path)?)
}

/// Read a persisted vocabulary file
pub fn read_vocabulary(path: &Path) -> Result<Vocabulary> {
    let tokens: BTreeMap<String, TokenId> = read_json(path)?;
    Vocabulary::from_token_map(&tokens)
}

/// Token matrix as one `List<UInt32>` row per patient
fn token_matrix_batch(sequences: &PatientSequences) -> Result<RecordBatch> {
    if i32::try_from(sequences.token_matrix.len()).is_err() {
        return Err(PipelineError::artifact(format!(
            "token matrix of {} tokens is too large for a list column",
            sequences.token_matrix.len()
        )));
    }
    let offsets = OffsetBuffer::<i32>::from_lengths(std::iter::repeat_n(
        sequences.max_len,
        sequences.len(),
    ));
    let item = Arc::new(Field::new_list_field(DataType::UInt32, false));
    let tokens = ListArray::try_new(
        item.clone(),
        offsets,
        Arc::new(UInt32Array::from(sequences.token_matrix.clone())),
        None,
    )?;

    let schema = Schema::new(vec![Field::new(TOKENS_COLUMN, DataType::List(item), false)])
        .with_metadata(HashMap::from([(
            MAX_LEN_KEY.to_string(),
            sequences.max_len.to_string(),
        )]));
    Ok(RecordBatch::try_new(Arc::new(schema), vec![Arc::new(tokens)])?)
}

fn write_column(path: &Path, column: &str, values: ArrayRef) -> Result<()> {
    let schema = Schema::new(vec![Field::new(column, values.data_type().clone(), false)]);
    let batch = RecordBatch::try_new(Arc::new(schema), vec![values])?;
    write_parquet(path, &batch)
}

fn read_column<T: ArrowPrimitiveType>(path: &Path, column: &str) -> Result<Vec<T::Native>> {
    let batch = read_parquet(path, Some(&[column]))?;
    let array = get_column(&batch, tables::ARTIFACT, column)?;
    let values = array
        .as_primitive_opt::<T>()
        .ok_or_else(|| PipelineError::UnsupportedType {
            table: tables::ARTIFACT.to_string(),
            column: column.to_string(),
            data_type: array.data_type().clone(),
        })?;
    if values.null_count() > 0 {
        return Err(PipelineError::artifact(format!(
            "column '{column}' in {} contains missing values",
            path.display()
        )));
    }
    Ok(values.values().to_vec())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io_at(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| PipelineError::io_at(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PipelineError::io_at(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Flat row-major tokens of a persisted token matrix
struct TokenMatrix {
    tokens: Vec<TokenId>,
    max_len: usize,
    rows: usize,
}

fn read_token_matrix(path: &Path) -> Result<TokenMatrix> {
    let batch = read_parquet(path, None)?;
    let max_len = batch
        .schema()
        .metadata()
        .get(MAX_LEN_KEY)
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or_else(|| {
            PipelineError::artifact(format!("{} has no '{MAX_LEN_KEY}' metadata", path.display()))
        })?;

    let column = get_column(&batch, tables::ARTIFACT, TOKENS_COLUMN)?;
    let list = column.as_list_opt::<i32>().ok_or_else(|| PipelineError::UnsupportedType {
        table: tables::ARTIFACT.to_string(),
        column: TOKENS_COLUMN.to_string(),
        data_type: column.data_type().clone(),
    })?;
    if let Some((row, len)) = list
        .offsets()
        .lengths()
        .enumerate()
        .find(|&(_, len)| len != max_len)
    {
        return Err(PipelineError::artifact(format!(
            "token row {row} has {len} tokens, expected {max_len}"
        )));
    }

    let values = list
        .values()
        .as_primitive_opt::<UInt32Type>()
        .ok_or_else(|| PipelineError::artifact("token matrix values are not UInt32"))?;
    let offsets = list.value_offsets();
    let start = offsets.first().copied().unwrap_or(0) as usize;
    let end = offsets.last().copied().unwrap_or(0) as usize;
    Ok(TokenMatrix {
        tokens: values.values()[start..end].to_vec(),
        max_len,
        rows: list.len(),
    })
}

/// A reloaded artifact set, checked for row consistency
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub sequences: PatientSequences,
    /// Mortality labels, when the mortality pass has been run
    pub mortality: Option<Vec<u8>>,
    pub paths: ArtifactPaths,
}

impl ArtifactSet {
    /// Load and cross-check every file of an artifact set
    ///
    /// Fails with [`PipelineError::Artifact`] when the files disagree on the
    /// number of rows, a token row has the wrong length, a token id is outside
    /// the vocabulary or the person index is not a bijection onto `0..N`.
    pub fn load(output: &OutputConfig) -> Result<Self> {
        let paths = ArtifactPaths::new(output);
        log_operation_start("Loading sequence artifacts from", &output.dir);

        let person_index = read_person_index(output)?;
        let TokenMatrix {
            tokens: token_matrix,
            max_len,
            rows: token_rows,
        } = read_token_matrix(&paths.token_matrix)?;
        let valid_lengths = read_column::<UInt32Type>(&paths.valid_lengths, VALID_LENGTH_COLUMN)?;
        let outcomes = read_column::<UInt8Type>(&paths.outcomes, OUTCOME_COLUMN)?;
        let vocabulary = read_vocabulary(&paths.vocab)?;
        let summary: AssemblySummary = read_json(&paths.summary)?;
        let mortality = if paths.mortality.exists() {
            Some(read_column::<UInt8Type>(&paths.mortality, MORTALITY_COLUMN)?)
        } else {
            None
        };

        let n = person_index.len();
        let rows = [
            ("token matrix", token_rows),
            ("valid lengths", valid_lengths.len()),
            ("outcomes", outcomes.len()),
            ("summary", summary.patients),
            ("mortality", mortality.as_ref().map_or(n, Vec::len)),
        ];
        if let Some((name, count)) = rows.iter().find(|(_, count)| *count != n) {
            return Err(PipelineError::artifact(format!(
                "{name} has {count} rows but the person index has {n}"
            )));
        }
        if let Some(len) = valid_lengths.iter().find(|&&len| len as usize > max_len) {
            return Err(PipelineError::artifact(format!(
                "valid length {len} exceeds the row length {max_len}"
            )));
        }
        if let Some(id) = token_matrix.iter().find(|&&id| id as usize >= vocabulary.len()) {
            return Err(PipelineError::artifact(format!(
                "token id {id} is outside the vocabulary of {} tokens",
                vocabulary.len()
            )));
        }
        if outcomes.iter().chain(mortality.iter().flatten()).any(|&v| v > 1) {
            return Err(PipelineError::artifact("label arrays must be binary"));
        }

        info!("Loaded {n} patient rows from {}", output.dir.display());
        Ok(Self {
            sequences: PatientSequences {
                token_matrix,
                max_len,
                valid_lengths,
                outcomes,
                person_index,
                vocabulary,
                summary,
            },
            mortality,
            paths,
        })
    }
}
