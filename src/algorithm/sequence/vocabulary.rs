//! Concept vocabulary
//!
//! Maps clinical concept codes to token ids. Ids 0..=3 are reserved for the
//! structural tokens and are never handed out to codes; codes receive ids
//! starting at [`FIRST_CODE_ID`] in sorted order of their string form.

use std::collections::BTreeMap;

use arrow::array::Int64Array;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::debug;
use rustc_hash::FxHashMap;

use crate::config::ColumnNames;
use crate::error::{PipelineError, Result};
use crate::schema::{id_column, tables};

/// Integer id of a token in a model input sequence
pub type TokenId = u32;

pub const PAD_ID: TokenId = 0;
pub const CLS_ID: TokenId = 1;
pub const SEP_ID: TokenId = 2;
pub const DAY_ID: TokenId = 3;
/// First id assigned to a concept code
pub const FIRST_CODE_ID: TokenId = 4;

pub const PAD_TOKEN: &str = "[PAD]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const DAY_TOKEN: &str = "[DAY]";

/// Structural tokens in id order
pub const RESERVED_TOKENS: [&str; 4] = [PAD_TOKEN, CLS_TOKEN, SEP_TOKEN, DAY_TOKEN];

/// Immutable mapping from concept code to token id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// Token string for every id, indexed by id
    by_id: Vec<String>,
    /// Token id for every concept code
    by_code: FxHashMap<i64, TokenId>,
}

impl Vocabulary {
    /// Build a vocabulary from concept codes
    ///
    /// Duplicates are ignored. The result depends only on the set of codes, not
    /// on their order or multiplicity.
    pub fn from_codes(codes: impl IntoIterator<Item = i64>) -> Self {
        let mut by_id: Vec<String> = RESERVED_TOKENS.iter().map(ToString::to_string).collect();
        let mut by_code = FxHashMap::default();

        let sorted = codes
            .into_iter()
            .unique()
            .map(|code| (code.to_string(), code))
            .sorted_unstable();

        for (id, (text, code)) in (FIRST_CODE_ID..).zip(sorted) {
            by_code.insert(code, id);
            by_id.push(text);
        }

        Self { by_id, by_code }
    }

    /// Build a vocabulary over the concept column of an event table
    ///
    /// Null codes are skipped.
    pub fn build(events: &RecordBatch, columns: &ColumnNames) -> Result<Self> {
        let codes = id_column(events, tables::EVENT, &columns.concept_id)?;
        let vocabulary = Self::from_code_array(&codes);
        debug!(
            "Built vocabulary with {} concept codes from {} events",
            vocabulary.code_count(),
            events.num_rows()
        );
        Ok(vocabulary)
    }

    /// Build a vocabulary from an already normalized code column
    #[must_use]
    pub fn from_code_array(codes: &Int64Array) -> Self {
        Self::from_codes(codes.iter().flatten())
    }

    /// Rebuild a vocabulary from its persisted string form
    ///
    /// The map must contain the four reserved tokens at their fixed ids and
    /// integer codes occupying exactly the ids `4..len`.
    pub fn from_token_map(tokens: &BTreeMap<String, TokenId>) -> Result<Self> {
        let mut by_id = vec![None; tokens.len()];
        for (text, &id) in tokens {
            let slot = by_id.get_mut(id as usize).ok_or_else(|| {
                PipelineError::artifact(format!(
                    "vocabulary id {id} for '{text}' is outside 0..{}",
                    tokens.len()
                ))
            })?;
            if slot.replace(text.clone()).is_some() {
                return Err(PipelineError::artifact(format!(
                    "vocabulary id {id} is assigned more than once"
                )));
            }
        }

        let by_id: Vec<String> = by_id.into_iter().flatten().collect();
        if by_id.len() != tokens.len() {
            return Err(PipelineError::artifact("vocabulary ids are not contiguous"));
        }

        for (id, reserved) in RESERVED_TOKENS.iter().enumerate() {
            if by_id.get(id).map(String::as_str) != Some(*reserved) {
                return Err(PipelineError::artifact(format!(
                    "reserved token {reserved} must have id {id}"
                )));
            }
        }

        let mut by_code = FxHashMap::default();
        for (id, text) in (FIRST_CODE_ID..).zip(&by_id[FIRST_CODE_ID as usize..]) {
            let code = text.parse::<i64>().map_err(|_| {
                PipelineError::artifact(format!("vocabulary entry '{text}' is not an integer code"))
            })?;
            by_code.insert(code, id);
        }

        Ok(Self { by_id, by_code })
    }

    /// The vocabulary as a code string to id map, reserved tokens included
    #[must_use]
    pub fn to_token_map(&self) -> BTreeMap<String, TokenId> {
        (0..).zip(&self.by_id).map(|(id, text)| (text.clone(), id)).collect()
    }

    /// Total number of tokens, reserved tokens included
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Always false: the reserved tokens are present in every vocabulary
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of concept codes
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.by_code.len()
    }

    /// Token id of a concept code
    #[must_use]
    pub fn code_id(&self, code: i64) -> Option<TokenId> {
        self.by_code.get(&code).copied()
    }

    /// Token id of a token string, e.g. `"10"` or `"[SEP]"`
    #[must_use]
    pub fn get(&self, text: &str) -> Option<TokenId> {
        if let Some(id) = RESERVED_TOKENS.iter().position(|t| *t == text) {
            return TokenId::try_from(id).ok();
        }
        text.parse::<i64>().ok().and_then(|code| self.code_id(code))
    }

    /// Token id for a possibly missing code, falling back to [`PAD_ID`]
    ///
    /// The flag is false when the fallback was taken.
    #[must_use]
    pub fn lookup_or_pad(&self, code: Option<i64>) -> (TokenId, bool) {
        match code.and_then(|c| self.code_id(c)) {
            Some(id) => (id, true),
            None => (PAD_ID, false),
        }
    }

    /// String form of a token id
    #[must_use]
    pub fn token_str(&self, id: TokenId) -> Option<&str> {
        self.by_id.get(id as usize).map(String::as_str)
    }

    /// Render a token sequence in its string form, for inspection
    #[must_use]
    pub fn decode(&self, tokens: &[TokenId]) -> Vec<String> {
        tokens
            .iter()
            .map(|&id| {
                self.token_str(id)
                    .map_or_else(|| format!("<{id}>"), ToString::to_string)
            })
            .collect()
    }
}
