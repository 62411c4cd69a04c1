//! Day-bucketed tokenization of one patient's event history
//!
//! A patient with codes A, B on day 1 and C on day 2 becomes
//! `[CLS] [DAY] A B [SEP] [DAY] C [SEP]`: every distinct date opens with a day
//! token, days are separated by a separator token, and the sequence ends with a
//! separator. Sequences longer than the maximum length keep their most recent
//! suffix.

use crate::algorithm::sequence::vocabulary::{
    CLS_ID, DAY_ID, PAD_ID, SEP_ID, TokenId, Vocabulary,
};

/// Tokens produced for one patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Token ids, at most the maximum length, not padded
    pub tokens: Vec<TokenId>,
    /// Length of the sequence before truncation
    pub raw_len: usize,
    /// Number of codes that were not in the vocabulary and became [`PAD_ID`]
    pub unknown_codes: usize,
}

impl Encoded {
    /// Whether the oldest part of the history was dropped
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.raw_len > self.tokens.len()
    }
}

/// Encodes sorted patient events against a fixed vocabulary
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer<'a> {
    vocabulary: &'a Vocabulary,
    max_len: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(vocabulary: &'a Vocabulary, max_len: usize) -> Self {
        Self {
            vocabulary,
            max_len,
        }
    }

    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encode one patient without truncation
    ///
    /// `codes` and `days` are parallel: event `i` has code `codes[i]` recorded on
    /// day number `days[i]`. Events must be sorted ascending by day; codes on
    /// the same day keep their given order. Returns the tokens and the number
    /// of codes that fell back to the padding id.
    #[must_use]
    pub fn encode_untruncated(&self, codes: &[Option<i64>], days: &[i32]) -> (Vec<TokenId>, usize) {
        debug_assert_eq!(codes.len(), days.len());
        debug_assert!(days.is_sorted());

        // One start token, one day and one separator token per date at most
        let mut tokens = Vec::with_capacity(codes.len() * 3 + 2);
        let mut unknown = 0;
        let mut current_day = None;

        tokens.push(CLS_ID);
        for (&code, &day) in codes.iter().zip(days) {
            if current_day != Some(day) {
                if current_day.is_some() {
                    tokens.push(SEP_ID);
                }
                tokens.push(DAY_ID);
                current_day = Some(day);
            }

            let (id, known) = self.vocabulary.lookup_or_pad(code);
            if !known {
                unknown += 1;
            }
            tokens.push(id);
        }
        tokens.push(SEP_ID);

        (tokens, unknown)
    }

    /// Encode one patient, keeping the last `max_len` tokens
    #[must_use]
    pub fn encode(&self, codes: &[Option<i64>], days: &[i32]) -> Encoded {
        let (mut tokens, unknown_codes) = self.encode_untruncated(codes, days);
        let raw_len = tokens.len();
        if raw_len > self.max_len {
            tokens.drain(..raw_len - self.max_len);
        }
        Encoded {
            tokens,
            raw_len,
            unknown_codes,
        }
    }
}

/// Right-fill a sequence with [`PAD_ID`] up to `max_len`
///
/// Content stays at the low indices. Longer input is cut to its suffix, the
/// same policy the tokenizer applies.
#[must_use]
pub fn pad_sequence(tokens: &[TokenId], max_len: usize) -> Vec<TokenId> {
    let start = tokens.len().saturating_sub(max_len);
    let mut padded = Vec::with_capacity(max_len);
    padded.extend_from_slice(&tokens[start..]);
    padded.resize(max_len, PAD_ID);
    padded
}
