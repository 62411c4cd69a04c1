//! Vocabulary, tokenization and per-patient sequence assembly

pub mod assembler;
pub mod tokenizer;
pub mod vocabulary;

pub use assembler::SequenceAssembler;
pub use tokenizer::{Encoded, Tokenizer, pad_sequence};
pub use vocabulary::{CLS_ID, DAY_ID, PAD_ID, SEP_ID, TokenId, Vocabulary};
