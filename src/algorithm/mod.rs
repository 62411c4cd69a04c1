//! Sequence building and outcome labeling

pub mod outcome;
pub mod sequence;
