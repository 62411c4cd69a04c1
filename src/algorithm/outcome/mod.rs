//! Time-windowed binary outcome labels
//!
//! Both labelers measure elapsed days from an anchor date (index date or
//! first exposure) to an event date and test it against an inclusive
//! [`DayWindow`](crate::config::DayWindow).

pub mod labeler;
pub mod mortality;
pub mod window;

pub use labeler::{OutcomeLabeler, OutcomeLabels};
pub use mortality::{MortalityAligner, MortalityLabels};
