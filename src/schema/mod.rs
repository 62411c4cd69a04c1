//! Input table contracts and column normalization.

pub mod conversions;
pub mod date_utils;

pub use conversions::{date_column, get_column, id_column, require_columns};
pub use date_utils::{DateFormatConfig, date_to_days, parse_date_string};

/// Table names used in schema violation messages
pub mod tables {
    pub const EVENT: &str = "event";
    pub const INDEX: &str = "index date";
    pub const OUTCOME: &str = "outcome";
    pub const DEATH: &str = "death";
    pub const PERSON_INDEX: &str = "person index";
    pub const ARTIFACT: &str = "artifact";
}
