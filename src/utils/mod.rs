//! Shared helpers: Arrow kernels, file IO and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{read_csv, read_parquet, read_table};
