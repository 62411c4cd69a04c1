//! Operation logging and progress bars

pub mod log;
pub mod progress;

pub use self::log::{log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_main_progress_bar, finish_and_clear, task_progress_bar};
