//! Consistent log lines for file operations

use std::path::Path;
use std::time::Duration;

/// Log the start of an operation on a file or directory
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log a finished operation with the number of rows it touched
///
/// # Arguments
/// * `operation` - Past-tense verb, e.g. "read" or "wrote"
/// * `path` - File or directory operated on
/// * `rows` - Number of rows processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {} {} rows at {} in {:?}",
            operation,
            rows,
            path.display(),
            duration
        ),
        None => log::info!("Successfully {} {} rows at {}", operation, rows, path.display()),
    }
}

/// Log a warning, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}
