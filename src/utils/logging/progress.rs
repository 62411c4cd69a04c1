//! Progress reporting for long-running steps
//!
//! Bars are drawn with indicatif. A malformed template falls back to the
//! default style instead of failing the run.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Template for per-patient progress
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|e| {
            log::debug!("Invalid progress template {template:?}: {e}");
            ProgressStyle::default_bar()
        })
        .progress_chars("#>-")
}

/// Create a progress bar with the standard style
///
/// # Arguments
/// * `length` - Total number of steps
/// * `description` - Optional initial message
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_style(bar_style(DEFAULT_MAIN_TEMPLATE));
    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }
    pb
}

/// Progress bar that is only drawn when `visible` is set
#[must_use]
pub fn task_progress_bar(length: u64, description: &str, visible: bool) -> ProgressBar {
    if visible {
        create_main_progress_bar(length, Some(description))
    } else {
        ProgressBar::with_draw_target(Some(length), ProgressDrawTarget::hidden())
    }
}

/// Finish a progress bar and clear it from the terminal
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
