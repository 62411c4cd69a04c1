//! Configuration for sequence building and outcome labeling.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::schema::DateFormatConfig;

/// Default maximum sequence length
pub const DEFAULT_MAX_LEN: usize = 1024;

/// Inclusive window of elapsed days measured from an anchor date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Lower bound in days (inclusive)
    pub lower: i32,
    /// Upper bound in days (inclusive)
    pub upper: i32,
}

impl DayWindow {
    #[must_use]
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Default MACE follow-up window: 7 to 365 days after the index date
    #[must_use]
    pub const fn outcome_default() -> Self {
        Self::new(7, 365)
    }

    /// Default mortality window: 0 to 365 days after first exposure
    #[must_use]
    pub const fn mortality_default() -> Self {
        Self::new(0, 365)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lower > self.upper {
            return Err(PipelineError::Config(format!(
                "window lower bound {} exceeds upper bound {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] days", self.lower, self.upper)
    }
}

/// Column names expected in the input tables
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub person_id: String,
    pub concept_id: String,
    pub event_date: String,
    pub outcome_date: String,
    pub first_exposure_date: String,
    pub death_date: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            person_id: "person_id".to_string(),
            concept_id: "concept_id".to_string(),
            event_date: "event_date".to_string(),
            outcome_date: "first_mace_date".to_string(),
            first_exposure_date: "first_exposure_date".to_string(),
            death_date: "death_date".to_string(),
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fixed length of every stored token sequence
    pub max_len: usize,
    /// Window for the MACE outcome label, relative to the index date
    pub outcome_window: DayWindow,
    /// Window for the mortality label, relative to the first exposure date
    pub mortality_window: DayWindow,
    /// Input column names
    pub columns: ColumnNames,
    /// Formats tried when date columns arrive as strings
    pub date_format: DateFormatConfig,
    /// Show a progress bar while tokenizing patients
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            outcome_window: DayWindow::outcome_default(),
            mortality_window: DayWindow::mortality_default(),
            columns: ColumnNames::default(),
            date_format: DateFormatConfig::default(),
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    #[must_use]
    pub fn with_outcome_window(mut self, window: DayWindow) -> Self {
        self.outcome_window = window;
        self
    }

    #[must_use]
    pub fn with_mortality_window(mut self, window: DayWindow) -> Self {
        self.mortality_window = window;
        self
    }

    #[must_use]
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Check that the configuration can drive a run
    pub fn validate(&self) -> Result<()> {
        if self.max_len == 0 || u32::try_from(self.max_len).is_err() {
            return Err(PipelineError::Config(format!(
                "maximum sequence length must be between 1 and {}, got {}",
                u32::MAX,
                self.max_len
            )));
        }
        self.outcome_window.validate()?;
        self.mortality_window.validate()
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Max Sequence Length: {}", self.max_len)?;
        writeln!(f, "  Outcome Window: {}", self.outcome_window)?;
        writeln!(f, "  Mortality Window: {}", self.mortality_window)?;
        writeln!(f, "  Outcome Column: {}", self.columns.outcome_date)?;
        Ok(())
    }
}

/// Where a run's artifacts are written
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Output directory
    pub dir: PathBuf,
    /// Suffix appended to every artifact file stem, e.g. `_sglt2`
    pub suffix: String,
}

impl OutputConfig {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            suffix: String::new(),
        }
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Path of an artifact file: `<dir>/<stem><suffix>.<ext>`
    #[must_use]
    pub fn artifact_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{stem}{}.{ext}", self.suffix))
    }
}
