//! Command line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    ColumnNames, DEFAULT_MAX_LEN, DayWindow, OutputConfig, PipelineConfig,
};

#[derive(Debug, Parser)]
#[command(
    name = "mace-seq",
    version,
    about = "Tokenize EHR event tables into patient sequences with MACE and mortality labels"
)]
pub struct Cli {
    #[arg(long, global = true, default_value_t = 0, help = "Number of threads (0 = auto)")]
    pub threads: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build token sequences, outcome labels and the person index
    Build(BuildArgs),
    /// Attach mortality labels to the rows of an earlier build
    Mortality(MortalityArgs),
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[arg(long, help = "Output directory for the artifact set")]
    pub out: PathBuf,

    #[arg(long, default_value = "", help = "Suffix appended to every artifact file name")]
    pub suffix: String,
}

impl OutputArgs {
    #[must_use]
    pub fn to_config(&self) -> OutputConfig {
        OutputConfig::new(&self.out).with_suffix(self.suffix.clone())
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[arg(long, help = "Patient event table (.parquet or .csv)")]
    pub events: PathBuf,

    #[arg(long, help = "Index date table (.parquet or .csv)")]
    pub index: PathBuf,

    #[arg(long, help = "Outcome table (.parquet or .csv)")]
    pub outcomes: PathBuf,

    #[arg(long, default_value = "index_date", help = "Index date column of the index table")]
    pub index_column: String,

    #[arg(long, default_value = "first_mace_date", help = "Outcome date column")]
    pub outcome_column: String,

    #[command(flatten)]
    pub output: OutputArgs,

    #[arg(long, default_value_t = DEFAULT_MAX_LEN, help = "Fixed sequence length")]
    pub max_len: usize,

    #[arg(long, default_value_t = DayWindow::outcome_default().lower)]
    pub window_start: i32,

    #[arg(long, default_value_t = DayWindow::outcome_default().upper)]
    pub window_end: i32,

    #[arg(long, help = "Reuse the vocabulary file of an earlier run")]
    pub vocab: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub progress: bool,
}

impl BuildArgs {
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        let columns = ColumnNames {
            outcome_date: self.outcome_column.clone(),
            ..ColumnNames::default()
        };
        PipelineConfig::new()
            .with_max_len(self.max_len)
            .with_outcome_window(DayWindow::new(self.window_start, self.window_end))
            .with_columns(columns)
            .with_progress(self.progress)
    }
}

#[derive(Debug, Args)]
pub struct MortalityArgs {
    #[arg(long, help = "Death table with first exposure and death dates")]
    pub deaths: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    #[arg(long, default_value_t = DayWindow::mortality_default().lower)]
    pub window_start: i32,

    #[arg(long, default_value_t = DayWindow::mortality_default().upper)]
    pub window_end: i32,
}

impl MortalityArgs {
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_mortality_window(DayWindow::new(self.window_start, self.window_end))
    }
}
