use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use mace_seq::cli::{BuildArgs, Cli, Commands, MortalityArgs};
use mace_seq::utils::io::read_vocabulary;
use mace_seq::{MortalityAligner, SequenceAssembler, read_table};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to configure the worker thread pool")?;
    info!("Using {threads} worker threads");

    let start = Instant::now();
    match cli.command {
        Commands::Build(args) => run_build(&args)?,
        Commands::Mortality(args) => run_mortality(&args)?,
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}

fn run_build(args: &BuildArgs) -> Result<()> {
    let config = args.to_config();
    let output = args.output.to_config();
    info!("{config}");

    let events = read_table(&args.events)
        .with_context(|| format!("failed to read events from {}", args.events.display()))?;
    let index = read_table(&args.index)
        .with_context(|| format!("failed to read index dates from {}", args.index.display()))?;
    let outcomes = read_table(&args.outcomes)
        .with_context(|| format!("failed to read outcomes from {}", args.outcomes.display()))?;

    let mut assembler = SequenceAssembler::new(&config);
    if let Some(path) = &args.vocab {
        let vocabulary = read_vocabulary(path)
            .with_context(|| format!("failed to load vocabulary {}", path.display()))?;
        assembler = assembler.with_vocabulary(vocabulary);
    }

    let (sequences, paths) = assembler
        .assemble_and_persist(&events, &index, &outcomes, &args.index_column, &output)
        .context("sequence assembly failed")?;
    info!(
        "Wrote {} sequences; token matrix at {}",
        sequences.len(),
        paths.token_matrix.display()
    );
    Ok(())
}

fn run_mortality(args: &MortalityArgs) -> Result<()> {
    let config = args.to_config();
    let output = args.output.to_config();

    let deaths = read_table(&args.deaths)
        .with_context(|| format!("failed to read deaths from {}", args.deaths.display()))?;
    let (labels, path) = MortalityAligner::from_config(&config)
        .align_and_persist(&deaths, &output)
        .with_context(|| {
            format!(
                "mortality alignment against {} failed",
                output.dir.display()
            )
        })?;
    info!(
        "Wrote {} mortality labels ({} positive) to {}",
        labels.labels.len(),
        labels.positives(),
        path.display()
    );
    Ok(())
}
