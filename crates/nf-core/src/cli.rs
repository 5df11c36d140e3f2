//! Command-line interface.

use crate::config::EngineConfig;
use crate::discover::{DiscoverRequest, DiscoveryService, DEFAULT_SAMPLE_SIZE};
use crate::progress::ProgressSink;
use crate::store::MemoryFlowStore;
use clap::{Parser, Subcommand};
use nf_common::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "nf-core", version, about = "NetFlow behavioral-state discovery")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover behavioral states in a JSONL flow dump and print scored
    /// state profiles as JSON.
    Discover {
        /// Path to a file with one FlowRecord JSON object per line.
        #[arg(long)]
        input: PathBuf,

        /// Fixed state count; omit to select automatically by BIC.
        #[arg(long)]
        states: Option<usize>,

        /// Maximum number of flows to pull from the input.
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
        sample_size: usize,

        /// PRNG seed for repeatable runs.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Emit progress updates as JSON lines on stderr.
        #[arg(long)]
        progress: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Discover {
            input,
            states,
            sample_size,
            seed,
            progress,
        } => discover(&input, states, sample_size, seed, progress),
    }
}

fn discover(
    input: &PathBuf,
    states: Option<usize>,
    sample_size: usize,
    seed: u64,
    progress: bool,
) -> Result<()> {
    let store = MemoryFlowStore::from_jsonl(BufReader::new(File::open(input)?))?;
    let config = EngineConfig {
        seed,
        ..EngineConfig::default()
    };
    let mut service = DiscoveryService::new(store, config)?;

    let sink: Option<ProgressSink> = progress.then(|| {
        Arc::new(|update: crate::progress::ProgressUpdate| {
            eprintln!("{}", update.to_jsonl());
        }) as ProgressSink
    });

    let request = DiscoverRequest {
        requested_states: states,
        sample_size,
    };
    let discovery = service.discover(&request, sink)?;
    println!("{}", serde_json::to_string_pretty(&discovery)?);
    Ok(())
}
