use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{EngineConfig, Partitioning};
use crate::error::Result;

mod barrier;
pub mod combiner;
pub mod engine;
pub mod mapper;
pub mod reducer;
pub mod shuffler;
pub mod splitter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single job with a bundled workload
    Submit {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Name of the workload (wc, lines, prefix)
        #[arg(short, long)]
        workload: String,

        #[command(flatten)]
        engine: EngineArgs,

        /// Auxiliary arguments to pass to the workload.
        #[clap(value_parser, last = true)]
        args: Vec<String>,
    },
    /// Find the shortest prefix length that makes every line unique
    Prefix {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Longest prefix to try before giving up
        #[arg(long, default_value_t = 50)]
        max_len: usize,
    },
}

/// Engine settings shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct EngineArgs {
    /// Directory for intermediate and result files. Emptied on every run.
    #[arg(short, long, default_value = "./out")]
    pub output: PathBuf,

    /// JSON file with engine settings; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of map workers
    #[arg(short, long)]
    pub mappers: Option<usize>,

    /// Number of reduce partitions
    #[arg(short, long)]
    pub reducers: Option<usize>,

    /// Skip the combine phase
    #[arg(long)]
    pub no_combine: bool,

    #[arg(long, value_enum)]
    pub partitioning: Option<Partitioning>,
}

impl EngineArgs {
    /// Layers the flags over the config file (or the defaults).
    pub fn to_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(mappers) = self.mappers {
            config.mappers = mappers;
        }
        if let Some(reducers) = self.reducers {
            config.reducers = reducers;
        }
        if self.no_combine {
            config.combine = false;
        }
        if let Some(partitioning) = self.partitioning {
            config.partitioning = partitioning;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub workload: String,
    pub output: PathBuf,
    pub args: Vec<String>,
    pub config: EngineConfig,
}
