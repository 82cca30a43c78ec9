//! CLI argument definitions for the pipeline driver.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use epi_core::VerifyMode;

#[derive(Parser)]
#[command(
    name = "epi-pipeline",
    version,
    about = "Run epidemiology pipeline chains and export their tables",
    long_about = "Run the configured pipeline chains.\n\n\
                  Every chain fetches its sources, resolves their records to \
                  location keys and writes one CSV table under <OUTPUT>/tables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run pipeline chains and write their output tables.
    Run(RunArgs),

    /// List the available pipeline chains.
    List(ListArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Run only these chains (chain or table names, comma separated).
    #[arg(long, value_name = "CHAINS", value_delimiter = ',', conflicts_with = "exclude")]
    pub only: Vec<String>,

    /// Run every chain except these (chain or table names, comma separated).
    #[arg(long, value_name = "CHAINS", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Number of sources run in parallel (default: number of CPUs).
    #[arg(long = "process-count", value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub process_count: Option<u16>,

    /// Anomaly detection run on every produced table.
    #[arg(long, value_enum, default_value = "none")]
    pub verify: VerifyArg,

    /// Treat anomaly findings as fatal for the chain.
    #[arg(long = "raise-anomalies")]
    pub raise_anomalies: bool,

    /// Hide progress bars.
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Root of snapshots, intermediate outputs and exported tables.
    #[arg(long = "output-folder", value_name = "DIR", default_value = "output")]
    pub output_folder: PathBuf,

    #[command(flatten)]
    pub pipelines: PipelinesArg,

    /// JSON map of URL to local file used instead of downloading.
    #[arg(long = "cache-sitemap", value_name = "FILE")]
    pub cache_sitemap: Option<PathBuf>,

    /// HTTP timeout for snapshot downloads.
    #[arg(long = "fetch-timeout", value_name = "SECS", default_value_t = 300)]
    pub fetch_timeout: u64,

    /// Reuse snapshots already present in the output folder.
    #[arg(long = "skip-existing")]
    pub skip_existing: bool,

    /// Do not persist per-source outputs under <OUTPUT>/intermediate.
    #[arg(long = "no-intermediate")]
    pub no_intermediate: bool,
}

#[derive(Parser)]
pub struct ListArgs {
    #[command(flatten)]
    pub pipelines: PipelinesArg,
}

#[derive(Args)]
pub struct PipelinesArg {
    /// Folder holding one sub-folder per chain with a config.toml.
    #[arg(long = "pipelines-dir", value_name = "DIR", default_value = "pipelines")]
    pub pipelines_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VerifyArg {
    None,
    Simple,
    Full,
}

impl From<VerifyArg> for VerifyMode {
    fn from(value: VerifyArg) -> Self {
        match value {
            VerifyArg::None => VerifyMode::None,
            VerifyArg::Simple => VerifyMode::Simple,
            VerifyArg::Full => VerifyMode::Full,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
