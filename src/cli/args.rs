use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::reporting::OutputFormat;

pub const DEFAULT_RULES_FILE: &str = "windows.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "netsieve",
    version,
    about = "Find network-capable Windows executables and add them to a process allow-list"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Config file (defaults to ./netsieve.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory tree and append new capable process names to the rule file
    Scan(ScanArgs),
    /// Show the verdict and import table of a single file
    Inspect {
        /// File to analyze
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory to scan recursively for .exe files
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Rule file to update
    #[arg(long, value_name = "FILE", default_value = DEFAULT_RULES_FILE)]
    pub rules: PathBuf,

    /// Report what would be added without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Analysis worker threads (0 = one per CPU)
    #[arg(long, short)]
    pub jobs: Option<usize>,

    /// Follow symbolic links while walking
    #[arg(long)]
    pub follow_links: bool,

    /// Comment written after each appended rule
    #[arg(long)]
    pub marker: Option<String>,
}
