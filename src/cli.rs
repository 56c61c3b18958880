//! Command-line interface definitions.
//!
//! Every flag overrides the matching `quire.toml` field.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Quire incremental site regenerator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: quire.toml, optional)
    #[arg(short = 'C', long, default_value = "quire.toml")]
    pub config: PathBuf,

    /// Source root
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination root
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Template directory
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Hosting-root prefix; links become absolute when set.
    ///
    /// Example: publishing under https://example.org/blog/:
    ///   quire --host-root /blog
    #[arg(long = "host-root")]
    pub host_root: Option<String>,

    /// Increase verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Rebuild every item regardless of timestamps
    #[arg(short, long)]
    pub force: bool,

    /// Treat warnings as fatal errors
    #[arg(long)]
    pub strict: bool,

    /// Append log output to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Number of recent posts on the home summary
    #[arg(short = 'n', long = "summary-length")]
    pub summary_length: Option<usize>,
}
