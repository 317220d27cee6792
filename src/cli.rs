//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Validate and repair the hyperlinks of a document.
///
/// Reads the document's hyperlink records as JSON, reconciles them against
/// the lookup service, repairs internal links, and writes the updated records
/// plus a changelog report.
#[derive(Parser, Debug)]
#[command(name = "hyperlink-repair")]
#[command(author, version, about)]
pub struct Args {
    /// JSON file with `records` (and optionally `bookmarks`)
    pub input: PathBuf,

    /// Where to write updated records (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Where to write the changelog report (default: stderr summary only)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/hyperlink-repair/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the lookup service; only local repairs run
    #[arg(long)]
    pub offline: bool,

    /// Report title mismatches instead of rewriting titles
    #[arg(long)]
    pub detect_only: bool,

    /// Maximum retry attempts for transient lookup failures (0-10), overrides config
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
