//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download one file over HTTP(S), resuming a partial copy if present.
///
/// Re-running the same command after an interruption continues where the
/// previous run stopped, provided the server reports the file size.
#[derive(Parser, Debug)]
#[command(name = "rfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URL to download
    pub url: String,

    /// Write to exactly this file
    #[arg(short, long, conflicts_with_all = ["dir", "guess_name"])]
    pub output: Option<PathBuf>,

    /// Directory to download into (default: config `output_dir`, else current directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Guess the filename from the URL, fixing a `.bin` extension from the response type
    #[arg(long)]
    pub guess_name: bool,

    /// Expected MIME type used to pick the guessed extension up front
    #[arg(long, requires = "guess_name")]
    pub mime: Option<String>,

    /// User-Agent header to send
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Maximum transfer attempts, including the first (1-10, default 5)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Connect timeout in seconds (1-3600, default 4)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
