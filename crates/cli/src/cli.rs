//! Command line arguments.

use clap::Parser;
use std::path::PathBuf;

/// sonata - batch audio conversion
///
/// Converts every audio file found under the given paths, naming the
/// outputs from their tags. Settings not given on the command line come
/// from the configuration file and `SONATA_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "sonata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to convert
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Configuration file (defaults to $SONATA_CONFIG or sonata.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write outputs below this folder instead of next to the inputs
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output format, with its default quality settings
    #[arg(short, long, value_name = "FORMAT")]
    #[arg(value_parser = ["flac", "wav", "vorbis", "mp3", "aac", "opus"])]
    pub format: Option<String>,

    /// Number of conversions run at once
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Delete each input after it was converted
    #[arg(long, default_value = "false")]
    pub delete_original: bool,

    /// Only look at the top level of directories
    #[arg(long, default_value = "false")]
    pub no_recursive: bool,

    /// Only list the files that would be converted
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Print Prometheus metrics after the batch
    #[arg(long, default_value = "false")]
    pub metrics: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| {
            std::env::var("SONATA_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("sonata.toml"))
        })
    }
}
