use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "models-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Flatten JSON model metadata into Parquet and CSV datasets")]
#[command(
    long_about = "models-extract walks a checked-out metadata repository, reads every JSON \
                  file it finds, and writes the combined records as a Parquet file, a CSV \
                  file and a small extraction summary. Without arguments it reads \
                  ./external-repo and writes into ./data."
)]
#[command(after_help = "EXAMPLES:\n  \
    models-extract\n  \
    models-extract --input community-models --output data\n  \
    models-extract --config models-extract.toml --output-format json\n  \
    models-extract --generate-config")]
pub struct Cli {
    /// Directory scanned for metadata files (defaults to external-repo)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory receiving the dataset and metadata files (defaults to data)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for console messages
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are printed)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show the resolved paths without reading or writing anything")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_input_root(self.input.clone())
            .with_output_dir(self.output.clone())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
