//! Command-line argument parsing for db-runner.

use clap::Parser;
use db_runner::config::Config;
use db_runner::output::OutputFormat;
use db_runner::{FetchMode, NamedParameter};
use std::path::PathBuf;

/// Run one parameterised statement against a named connection profile.
#[derive(Parser, Debug)]
#[command(name = "db-runner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL statement, with `:name` placeholders for parameters
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Connection profile to use
    #[arg(short = 'c', long, value_name = "NAME", default_value = "default")]
    pub connection: String,

    /// Statement parameter (repeatable), e.g. `-p age:int=19`
    #[arg(short = 'p', long = "param", value_name = "NAME[:TYPE]=VALUE")]
    pub params: Vec<String>,

    /// Fetch mode: rows, row, column or scalar
    #[arg(short = 'm', long, value_name = "MODE", default_value = "rows")]
    pub mode: String,

    /// Output format: text or json
    #[arg(short = 'o', long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Write logs to the log file instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Parses every `--param` assignment.
    pub fn parse_params(&self) -> std::result::Result<Vec<NamedParameter>, String> {
        self.params
            .iter()
            .map(|p| NamedParameter::parse_assignment(p))
            .collect()
    }

    /// Parses the fetch mode from the --mode argument.
    pub fn parse_fetch_mode(&self) -> std::result::Result<FetchMode, String> {
        self.mode.parse()
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }
}
