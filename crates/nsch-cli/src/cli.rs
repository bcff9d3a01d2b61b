//! CLI argument definitions for the NSCH harmonizer.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use nsch_cli::logging::LogFormat;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "nsch-harmonize",
    version,
    about = "Harmonize NSCH yearly extracts into one labeled table",
    long_about = "Harmonize National Survey of Children's Health yearly extracts.\n\n\
                  Applies each year's value labels, runs the configured recodes,\n\
                  renames and merges, reconciles columns across years and writes\n\
                  one long table with a codebook and an audit report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
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
    /// Run the whole pipeline over a directory of yearly extracts.
    Run(RunArgs),

    /// Parse one label-definition script and list its variables.
    Labels(LabelsArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Directory holding one `.do` script and one `.csv` extract per year.
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Transformation configuration (JSON).
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Survey years to include, e.g. `2016-2022` or `2016,2018,2020-2022`.
    #[arg(long = "years", value_name = "YEARS", default_value = "2016-2022")]
    pub years: String,

    /// Household-level side table joined on the household key.
    #[arg(long = "side-table", value_name = "FILE")]
    pub side_table: Option<PathBuf>,

    /// Path of the canonical CSV table.
    #[arg(long = "output", value_name = "FILE")]
    pub output: PathBuf,

    /// Write the factor codebook as JSON (default: beside the output).
    #[arg(long = "codebook", value_name = "FILE")]
    pub codebook: Option<PathBuf>,

    /// Write the audit report as JSON (default: beside the output).
    #[arg(long = "audit-report", value_name = "FILE")]
    pub audit_report: Option<PathBuf>,

    /// Exit non-zero when the run recorded any warning.
    ///
    /// Outputs are still written so the audit report can be inspected.
    #[arg(long = "fail-on-warnings")]
    pub fail_on_warnings: bool,
}

#[derive(Parser)]
pub struct LabelsArgs {
    /// Label-definition script (`.do`).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Survey year (default: taken from the file name).
    #[arg(long = "year")]
    pub year: Option<u16>,
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

impl From<LogLevelArg> for LevelFilter {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
