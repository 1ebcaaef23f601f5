//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --config takes precedence over $PDF_EXPORTER_CONFIG and the default location.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{LogLevel, Options};

/// Watch a folder for PDFs, number them, and deliver them to a destination folder.
/// CLI flags override the logging options from the JSON configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Number incoming PDFs and deliver them to a destination folder")]
pub struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, short = 'c', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, help = "Enable debug logging (shorthand for --log-level debug)")]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Also append logs to this file.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print which configuration file would be used, then exit.
    #[arg(long, help = "Print the config file location and exit")]
    pub print_config: bool,

    /// Load the configuration and check the folders, then exit.
    #[arg(long, help = "Validate the configuration and folders, then exit")]
    pub check: bool,

    /// Run a single resend pass over the waiting folder, then exit.
    #[arg(long, help = "Retry delivery of waiting files once and exit")]
    pub sweep_once: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config value).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Log level after CLI overrides; defaults to `normal`.
    pub fn log_level_for(&self, options: &Options) -> LogLevel {
        self.effective_log_level()
            .or(options.log_level)
            .unwrap_or(LogLevel::Normal)
    }

    /// Log file after CLI overrides.
    pub fn log_file_for(&self, options: &Options) -> Option<PathBuf> {
        self.log_file.clone().or_else(|| options.log_file.clone())
    }
}

pub fn parse() -> Args {
    Args::parse()
}
