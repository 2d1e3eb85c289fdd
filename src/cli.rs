//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// SalesReport - JSONL sales export to XLSX items-sold report
///
/// Sums `net_items_sold` per `product_variant_sku` and writes a styled
/// spreadsheet with a NULL_SKU bucket and a grand total. Can also run a
/// small upload server that returns the report as a download.
///
/// Examples:
///   salesreport --input orders.jsonl
///   salesreport --input orders.jsonl --output weekly.xlsx --summary json
///   cat orders.jsonl | salesreport --input -
///   salesreport --serve --port 8080
///   salesreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSONL file to aggregate, or `-` for stdin
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "serve"],
        conflicts_with = "serve"
    )]
    pub input: Option<PathBuf>,

    /// Output file path for the XLSX report
    ///
    /// Defaults to the config value, or sales_report.xlsx.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .salesreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Format of the summary printed after a run (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub summary: SummaryFormat,

    /// Run the HTTP upload server instead of processing a file
    #[arg(long)]
    pub serve: bool,

    /// Address for the upload server to bind
    #[arg(long, value_name = "ADDR", env = "SALESREPORT_BIND")]
    pub bind: Option<String>,

    /// Port for the upload server
    #[arg(short, long, value_name = "PORT", env = "SALESREPORT_PORT")]
    pub port: Option<u16>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable the progress bar while reading input
    #[arg(long)]
    pub no_progress: bool,

    /// Generate a default .salesreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Format of the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether input should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref() == Some(Path::new("-"))
    }

    /// Label for the input source, used in summaries.
    pub fn input_label(&self) -> String {
        match self.input {
            Some(_) if self.reads_stdin() => "<stdin>".to_string(),
            Some(ref path) => path.display().to_string(),
            None => String::new(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.init_config {
            return Ok(());
        }

        if let Some(port) = self.port {
            if port == 0 {
                return Err("Port must be non-zero".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !self.reads_stdin() {
                if !input.exists() {
                    return Err(format!("Input file does not exist: {}", input.display()));
                }
                if !input.is_file() {
                    return Err(format!("Input path is not a file: {}", input.display()));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Whether to draw a progress bar while reading input.
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress && !self.reads_stdin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("-")),
            output: None,
            config: None,
            summary: SummaryFormat::Text,
            serve: false,
            bind: None,
            port: None,
            verbose: false,
            quiet: false,
            no_progress: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "salesreport",
            "--input",
            "orders.jsonl",
            "--output",
            "out.xlsx",
            "--summary",
            "json",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("orders.jsonl")));
        assert_eq!(args.output, Some(PathBuf::from("out.xlsx")));
        assert_eq!(args.summary, SummaryFormat::Json);
    }

    #[test]
    fn test_input_required_unless_serving() {
        assert!(Args::try_parse_from(["salesreport"]).is_err());
        assert!(Args::try_parse_from(["salesreport", "--serve"]).is_ok());
        assert!(Args::try_parse_from(["salesreport", "--init-config"]).is_ok());
        assert!(Args::try_parse_from(["salesreport", "--serve", "-i", "x.jsonl"]).is_err());
    }

    #[test]
    fn test_stdin_input() {
        let args = make_args();
        assert!(args.reads_stdin());
        assert_eq!(args.input_label(), "<stdin>");
        assert!(!args.show_progress());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.jsonl"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_directory_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = make_args();
        args.input = Some(dir.path().to_path_buf());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
