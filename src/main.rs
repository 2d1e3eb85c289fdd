//! SalesReport - JSONL sales export to XLSX report
//!
//! A CLI tool that sums `net_items_sold` per product variant SKU from a
//! JSONL export and writes a styled spreadsheet, or serves an upload form
//! that returns the same report as a download.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, unreadable input, render failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
#[cfg(feature = "serve")]
mod server;

use anyhow::{Context, Result};
use cli::{Args, SummaryFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use report::ReportStyle;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config decides the log level, so it is read before logging starts
    let (config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level(&args));

    info!("SalesReport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    let outcome = if args.serve {
        run_server(&config).await
    } else {
        run_report(&args, &config)
    };

    if let Err(e) = outcome {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .salesreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the sheet, header colour, and upload server.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    DefaultsAfterError(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::DefaultsAfterError(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    let (mut config, source) = if let Some(ref config_path) = args.config {
        (
            Config::load(config_path)?,
            ConfigSource::File(config_path.clone()),
        )
    } else {
        match Config::load_default() {
            Ok(Some(config)) => (config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME))),
            Ok(None) => (Config::default(), ConfigSource::Defaults),
            Err(e) => (Config::default(), ConfigSource::DefaultsAfterError(e)),
        }
    };

    config.merge_with_args(args);
    config.validate()?;
    Ok((config, source))
}

/// Aggregate the input file and write the XLSX report.
fn run_report(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();
    let style = ReportStyle::try_from(&config.report)?;
    let output = PathBuf::from(&config.general.output);
    let source = args.input_label();

    info!("Reading sales lines from {}", source);

    let sales = if args.reads_stdin() {
        report::build_report_from_reader(io::stdin().lock(), &style)?
    } else {
        let path = args.input.as_deref().unwrap_or_else(|| Path::new("-"));
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;

        let progress = if args.show_progress() {
            let len = file.metadata().map(|m| m.len()).unwrap_or(0);
            input_progress_bar(len)
        } else {
            ProgressBar::hidden()
        };

        let reader = BufReader::new(progress.wrap_read(file));
        let built = report::build_report_from_reader(reader, &style)
            .with_context(|| format!("Failed to build report from {}", path.display()));
        progress.finish_and_clear();
        built?
    };

    std::fs::write(&output, &sales.workbook)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    let summary = sales.summary(&source, &output.display().to_string());
    match args.summary {
        SummaryFormat::Text => {
            if !args.quiet {
                print!("\n{}", report::generate_text_summary(&summary));
                println!("   Duration: {:.2}s", start_time.elapsed().as_secs_f64());
                println!("\n✅ Report saved to: {}", output.display());
            }
        }
        SummaryFormat::Json => println!("{}", report::generate_json_summary(&summary)?),
    }

    Ok(())
}

/// Byte-based progress bar for reading a file.
fn input_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(feature = "serve")]
async fn run_server(config: &Config) -> Result<()> {
    println!(
        "🌐 Upload form at http://{}:{}/",
        config.server.bind, config.server.port
    );
    server::run(config).await
}

#[cfg(not(feature = "serve"))]
async fn run_server(_config: &Config) -> Result<()> {
    anyhow::bail!("this build does not include the upload server (enable the `serve` feature)")
}
