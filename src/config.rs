//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salesreport.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".salesreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Upload server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "sales_report.xlsx".to_string()
}

/// Spreadsheet rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Name of the single worksheet.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Header row fill colour, `#RRGGBB`.
    #[serde(default = "default_header_color")]
    pub header_color: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            header_color: default_header_color(),
        }
    }
}

fn default_sheet_name() -> String {
    "Sales Report".to_string()
}

fn default_header_color() -> String {
    "#D7E4BC".to_string()
}

/// HTTP upload server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    /// Accepted upload file extensions (without the dot).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl ServerConfig {
    /// Upload body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_mb() -> usize {
    64
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["jsonl".to_string()]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.salesreport.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for the run: `--quiet` wins, then `verbose` from file or flag.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if self.general.verbose && !args.quiet {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Check values that serde cannot validate on its own.
    pub fn validate(&self) -> Result<()> {
        crate::report::parse_hex_color(&self.report.header_color)
            .context("Invalid [report] header_color")?;

        if self.report.sheet_name.trim().is_empty() {
            bail!("[report] sheet_name must not be empty");
        }
        if self.server.port == 0 {
            bail!("[server] port must be non-zero");
        }
        if self.server.max_upload_mb == 0 {
            bail!("[server] max_upload_mb must be at least 1");
        }
        if self.server.allowed_extensions.is_empty() {
            bail!("[server] allowed_extensions must list at least one extension");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
