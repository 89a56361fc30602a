//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cropdoc.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".cropdoc.toml";

/// Default report file name; a JSON report uses the `.json` extension instead.
pub const DEFAULT_REPORT_FILE: &str = "cropdoc_report.md";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Classification API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Label interpretation settings.
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Image input settings.
    #[serde(default)]
    pub input: InputSettings,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report file written when `write_report` is set and no --output is given.
    ///
    /// Used verbatim for either format, except that the default name becomes
    /// `cropdoc_report.json` under `--format json`.
    #[serde(default = "default_output")]
    pub output: String,

    /// Always write a report file.
    #[serde(default)]
    pub write_report: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            write_report: false,
        }
    }
}

fn default_output() -> String {
    DEFAULT_REPORT_FILE.to_string()
}

/// Classification API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Prediction endpoint receiving the multipart upload.
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Multipart field carrying the image.
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries after a failed attempt.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Continue with the built-in sample response when the request fails.
    #[serde(default)]
    pub fallback_to_sample: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            field_name: default_field_name(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            fallback_to_sample: false,
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000/api/predict".to_string()
}

fn default_field_name() -> String {
    "file".to_string()
}

fn default_timeout() -> u64 {
    60 // model is loaded per request on the server side
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay() -> u64 {
    500
}

/// Label interpretation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Condition tokens meaning "healthy" (case-insensitive).
    #[serde(default = "default_healthy_markers")]
    pub healthy_markers: Vec<String>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            healthy_markers: default_healthy_markers(),
        }
    }
}

fn default_healthy_markers() -> Vec<String> {
    crate::analysis::DEFAULT_HEALTHY_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

/// Image input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Accepted image file extensions.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Maximum image size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum plant groups to render (0 = all).
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,

    /// Width of probability bars in the terminal summary.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,

    /// Include the image details section.
    #[serde(default = "default_true")]
    pub include_image_details: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_groups: default_max_groups(),
            bar_width: default_bar_width(),
            include_image_details: true,
        }
    }
}

fn default_max_groups() -> usize {
    10
}

fn default_bar_width() -> usize {
    20
}

fn default_true() -> bool {
    true
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

    /// Try to load `.cropdoc.toml` from a directory.
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
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.api.retries = retries;
        }
        if args.fallback_sample {
            self.api.fallback_to_sample = true;
        }

        if !args.healthy_markers.is_empty() {
            self.labels
                .healthy_markers
                .extend(args.healthy_markers.iter().cloned());
        }

        if let Some(max_groups) = args.max_groups {
            self.report.max_groups = max_groups;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
