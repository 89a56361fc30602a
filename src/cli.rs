//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// CropDoc - plant disease diagnosis from a photo
///
/// Uploads a plant photo to a disease classification API and ranks the
/// returned probabilities per plant and condition.
///
/// Examples:
///   cropdoc --image leaf.jpg
///   cropdoc --image leaf.jpg --api-url https://classifier.example.org/api/predict
///   cropdoc --results response.json --format json --output diagnosis.json
///   cropdoc --image leaf.jpg --dry-run
///   cropdoc --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Plant photo to upload for classification
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["results", "init_config"],
        conflicts_with = "results"
    )]
    pub image: Option<PathBuf>,

    /// Saved classifier response (JSON) to diagnose without calling the API
    #[arg(short, long, value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// Classification endpoint URL
    ///
    /// Can also be set via CROPDOC_API_URL env var or .cropdoc.toml config.
    #[arg(long, value_name = "URL", env = "CROPDOC_API_URL")]
    pub api_url: Option<String>,

    /// Output file path for the report
    ///
    /// If not specified, only the terminal summary is printed.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cropdoc.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries after a failed request
    #[arg(long, value_name = "NUM")]
    pub retries: Option<usize>,

    /// Continue with built-in sample data if the request fails
    #[arg(long)]
    pub fallback_sample: bool,

    /// Exit with code 2 when the leading condition is a disease
    #[arg(long)]
    pub fail_on_disease: bool,

    /// Maximum plant groups to show (0 = all)
    #[arg(long, value_name = "COUNT")]
    pub max_groups: Option<usize>,

    /// Extra condition word meaning "healthy" (repeatable)
    #[arg(long = "healthy-marker", value_name = "WORD")]
    pub healthy_markers: Vec<String>,

    /// Dry run: validate the image and show its details without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .cropdoc.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.image.is_none() && self.results.is_none() {
            return Err("Either --image or --results is required".to_string());
        }

        if self.dry_run && self.image.is_none() {
            return Err("--dry-run requires --image".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.healthy_markers.iter().any(|m| m.trim().is_empty()) {
            return Err("Healthy markers must not be empty".to_string());
        }

        for path in [&self.image, &self.results].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("File does not exist: {}", path.display()));
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

    /// Human-readable description of where the classification comes from.
    pub fn source(&self) -> String {
        self.image
            .as_ref()
            .or(self.results.as_ref())
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args(image: PathBuf) -> Args {
        Args {
            image: Some(image),
            results: None,
            api_url: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            timeout: None,
            retries: None,
            fallback_sample: false,
            fail_on_disease: false,
            max_groups: None,
            healthy_markers: Vec::new(),
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        let file = NamedTempFile::new().unwrap();
        let args = make_args(file.path().to_path_buf());
        assert!(args.validate().is_ok());
        assert_eq!(args.source(), file.path().display().to_string());
    }

    #[test]
    fn test_validation_missing_file() {
        let args = make_args(PathBuf::from("/nonexistent/leaf.jpg"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        args.api_url = Some("ftp://classifier".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_dry_run_needs_image() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        args.image = None;
        args.results = Some(file.path().to_path_buf());
        args.dry_run = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "cropdoc",
            "--results",
            "response.json",
            "--format",
            "json",
            "--healthy-marker",
            "sano",
            "--healthy-marker",
            "gezond",
        ])
        .unwrap();
        assert_eq!(args.results, Some(PathBuf::from("response.json")));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.healthy_markers, vec!["sano", "gezond"]);
    }

    #[test]
    fn test_image_and_results_conflict() {
        let parsed = Args::try_parse_from(["cropdoc", "--image", "a.jpg", "--results", "b.json"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_log_level() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
