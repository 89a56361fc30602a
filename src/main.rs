//! CropDoc - plant disease diagnosis client
//!
//! A CLI tool that uploads a plant photo to a disease classification API
//! and ranks the returned probabilities by plant and condition.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, connection, config, etc.)
//!   2 - Leading condition is a disease and --fail-on-disease was given

mod analysis;
mod cli;
mod client;
mod config;
mod input;
mod models;
mod report;

use analysis::LabelConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME, DEFAULT_REPORT_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use input::{ImageInput, ImageLoader, InputConfig};
use models::{ClassificationMap, HealthStatus, Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
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

    // Initialize logging
    init_logging(&args);

    info!("CropDoc v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_diagnosis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Diagnosis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .cropdoc.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the API endpoint, healthy markers, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete diagnosis workflow. Returns exit code (0 or 2).
async fn run_diagnosis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let labels = LabelConfig::from(&config.labels);
    debug!("Healthy markers: {:?}", labels.healthy_markers);

    // Step 1: Load the input
    let image = match args.image {
        Some(ref path) => Some(load_image(path, &config)?),
        None => None,
    };

    if args.dry_run {
        if let Some(ref image) = image {
            return handle_dry_run(image, &config);
        }
    }

    // Step 2: Obtain the classification map
    let (outcome, api_url) = match (&image, &args.results) {
        (Some(image), _) => (
            classify_image(image, &config, args.quiet).await?,
            Some(config.api.url.clone()),
        ),
        (None, Some(results)) => {
            println!("📂 Reading saved results: {}", results.display());
            (ClassifyOutcome::from_map(input::load_results(results)?), None)
        }
        (None, None) => anyhow::bail!("Either --image or --results is required"),
    };
    let ClassifyOutcome {
        map,
        used_fallback,
        note,
    } = outcome;

    // Step 3: Aggregate
    let diagnosis = analysis::diagnose(&map, &labels)
        .context("Classifier output could not be diagnosed")?;
    info!(
        "Diagnosis: {} / {} ({} conditions across {} plant group(s))",
        diagnosis.leading_plant.plant_type,
        diagnosis.leading_condition.display_name,
        diagnosis.condition_count(),
        diagnosis.groups.len()
    );

    let report = Report {
        metadata: ReportMetadata {
            source: args.source(),
            api_url,
            analysis_date: Utc::now(),
            image: image.map(|i| i.info),
            used_fallback,
            note,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        diagnosis,
    };

    // Step 4: Render
    println!("\n🌿 Diagnosis\n");
    println!("{}", report::generate_text_summary(&report, &config.report)?);

    if let Some(output_path) = output_path(&args, &config) {
        let output = match args.format {
            OutputFormat::Json => report::generate_json_report(&report)?,
            OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report)?,
        };

        std::fs::write(&output_path, &output)
            .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

        println!("✅ Report saved to: {}", output_path.display());
    }

    if args.fail_on_disease && report.diagnosis.status() == HealthStatus::Diseased {
        eprintln!(
            "\n⛔ Leading condition is a disease ({}). Failing (exit code 2).",
            report.diagnosis.leading_condition.display_name
        );
        return Ok(2);
    }

    Ok(0)
}

/// Classification map plus whether fallback data replaced it.
#[derive(Debug)]
struct ClassifyOutcome {
    map: ClassificationMap,
    used_fallback: bool,
    note: Option<String>,
}

impl ClassifyOutcome {
    fn from_map(map: ClassificationMap) -> Self {
        Self {
            map,
            used_fallback: false,
            note: None,
        }
    }
}

/// Upload the image, falling back to sample data when configured to.
async fn classify_image(image: &ImageInput, config: &Config, quiet: bool) -> Result<ClassifyOutcome> {
    let client = client::ClassifierClient::new(client::ClientConfig::from(&config.api))?;

    println!("🔬 Sending {} to {}", image.file_name, client.api_url());

    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Waiting for classifier...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let result = client.classify(image).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(map) => Ok(ClassifyOutcome::from_map(map)),
        Err(e) if config.api.fallback_to_sample => {
            warn!("Classification failed, using sample data: {:#}", e);
            Ok(ClassifyOutcome {
                map: client::sample_classification(),
                used_fallback: true,
                note: Some(format!(
                    "Classification request failed ({:#}); showing built-in sample data.",
                    e
                )),
            })
        }
        Err(e) => Err(e),
    }
}

/// Validate and read the image to upload.
fn load_image(path: &Path, config: &Config) -> Result<ImageInput> {
    let loader = ImageLoader::new(InputConfig::from(&config.input));
    let image = loader.load(path)?;
    info!(
        "Image: {} ({} {}x{}, {})",
        image.path.display(),
        image.info.format,
        image.info.width,
        image.info.height,
        image.info.size_display()
    );
    Ok(image)
}

/// Handle --dry-run: describe the image, make no request.
fn handle_dry_run(image: &ImageInput, config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: no request will be sent\n");
    println!("   📄 {}", image.path.display());
    println!("   Format: {} ({})", image.info.format, image.mime_type);
    println!("   Dimensions: {} x {} px", image.info.width, image.info.height);
    println!("   Aspect ratio: {}", image.info.aspect_ratio_display());
    println!("   Size: {}", image.info.size_display());
    println!("   Endpoint: {}", config.api.url);
    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Where to write the report, if anywhere.
fn output_path(args: &Args, config: &Config) -> Option<PathBuf> {
    if let Some(ref path) = args.output {
        return Some(path.clone());
    }
    if !config.general.write_report {
        return None;
    }

    let path = PathBuf::from(&config.general.output);
    if args.format == OutputFormat::Json && config.general.output == DEFAULT_REPORT_FILE {
        Some(path.with_extension("json"))
    } else {
        Some(path)
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
