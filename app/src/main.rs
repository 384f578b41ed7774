// ==============================================================================
// main.rs - SNP Extractor Entry Point
// ==============================================================================
// Description: Command line front end for genome SNP extraction
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snp_extractor::config::ExtractorConfig;
use snp_extractor::license::LicenseState;
use snp_extractor::models::{Category, CategoryFilter};
use snp_extractor::output::{output_filename, OutputFormat};
use snp_extractor::processor::{ProcessorError, SnpProcessor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raw data export from 23andMe or AncestryDNA (.txt, optionally .gz)
    genome_file: PathBuf,

    /// Report format (detailed, compact or minimal)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Comma-separated categories to include (default: all)
    #[arg(short, long, value_delimiter = ',')]
    categories: Vec<Category>,

    /// SNP list JSON to use instead of the bundled free list
    #[arg(long, env = "SNP_CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Premium license key
    #[arg(long, env = "SNP_LICENSE_KEY", hide_env_values = true)]
    license_key: Option<String>,

    /// License service base URL
    #[arg(long, env = "SNP_LICENSE_SERVICE_URL")]
    license_url: Option<String>,

    /// Output path, or "-" for stdout (default: dated file in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print per-category match counts as JSON instead of a report
    #[arg(long)]
    estimate: bool,
}

/// User-facing message on top, technical cause underneath
fn user_error(err: ProcessorError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads env fallbacks
    dotenvy::dotenv().ok();

    // Initialize tracing (stderr keeps stdout free for reports)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snp_extractor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!("SNP Extractor v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = ExtractorConfig::from_env().context("Invalid configuration")?;
    if let Some(catalog) = args.catalog.clone() {
        config.catalog_path = Some(catalog);
    }
    if let Some(url) = args.license_url.clone() {
        config.license_service_url = url;
    }
    let format = args.format.unwrap_or(config.default_format);

    let mut processor = SnpProcessor::from_config(&config).await.map_err(user_error)?;

    // Unlock premium list if a key was supplied
    if let Some(key) = args.license_key.as_deref() {
        match processor.activate_license(key).await.map_err(user_error)? {
            LicenseState::Validated { .. } if processor.is_premium() => {
                info!("Using premium SNP list {}", processor.active_catalog().version);
            }
            state => {
                let reason = processor
                    .license()
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("{:?}", state));
                warn!("Premium list unavailable ({}), using free list", reason);
            }
        }
    }

    processor
        .load_genome_file(&args.genome_file)
        .await
        .map_err(user_error)?;

    let filter = if args.categories.is_empty() {
        CategoryFilter::all()
    } else {
        CategoryFilter::only(args.categories.iter().copied())
    };

    if args.estimate {
        let estimate = processor.estimate(&filter).map_err(user_error)?;
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    let result = processor.extract(&filter).map_err(user_error)?;
    let (report, stats) = processor.render(&result, format).map_err(user_error)?;

    match args.output {
        Some(path) if path.as_os_str() == "-" => {
            std::io::stdout()
                .write_all(report.as_bytes())
                .context("Failed to write report to stdout")?;
        }
        target => {
            let path = target.unwrap_or_else(|| {
                PathBuf::from(output_filename(format, chrono::Local::now().date_naive()))
            });
            tokio::fs::write(&path, &report)
                .await
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            info!("Report written to {:?}", path);
        }
    }

    info!(
        "{} found, {} no-call, {} missing of {} | {} (~{} tokens)",
        result.summary.found,
        result.summary.no_call,
        result.summary.missing,
        result.summary.total,
        stats.size_label,
        stats.approx_tokens
    );

    Ok(())
}
