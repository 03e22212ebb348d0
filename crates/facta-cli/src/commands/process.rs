//! Process command - extract amounts from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use facta_core::ExtractionOrchestrator;

use super::{extract_one, load_config, open_store};
use crate::output::{format_record, OutputFormat};
use crate::reader::{is_supported, DocumentReader};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, text dump or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Use this file as the OCR text instead of running the OCR command
    #[arg(long, value_name = "FILE")]
    ocr_text: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Manually override a field after extraction (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    overrides: Vec<String>,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_supported(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    // Parse overrides up front so a typo fails before any work is done
    let overrides = args
        .overrides
        .iter()
        .map(|o| {
            o.split_once('=')
                .map(|(field, value)| (field.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid override '{}', expected FIELD=VALUE", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);

    let ocr_text = match &args.ocr_text {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };

    let reader = DocumentReader::new(&config);
    let orchestrator = Arc::new(ExtractionOrchestrator::new(config.clone(), open_store(&config)));

    pb.set_message("Extracting amounts...");
    let mut record = extract_one(&reader, orchestrator, &args.input, ocr_text).await;

    pb.finish_and_clear();

    for (field, value) in &overrides {
        record.apply_override(field, value)?;
        debug!("Override applied: {} = {}", field, value);
    }

    if !record.warnings.is_empty() {
        eprintln!("{}", style("Warnings:").yellow());
        for warning in &record.warnings {
            eprintln!("  - {}", warning);
        }
    }

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
