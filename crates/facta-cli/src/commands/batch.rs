//! Batch processing command for multiple invoice files.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::StreamExt;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use facta_core::models::record::{ExtractionMethod, InvoiceRecord};
use facta_core::{deduplicate, ExtractionOrchestrator};

use super::{extract_one, load_config, open_store};
use crate::output::{format_record, write_report, OutputFormat};
use crate::reader::{is_supported, DocumentReader};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for per-file results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Currency-grouped report CSV (default: <output-dir>/report.csv)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Keep records that repeat an invoice number
    #[arg(long)]
    no_dedup: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let reader = Arc::new(DocumentReader::new(&config));
    let orchestrator = Arc::new(ExtractionOrchestrator::new(config.clone(), open_store(&config)));

    // Results come back in input order; the store lock serializes cache writes
    let records: Vec<InvoiceRecord> = futures_util::stream::iter(files)
        .map(|path| {
            let reader = Arc::clone(&reader);
            let orchestrator = Arc::clone(&orchestrator);
            let pb = pb.clone();
            async move {
                let record = extract_one(&reader, orchestrator, &path, None).await;
                pb.inc(1);
                record
            }
        })
        .buffered(args.jobs.max(1))
        .collect()
        .await;

    pb.finish_and_clear();

    let processed = records.len();

    let records = if args.no_dedup {
        records
    } else {
        deduplicate(records)
    };
    let duplicates = processed - records.len();
    if duplicates > 0 {
        info!("Dropped {} duplicate invoices", duplicates);
    }

    if let Some(ref output_dir) = args.output_dir {
        for record in &records {
            let stem = PathBuf::from(&record.source_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("invoice")
                .to_string();
            let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));
            fs::write(&output_path, format_record(record, args.format)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    let report_path = args
        .report
        .clone()
        .or_else(|| args.output_dir.as_ref().map(|d| d.join("report.csv")));
    if let Some(report_path) = report_path {
        write_report(&report_path, &records)?;
        println!(
            "{} Report written to {}",
            style("✓").green(),
            report_path.display()
        );
    }

    let mut by_method: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &records {
        *by_method.entry(record.method.as_str()).or_default() += 1;
    }
    let failed: Vec<&InvoiceRecord> = records
        .iter()
        .filter(|r| matches!(r.method, ExtractionMethod::Failed | ExtractionMethod::Error))
        .collect();

    println!();
    println!(
        "{} Processed {} files in {:?} ({} kept, {} duplicates)",
        style("✓").green(),
        processed,
        start.elapsed(),
        records.len(),
        duplicates
    );
    for (method, count) in &by_method {
        println!("   {:<18} {}", method, style(count).cyan());
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Needs review:").red());
        for record in &failed {
            println!(
                "  - {}: {}",
                record.source_name,
                record.warnings.first().map(String::as_str).unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}
