//! Batch command - match several receipts against one list snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use bonmatch_core::{FulfillmentReport, PipelineReport, ReceiptPipeline, apply_mapping};

use super::match_cmd::{OutputFormat, format_report, print_fulfillment};
use super::{ReceiptSource, ReferenceArgs, build_matcher, is_supported_input, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input glob pattern (e.g. "receipts/*.jpg")
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    references: ReferenceArgs,

    /// Check matched items off the list after each receipt
    #[arg(long)]
    apply: bool,

    /// Output directory for per-receipt reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each receipt
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Model to ask (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

/// Result of processing a single receipt.
struct ProcessResult {
    path: PathBuf,
    report: Option<PipelineReport>,
    fulfillment: Option<FulfillmentReport>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    let matcher = build_matcher(&mut config, args.model.as_deref())?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported_input(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} receipts to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let (references, store) = args.references.load(args.apply).await?;
    let list = args.references.list.as_deref();

    let pipeline = ReceiptPipeline::from_config(ReceiptSource::new(config.ocr.clone()), matcher, &config);

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts {msg}")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());

    for path in files {
        overall_pb.set_message(path.display().to_string());

        match pipeline.process(&path, &references).await {
            Ok(report) => {
                let fulfillment = match (&store, args.apply) {
                    (Some(store), true) => Some(apply_mapping(store, list, &report.mapping).await),
                    _ => None,
                };
                results.push(ProcessResult {
                    path,
                    report: Some(report),
                    fulfillment,
                    error: None,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        report: None,
                        fulfillment: None,
                        error: Some(error_msg),
                    });
                } else {
                    overall_pb.abandon();
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    for result in &results {
        if let (Some(report), Some(output_dir)) = (&result.report, &args.output_dir) {
            let output_name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("receipt");

            let extension = match args.format {
                OutputFormat::Json => "json",
                OutputFormat::Csv => "csv",
                OutputFormat::Text => "txt",
            };

            let output_path = output_dir.join(format!("{}.{}", output_name, extension));
            let content = format_report(report, result.fulfillment.as_ref(), args.format)?;

            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let successful = results.iter().filter(|r| r.report.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    let matches: usize = results
        .iter()
        .filter_map(|r| r.report.as_ref())
        .map(|r| r.mapping.len())
        .sum();

    println!();
    println!(
        "{} Processed {} receipts in {:?}, {} matches",
        style("✓").green(),
        results.len(),
        start.elapsed(),
        matches
    );
    println!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );

    for fulfillment in results.iter().filter_map(|r| r.fulfillment.as_ref()) {
        print_fulfillment(fulfillment);
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed receipts:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "lines",
        "candidates",
        "matches",
        "partial",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        if let Some(report) = &result.report {
            wtr.write_record([
                filename,
                "success",
                &report.line_count.to_string(),
                &report.candidates.len().to_string(),
                &report.mapping.len().to_string(),
                &report.mapping.is_partial().to_string(),
                &report.elapsed_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
