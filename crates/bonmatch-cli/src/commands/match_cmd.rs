//! Match command - match one receipt against a shopping list.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::debug;

use bonmatch_core::{FulfillmentReport, PipelineReport, ReceiptPipeline, apply_mapping};

use super::{ReceiptSource, ReferenceArgs, build_matcher, emit, item_spinner, load_config};

/// Arguments for the match command.
#[derive(Args)]
pub struct MatchArgs {
    /// Receipt image, or a .txt file with one line per receipt line
    #[arg(required = true)]
    input: PathBuf,

    #[command(flatten)]
    references: ReferenceArgs,

    /// Check matched items off the list
    #[arg(long)]
    apply: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model to ask (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// JSON shape of one processed receipt.
#[derive(Serialize)]
pub struct MatchOutput<'a> {
    #[serde(flatten)]
    pub report: &'a PipelineReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<&'a FulfillmentReport>,
}

pub async fn run(args: MatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    let matcher = build_matcher(&mut config, args.model.as_deref())?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let (references, store) = args.references.load(args.apply).await?;

    let pipeline = ReceiptPipeline::from_config(ReceiptSource::new(config.ocr.clone()), matcher, &config);

    let pb = item_spinner()?;
    pb.set_message("Reading receipt...");

    let report = pipeline
        .process_with(&args.input, &references, |result| {
            pb.inc(1);
            pb.set_message(result.candidate.text.clone());
        })
        .await;
    pb.finish_and_clear();
    let report = report?;

    let fulfillment = match (&store, args.apply) {
        (Some(store), true) => {
            Some(apply_mapping(store, args.references.list.as_deref(), &report.mapping).await)
        }
        _ => None,
    };

    let output = format_report(&report, fulfillment.as_ref(), args.format)?;
    emit(&output, args.output.as_deref())?;

    if report.mapping.is_partial() {
        eprintln!(
            "{} Run deadline reached, only part of the receipt was matched",
            style("!").yellow()
        );
    }
    if let Some(fulfillment) = &fulfillment {
        print_fulfillment(fulfillment);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn print_fulfillment(report: &FulfillmentReport) {
    eprintln!(
        "{} Checked off {} item(s), {} already done, {} failed",
        style("✓").green(),
        report.fulfilled(),
        report.already_fulfilled(),
        report.failed()
    );
    for item in report.items.iter().filter(|item| item.error.is_some()) {
        eprintln!(
            "  {} {}: {}",
            style("✗").red(),
            item.reference,
            item.error.as_deref().unwrap_or_default()
        );
    }
}

pub fn format_report(
    report: &PipelineReport,
    fulfillment: Option<&FulfillmentReport>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&MatchOutput {
            report,
            fulfillment,
        })?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &PipelineReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["receipt", "reference"])?;
    for (receipt, reference) in report.mapping.iter() {
        wtr.write_record([receipt, reference])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(report: &PipelineReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Receipt: {}\n", report.image.display()));
    output.push_str(&format!(
        "Lines: {} ({} candidates)\n",
        report.line_count,
        report.candidates.len()
    ));
    output.push('\n');

    if report.mapping.is_empty() {
        output.push_str("No list items found on this receipt.\n");
    } else {
        output.push_str("Matches:\n");
        for (receipt, reference) in report.mapping.iter() {
            output.push_str(&format!("  {} -> {}\n", receipt, reference));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonmatch_core::{Candidate, CategorizedMapping};
    use pretty_assertions::assert_eq;

    fn report() -> PipelineReport {
        let mut mapping = CategorizedMapping::new();
        mapping.insert("Frischmilch 1L", "Milk");
        mapping.insert("Kiwi, gold", "Kiwis");
        PipelineReport {
            image: PathBuf::from("receipt.jpg"),
            line_count: 4,
            candidates: vec![Candidate { line: 1, text: "Frischmilch 1L".into() }],
            mapping,
            elapsed_ms: 12,
            processed_at: Default::default(),
        }
    }

    #[test]
    fn test_csv_quotes_commas() {
        let csv = format_report(&report(), None, OutputFormat::Csv).unwrap();
        assert_eq!(
            csv,
            "receipt,reference\nFrischmilch 1L,Milk\n\"Kiwi, gold\",Kiwis\n"
        );
    }

    #[test]
    fn test_text_lists_matches() {
        let text = format_report(&report(), None, OutputFormat::Text).unwrap();
        assert!(text.contains("Frischmilch 1L -> Milk"));
        assert!(text.contains("Lines: 4 (1 candidates)"));
    }

    #[test]
    fn test_json_omits_missing_fulfillment() {
        let json = format_report(&report(), None, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["line_count"], 4);
        assert!(value.get("fulfillment").is_none());
    }
}
