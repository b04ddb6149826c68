//! Extract command - show receipt lines and which ones would be matched.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use serde::Serialize;

use bonmatch_core::{ReceiptExtractor, TextNormalizer};

use super::{ReceiptSource, emit, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Receipt image, or a .txt file
    #[arg(required = true)]
    input: PathBuf,

    /// Print JSON instead of an annotated listing
    #[arg(long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ExtractedLine {
    index: usize,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate: Option<String>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let source = ReceiptSource::new(config.ocr.clone());
    let normalizer = TextNormalizer::new(config.normalization.clone());

    let lines: Vec<ExtractedLine> = source
        .extract(&args.input)?
        .into_iter()
        .map(|line| ExtractedLine {
            candidate: normalizer.normalize_line(&line.text),
            index: line.index,
            text: line.text,
        })
        .collect();

    let output = if args.json {
        serde_json::to_string_pretty(&lines)?
    } else {
        let mut output = String::new();
        for line in &lines {
            let marker = match &line.candidate {
                Some(_) => style("+").green(),
                None => style("-").dim(),
            };
            output.push_str(&format!("{:>3} {} {}\n", line.index, marker, line.text));
        }
        let kept = lines.iter().filter(|l| l.candidate.is_some()).count();
        output.push_str(&format!("\n{} lines, {} candidates", lines.len(), kept));
        output
    };

    emit(&output, args.output.as_deref())
}
