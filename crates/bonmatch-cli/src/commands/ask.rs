//! Ask command - query the oracle for a single receipt line.

use std::path::Path;

use clap::Args;
use console::style;

use super::{ReferenceArgs, build_matcher, load_config};

/// Arguments for the ask command.
#[derive(Args)]
pub struct AskArgs {
    /// Receipt line as it appears on the receipt
    #[arg(required = true)]
    item: String,

    #[command(flatten)]
    references: ReferenceArgs,

    /// Model to ask (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

pub async fn run(args: AskArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    let client = build_matcher(&mut config, args.model.as_deref())?;

    let (references, _) = args.references.load(false).await?;

    let answer = client.ask(args.item.trim(), &references).await;

    match references.resolve(&answer) {
        Some(name) => println!("{} {} -> {}", style("✓").green(), args.item, name),
        None => println!("{} {} -> {}", style("-").dim(), args.item, answer),
    }

    Ok(())
}
