//! List command - manage the local shopping list file.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use bonmatch_core::{Fulfillment, JsonShoppingList, ShoppingList};

use super::default_list_path;

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Shopping list file (default: data dir)
    #[arg(long, global = true)]
    list_file: Option<PathBuf>,

    /// List uuid or name (default: first list)
    #[arg(short, long, global = true)]
    list: Option<String>,

    #[command(subcommand)]
    command: ListCommand,
}

#[derive(Subcommand)]
enum ListCommand {
    /// Show lists and their items
    Show,

    /// Add an item, creating the list file if needed
    Add {
        /// Item name
        name: String,
        /// Item specification (e.g. "1L", "bio")
        #[arg(short, long, default_value = "")]
        spec: String,
    },

    /// Remove an item
    Remove {
        /// Item name
        name: String,
    },

    /// Check an item off
    Check {
        /// Item name
        name: String,
    },
}

pub async fn run(args: ListArgs) -> anyhow::Result<()> {
    let path = args.list_file.clone().unwrap_or_else(default_list_path);
    let list = args.list.as_deref();

    let store = match &args.command {
        ListCommand::Add { .. } if !path.exists() => {
            let store = JsonShoppingList::create(&path, list.unwrap_or("Shopping"))?;
            println!(
                "{} Created shopping list file at {}",
                style("✓").green(),
                path.display()
            );
            store
        }
        _ => {
            if !path.exists() {
                anyhow::bail!(
                    "Shopping list file not found at {}.\n\n\
                     Run 'bonmatch list add <ITEM>' to create one.",
                    path.display()
                );
            }
            JsonShoppingList::open(&path)?
        }
    };

    match args.command {
        ListCommand::Show => show(&store, list),
        ListCommand::Add { name, spec } => {
            store.add_item(list, &name, &spec).await?;
            println!("{} Added {}", style("✓").green(), name);
            Ok(())
        }
        ListCommand::Remove { name } => {
            store.remove_item(list, &name).await?;
            println!("{} Removed {}", style("✓").green(), name);
            Ok(())
        }
        ListCommand::Check { name } => {
            match store.mark_fulfilled(list, &name).await? {
                Fulfillment::Fulfilled => println!("{} Checked off {}", style("✓").green(), name),
                Fulfillment::AlreadyFulfilled => {
                    println!("{} {} was already checked off", style("ℹ").blue(), name)
                }
            }
            Ok(())
        }
    }
}

fn show(store: &JsonShoppingList, list: Option<&str>) -> anyhow::Result<()> {
    let document = store.snapshot();

    let selected = match list {
        Some(_) => vec![document.find(list)?],
        None => document.lists.iter().collect(),
    };

    for data in selected {
        println!(
            "{} ({}, {} open)",
            style(&data.name).bold(),
            data.uuid,
            data.purchase.len()
        );
        for item in &data.purchase {
            if item.specification.is_empty() {
                println!("  [ ] {}", item.name);
            } else {
                println!("  [ ] {} ({})", item.name, item.specification);
            }
        }
        for item in &data.recently {
            println!("  {} {}", style("[x]").dim(), style(&item.name).dim());
        }
    }

    Ok(())
}
