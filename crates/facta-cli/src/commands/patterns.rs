//! Patterns command - inspect or reset the learned pattern store.

use clap::{Args, Subcommand};
use console::style;

use facta_core::invoice::rules::numbers::format_amount;
use facta_core::store::PatternStore;

use super::{load_config, store_path};

/// Arguments for the patterns command.
#[derive(Args)]
pub struct PatternsArgs {
    #[command(subcommand)]
    command: PatternsCommand,
}

#[derive(Subcommand)]
enum PatternsCommand {
    /// List stored patterns, oldest first
    List,

    /// Remove every stored pattern
    Clear,

    /// Show the pattern store path
    Path,
}

pub async fn run(args: PatternsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = store_path(&config);

    match args.command {
        PatternsCommand::List => {
            let store = PatternStore::open(&path, config.patterns.clone());
            if store.is_empty() {
                println!("{} No stored patterns in {}", style("ℹ").blue(), path.display());
                return Ok(());
            }

            for pattern in store.patterns() {
                let first_line = pattern
                    .sample_text
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or("");
                let preview: String = first_line.chars().take(40).collect();
                println!(
                    "{}  {}  {:<18} {:>14} {}  {}",
                    style(pattern.id).dim(),
                    pattern.created_at.format("%Y-%m-%d %H:%M"),
                    pattern.method.as_str(),
                    format_amount(pattern.structure.amounts.total),
                    pattern.structure.currency,
                    preview
                );
            }
            println!();
            println!("{} patterns", store.len());
        }
        PatternsCommand::Clear => {
            let mut store = PatternStore::open(&path, config.patterns.clone());
            let removed = store.len();
            store.reset()?;
            println!(
                "{} Removed {} patterns from {}",
                style("✓").green(),
                removed,
                path.display()
            );
        }
        PatternsCommand::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}
