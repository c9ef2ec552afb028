//! Tagloom CLI
//!
//! Resolves the candidate tags reported by one or more passes over a text
//! against a rule table, and prints the resulting document.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use tagloom_common::{LogEntry, Logger, Severity};
use tagloom_parser::{Pass, Resolution, resolve};
use tagloom_rules::RuleTable;
use tagloom_tree::{NodeId, print_tree};

/// Tagloom: resolve overlapping markup candidates into a document tree
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(name = "tagloom")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r"EXAMPLES:
    # Resolve a file with rules and candidates, print the XML form
    tagloom post.txt --rules rules.json --candidates passes.json

    # Resolve inline text and print the tree
    tagloom --text '[b]hi[/b]' -r rules.json -c passes.json --tree

    # Print the document and its log as JSON
    tagloom post.txt -r rules.json -c passes.json --json

    # Show warnings and errors after the output
    tagloom post.txt -r rules.json -c passes.json --log --min-severity warning
")]
struct Cli {
    /// Path to the input text
    #[arg(value_name = "FILE")]
    path: Option<PathBuf>,

    /// Use this text instead of reading a file
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,

    /// Rule table (JSON)
    #[arg(short, long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Passes with their candidates (JSON list)
    #[arg(short, long, value_name = "FILE")]
    candidates: Option<PathBuf>,

    /// Print the XML form (default)
    #[arg(long, conflicts_with_all = ["tree", "json"])]
    xml: bool,

    /// Print the document tree instead of XML
    #[arg(long, conflicts_with = "json")]
    tree: bool,

    /// Print the document and log as JSON
    #[arg(long)]
    json: bool,

    /// Print the resolution log to stderr
    #[arg(short, long)]
    log: bool,

    /// Lowest severity printed by --log
    #[arg(long, default_value = "debug", value_name = "SEVERITY")]
    min_severity: Severity,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = load_text(&cli)?;
    let rules = match &cli.rules {
        Some(path) => load_rules(path)?,
        None => RuleTable::default(),
    };
    let passes = match &cli.candidates {
        Some(path) => load_passes(path)?,
        None => Vec::new(),
    };

    let resolution = resolve(&text, passes, &rules).context("Resolution aborted")?;

    if cli.json {
        print_json(&resolution)?;
    } else if cli.tree && !cli.xml {
        print_tree(resolution.document.tree(), NodeId::ROOT, 0);
    } else {
        println!("{}", resolution.document.to_xml());
    }

    if cli.log {
        print_log(&resolution.log, cli.min_severity);
    }
    Ok(())
}

/// Load the input text from CLI arguments
fn load_text(cli: &Cli) -> Result<String> {
    if let Some(text) = &cli.text {
        Ok(text.clone())
    } else if let Some(path) = &cli.path {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    } else {
        bail!("Expected an input file or --text")
    }
}

fn load_rules(path: &Path) -> Result<RuleTable> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    RuleTable::from_json(&json).with_context(|| format!("Invalid rule table in {}", path.display()))
}

fn load_passes(path: &Path) -> Result<Vec<Pass>> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid passes in {}", path.display()))
}

fn print_json(resolution: &Resolution) -> Result<()> {
    let value = serde_json::json!({
        "document": resolution.document.to_json_value(),
        "log": &resolution.log,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_log(log: &Logger, min_severity: Severity) {
    let entries: Vec<&LogEntry> = log.at_least(min_severity).collect();
    if entries.is_empty() {
        return;
    }
    eprintln!("\n=== Log ({} entries) ===", entries.len());
    for entry in entries {
        let pos = entry.pos.map_or_else(|| "-".to_string(), |p| p.to_string());
        let line = format!("{:>7} @{pos}: {}", entry.severity, entry.message());
        match entry.severity {
            Severity::Debug => eprintln!("{}", line.dimmed()),
            Severity::Warning => eprintln!("{}", line.yellow()),
            Severity::Error => eprintln!("{}", line.red()),
        }
    }
}
