use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use env_logger::Env;
use sch_netlist::{ResolveOptions, Severity};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum HierLabelMode {
    Error,
    Warning,
}

/// Resolve the flat netlist of a hierarchical schematic design.
#[derive(Parser)]
#[command(name = "schnet")]
#[command(version)]
struct Cli {
    /// Sheet documents, one (sheet ...) form per file
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Name of the root sheet; defaults to the sheet in the first file
    #[arg(long, value_name = "SHEET")]
    root: Option<String>,

    /// Output format for the net map (diagnostics go to stderr)
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Severity of hierarchical labels with no matching sheet pin
    #[arg(long = "hier-labels", value_enum, default_value_t = HierLabelMode::Error)]
    hier_labels: HierLabelMode,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    let mut documents = Vec::with_capacity(cli.files.len());
    for file in &cli.files {
        let text = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        documents.push((file.display().to_string(), text));
    }

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => first_sheet_name(&documents)?,
    };
    log::info!("resolving design rooted at '{root}'");

    let design = sch_core::load_design(&root, &documents)?;
    let options = ResolveOptions {
        unresolved_hier_label: match cli.hier_labels {
            HierLabelMode::Error => Severity::Error,
            HierLabelMode::Warning => Severity::Warning,
        },
        ..ResolveOptions::default()
    };
    let resolution = sch_netlist::resolve(&design, &options)?;

    for diag in &resolution.diagnostics {
        if diag.is_error() {
            eprintln!("{}", diag.to_string().red());
        } else {
            eprintln!("{}", diag.to_string().yellow());
        }
    }

    match cli.format {
        Format::Text => print!("{}", resolution.netlist),
        Format::Json => println!("{}", resolution.netlist.to_json()?),
    }

    if resolution.has_errors() {
        anyhow::bail!(
            "netlist has {} error diagnostic(s)",
            resolution
                .diagnostics
                .iter()
                .filter(|diag| diag.is_error())
                .count()
        );
    }
    Ok(())
}

/// The name of the sheet in the first document, used as the default root.
fn first_sheet_name(documents: &[(String, String)]) -> anyhow::Result<String> {
    let (document, text) = documents.first().context("no input files")?;
    let (sheet, _) = sch_core::parse_sheet(document, text)?;
    Ok(sheet.name)
}
