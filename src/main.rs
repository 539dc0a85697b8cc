//! Workbook Slimming CLI
//!
//! Offline front end: the hidden-sheet dependency scan works on workbook
//! files directly, without a live spreadsheet host.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use slim_xlsx::{read_sheet_partition, scan_hidden_references};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report hidden sheets and the visible formulas that depend on them
    Scan {
        /// An .xlsx file, or a directory scanned recursively
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Scan { path } => scan_command(&path),
    }
}

fn scan_command(path: &Path) -> anyhow::Result<()> {
    let files = collect_workbooks(path)?;
    anyhow::ensure!(!files.is_empty(), "no .xlsx files found under {:?}", path);

    for file in &files {
        if let Err(e) = scan_one(file) {
            eprintln!("{}: {e:#}", file.display());
        }
    }
    Ok(())
}

fn scan_one(file: &Path) -> anyhow::Result<()> {
    let partition = read_sheet_partition(file)
        .with_context(|| format!("failed to read workbook {:?}", file))?;

    println!("{}", file.display());
    println!(
        "  sheets: {} visible, {} hidden",
        partition.visible.len(),
        partition.hidden.len()
    );

    if partition.hidden.is_empty() {
        return Ok(());
    }
    for name in &partition.hidden {
        println!("  hidden: {name}");
    }

    let deps = scan_hidden_references(file, &partition.visible, &partition.hidden)
        .with_context(|| format!("failed to scan formulas in {:?}", file))?;

    if deps.is_empty() {
        println!("  no visible formulas depend on hidden sheets");
    } else {
        for (sheet, cells) in &deps {
            println!("  {} -> {} dependent cells: {}", sheet, cells.len(), cells.join(", "));
        }
    }
    Ok(())
}

/// A single file, or every `.xlsx` under a directory. Lock files the host
/// leaves behind (`~$Book.xlsx`) are skipped.
fn collect_workbooks(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    anyhow::ensure!(path.is_dir(), "{:?} is neither a file nor a directory", path);

    let mut files = Vec::new();
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let is_xlsx = p
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        let is_lock_file = p
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("~$"));
        if is_xlsx && !is_lock_file {
            files.push(p.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
