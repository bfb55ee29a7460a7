//! Main entry point for the storezip CLI application.
//!
//! This binary packs local files into uncompressed ZIP archives and lists or
//! tests existing archives.

use anyhow::{Result, bail};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::path::Path;
use std::sync::Arc;

use storezip::cli::{Command, PackArgs};
use storezip::pack::{collect_sources, load_entries};
use storezip::{ArchiveReader, Cli, LocalFileReader, build_zip_async};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp_millis()
        .init();

    match &cli.command {
        Command::Pack(args) => pack(args, &cli).await,
        Command::List { archive, verbose } => list_files(archive, *verbose).await,
        Command::Test { archive } => test_archive(archive, &cli).await,
    }
}

/// Collect the inputs, build the archive and write it to disk.
async fn pack(args: &PackArgs, cli: &Cli) -> Result<()> {
    let sources = collect_sources(&args.inputs, &args.options())?;
    if sources.is_empty() {
        bail!("Nothing to do: no files matched the inputs");
    }

    let entries = load_entries(&sources).await?;
    if !cli.is_quiet() {
        for entry in &entries {
            let size = entry.data.as_ref().map_or(0, |d| d.len() as u64);
            println!("  adding: {} ({})", entry.path, format_size(size));
        }
    }

    let archive = build_zip_async(entries).await?;
    tokio::fs::write(&args.output, archive.as_bytes()).await?;
    info!("wrote {} ({})", args.output.display(), archive.media_type());

    if !cli.is_quiet() {
        println!(
            "{}: {} files, {}",
            args.output.display(),
            archive.entry_count(),
            format_size(archive.size() as u64)
        );
    }

    Ok(())
}

/// List files in the ZIP archive.
///
/// The verbose format adds sizes, CRCs and timestamps plus a summary line.
async fn list_files(path: &Path, verbose: bool) -> Result<()> {
    let reader = ArchiveReader::new(Arc::new(LocalFileReader::new(path)?));
    let entries = reader.list_files().await?;

    if verbose {
        println!(
            "{:>10}  {:>6}  {:>8}  {:>10}  {:>5}  Name",
            "Length", "Method", "CRC-32", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_size = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        if verbose {
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();
            let method = match entry.compression_method.as_u16() {
                0 => "Stored".to_string(),
                8 => "Defl".to_string(),
                other => other.to_string(),
            };

            println!(
                "{:>10}  {:>6}  {:08x}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                method,
                entry.crc32,
                year,
                month,
                day,
                hour,
                minute,
                entry.file_name
            );

            if !entry.is_directory {
                total_size += entry.uncompressed_size;
                file_count += 1;
            }
        } else {
            println!("{}", entry.file_name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!("{:>10}  {:>40}  {} files", total_size, "", file_count);
    }

    Ok(())
}

/// Check every entry's CRC, like `unzip -t`.
async fn test_archive(path: &Path, cli: &Cli) -> Result<()> {
    let reader = ArchiveReader::new(Arc::new(LocalFileReader::new(path)?));
    let report = reader.verify().await?;

    if !cli.is_very_quiet() {
        for (name, reason) in &report.failures {
            println!("    testing: {:<40}  FAILED ({})", name, reason);
        }
    }

    if !report.is_ok() {
        bail!(
            "{} of {} entries in {} failed",
            report.failures.len(),
            report.checked,
            path.display()
        );
    }

    if !cli.is_quiet() {
        println!(
            "No errors detected in {} ({} entries).",
            path.display(),
            report.checked
        );
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
