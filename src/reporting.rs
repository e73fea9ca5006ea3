//! Console and JSON output for scan results.
//!
//! Terminal output goes to stdout with color; logs go to stderr through
//! `tracing`, so piping `--format json` stays machine readable.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::analysis::ImageInfo;
use crate::pe::machine_name;
use crate::types::{CapabilityVerdict, Discovery, ScanSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Terminal,
    /// JSON output for machine consumption
    Json,
}

/// Prints the capable names found under the scan root.
pub fn print_discovery(discovery: &Discovery) {
    println!("{} {}", "Scanned".bold(), discovery.root.display());

    if discovery.capable.is_empty() {
        println!(
            "{}",
            format!(
                "No network-capable executables among {} {}.",
                discovery.candidates(),
                pluralize("candidate", discovery.candidates())
            )
            .dimmed()
        );
        return;
    }

    println!(
        "Found {} network-capable {}:",
        discovery.capable.len().to_string().cyan().bold(),
        pluralize("executable", discovery.capable.len())
    );
    for name in &discovery.capable {
        println!("   {name}");
    }

    let failures = discovery.parse_failures();
    if failures > 0 {
        println!(
            "{}",
            format!(
                "{failures} {} could not be parsed and counted as not capable.",
                pluralize("file", failures)
            )
            .yellow()
        );
    }
}

/// Prints what happened to the rule file.
pub fn print_summary(summary: &ScanSummary, rule_path: &Path, discovery: &Discovery) {
    if summary.added == 0 {
        println!("{}", "Nothing to add: rule file already up to date.".green());
    } else {
        let verb = if summary.dry_run { "Would add" } else { "Added" };
        println!(
            "{verb} {} new process {} to {}:",
            summary.added.to_string().green().bold(),
            pluralize("name", summary.added),
            rule_path.display()
        );
        for name in &summary.appended {
            println!("   {} {name}", "+".green());
        }
    }
    println!(
        "{}",
        format!(
            "{} candidates, {} capable files, {} unique names in {:?}",
            discovery.candidates(),
            discovery.capable_files(),
            summary.found,
            duration(discovery)
        )
        .dimmed()
    );
}

#[derive(Serialize)]
struct ScanReport<'a> {
    discovery: &'a Discovery,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a ScanSummary>,
}

/// Writes the whole scan as one JSON document.
///
/// # Errors
/// Returns error if serialization fails.
pub fn print_json(discovery: &Discovery, summary: Option<&ScanSummary>) -> Result<()> {
    println!("{}", render_json(discovery, summary)?);
    Ok(())
}

/// Renders the scan report. Without a summary (the rule file could not be
/// used) only the discovery is included.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_json(discovery: &Discovery, summary: Option<&ScanSummary>) -> Result<String> {
    let report = ScanReport { discovery, summary };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[derive(Serialize)]
struct Inspection<'a> {
    path: &'a Path,
    #[serde(flatten)]
    verdict: &'a CapabilityVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a ImageInfo>,
}

/// Prints one file's verdict and import table.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn print_inspection(
    path: &Path,
    verdict: &CapabilityVerdict,
    image: Option<&ImageInfo>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        let report = Inspection {
            path,
            verdict,
            image,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "File:".bold(), path.display());
    match verdict {
        CapabilityVerdict::Capable { evidence } => {
            println!("{} {}", "capable".green().bold(), format!("({evidence})").dimmed());
        }
        CapabilityVerdict::NotCapable => println!("{}", "not capable".normal()),
        CapabilityVerdict::ParseFailed { reason } => {
            println!("{} {}", "parse failed:".yellow().bold(), reason);
        }
    }

    let Some(image) = image else {
        return Ok(());
    };
    println!(
        "{} {} {}",
        image.kind.to_string().bold(),
        machine_name(image.machine),
        format!("({:#06x})", image.machine).dimmed()
    );
    if !image.sections.is_empty() {
        println!("{} {}", "Sections:".bold(), image.sections.join(" "));
    }
    for dll in &image.imports {
        let ordinals = if dll.ordinal_count > 0 {
            format!(" (+{} by ordinal)", dll.ordinal_count)
        } else {
            String::new()
        };
        println!("  {}{}", dll.dll_name.cyan(), ordinals.dimmed());
        for symbol in &dll.symbols {
            println!("      {symbol}");
        }
    }
    Ok(())
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn duration(discovery: &Discovery) -> Duration {
    let ms = u64::try_from(discovery.duration_ms).unwrap_or(u64::MAX);
    Duration::from_millis(ms)
}
