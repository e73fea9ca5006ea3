// src/cli/handlers.rs
use crate::analysis::{self, Analyzer, Engine};
use crate::cli::args::ScanArgs;
use crate::config::Config;
use crate::exit::NetsieveExit;
use crate::reporting::{self, OutputFormat};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Handles the scan command.
///
/// Found names are reported even when the rule file turns out to be
/// unusable: the terminal report prints them before the rule file is
/// touched, and the JSON report is emitted without a summary.
///
/// # Errors
/// Returns error if the config, the scan root or the rule file is unusable.
pub fn handle_scan(
    args: &ScanArgs,
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<NetsieveExit> {
    let mut config = Config::load(config)?;
    if args.follow_links {
        config.scan.follow_links = true;
    }
    if let Some(jobs) = args.jobs {
        config.scan.jobs = jobs;
    }
    if let Some(marker) = &args.marker {
        config.rules.marker.clone_from(marker);
        config.validate(Path::new("--marker"))?;
    }
    debug!(?config, "effective configuration");

    let mut engine = Engine::from_config(&config);
    engine.set_dry_run(args.dry_run);

    let discovery = engine.discover(&args.root)?;
    if format == OutputFormat::Terminal {
        reporting::print_discovery(&discovery);
    }

    let summary = match engine.persist(&discovery, &args.rules) {
        Ok(summary) => summary,
        Err(e) => {
            if format == OutputFormat::Json {
                reporting::print_json(&discovery, None)?;
            }
            return Err(e.into());
        }
    };
    match format {
        OutputFormat::Terminal => reporting::print_summary(&summary, &args.rules, &discovery),
        OutputFormat::Json => reporting::print_json(&discovery, Some(&summary))?,
    }

    Ok(NetsieveExit::Success)
}

/// Handles the inspect command.
///
/// # Errors
/// Returns error if the config is invalid or the output cannot be written.
pub fn handle_inspect(
    file: &Path,
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<NetsieveExit> {
    let config = Config::load(config)?;
    let analyzer = Analyzer::new(config.heuristics());

    let verdict = analyzer.analyze(file);
    // A file that fails to parse still gets its verdict printed.
    let image = analysis::inspect_image(file).ok();

    reporting::print_inspection(file, &verdict, image.as_ref(), format)
        .with_context(|| format!("failed to report on {}", file.display()))?;
    Ok(NetsieveExit::Success)
}
