//! `leadsync process` - reconcile one CSV file against the lead API.

use std::path::PathBuf;

use tracing::info;

use leadsync_config::{LogLevel, Settings};
use leadsync_hub_client::{HttpLeadApi, RetryPolicy};
use leadsync_io::SourceError;
use leadsync_recon::{BatchOptions, BatchReport, BatchRunner, DuplicatePolicy, LeadReport, Outcome, Reconciler};

use crate::exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_SOURCE_FORMAT, EXIT_SOURCE_IO, EXIT_USAGE};
use crate::logging;
use crate::CliError;

pub struct ProcessArgs {
    pub file: PathBuf,
    pub api_url: Option<String>,
    pub config: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub concurrency: Option<usize>,
    pub duplicates: Option<DuplicatePolicy>,
    pub json: bool,
}

pub fn cmd_process(args: ProcessArgs) -> Result<(), CliError> {
    let settings = resolve_settings(&args)?;
    let dispatch = logging::dispatch_for(settings.log_level);

    tracing::dispatcher::with_default(&dispatch, || {
        info!(file = %args.file.display(), api_url = %settings.api_url, "starting lead processing");

        if !args.json {
            println!("Processing leads from: {}", args.file.display());
            println!("API URL: {}", settings.api_url);
        }

        let leads = leadsync_io::read_leads(&args.file).map_err(source_error)?;
        info!(count = leads.len(), "lead file read");
        if !args.json {
            println!("Found {} leads to process", leads.len());
        }

        let api = HttpLeadApi::with_timeout(&settings.api_url, settings.timeout())
            .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?
            .with_retry_policy(RetryPolicy::new(
                settings.retry.max_retries,
                settings.retry.base_delay(),
                settings.retry.multiplier,
            ));

        let runner = BatchRunner::new(Reconciler::new(api))
            .with_options(BatchOptions {
                concurrency: settings.concurrency,
                duplicates: settings.duplicates,
            })
            .with_dispatch(dispatch.clone());

        if args.json {
            let report = runner.run(&leads);
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
            println!("{json}");
        } else {
            let report = runner.run_with(&leads, |report, total| print!("{}", progress_block(report, total)));
            print_summary(&report);
        }
        Ok(())
    })
}

/// Config file first, then command-line overrides.
fn resolve_settings(args: &ProcessArgs) -> Result<Settings, CliError> {
    let mut settings = leadsync_config::load(args.config.as_deref()).map_err(|e| {
        CliError::new(EXIT_CONFIG, e.to_string()).with_hint("fix the config file or pass --config <PATH>")
    })?;

    if let Some(url) = &args.api_url {
        settings.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    if let Some(n) = args.concurrency {
        settings.concurrency = n;
    }
    if let Some(mode) = args.duplicates {
        settings.duplicates = mode;
    }

    settings
        .validate()
        .map_err(|e| CliError::new(EXIT_USAGE, e.to_string()))?;
    Ok(settings)
}

fn source_error(err: SourceError) -> CliError {
    if err.is_unreadable() {
        CliError::new(EXIT_SOURCE_IO, err.to_string())
    } else {
        CliError::new(EXIT_SOURCE_FORMAT, err.to_string())
            .with_hint("expected a header row followed by Name,Email,Company,Source columns")
    }
}

/// One lead's progress line plus its outcome line, printed as a unit so
/// worker threads don't interleave them.
fn progress_block(report: &LeadReport, total: usize) -> String {
    let lead = &report.lead;
    let detail = match &report.outcome {
        Outcome::Create { .. } => "  ✓ Created new lead".to_string(),
        Outcome::Update { .. } => "  ✓ Updated existing lead".to_string(),
        Outcome::Skip => "  - Skipped (no changes needed)".to_string(),
        Outcome::Duplicate { first_index } => {
            format!("  - Skipped (duplicate of lead {})", first_index + 1)
        }
        Outcome::ValidationError { error } => format!("  ✗ Validation error: {error}"),
        Outcome::ApiError { error } => format!("  ✗ API error: {error}"),
        Outcome::CreateError { error } => format!("  ✗ Create failed: {error}"),
        Outcome::UpdateError { error } => format!("  ✗ Update failed: {error}"),
    };
    format!(
        "Processing lead {}/{}: {} ({})\n{}\n",
        report.index + 1,
        total,
        lead.name,
        lead.email,
        detail
    )
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("=== Processing Summary ===");
    println!("Total leads: {}", report.total);
    println!("Created: {}", report.created());
    println!("Updated: {}", report.updated());
    println!("Skipped: {}", report.skipped());
    println!("Errors: {}", report.errored());
}
