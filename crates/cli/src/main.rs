// leadsync CLI - reconcile a CSV of leads against the lead API

mod exit_codes;
mod logging;
mod process;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use leadsync_config::LogLevel;
use leadsync_recon::DuplicatePolicy;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "leadsync")]
#[command(about = "Reconcile lead files against the lead system of record")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process leads from a CSV file (create, update or skip each one)
    #[command(after_help = "\
Examples:
  leadsync process leads.csv
  leadsync process leads.csv --api-url http://localhost:3030/api/leads
  leadsync process leads.csv --concurrency 4 --log-level warn
  leadsync process leads.csv --json > report.json")]
    Process {
        /// CSV file with header Name,Email,Company,Source
        file: PathBuf,

        /// Base URL of the lead API
        #[arg(long, env = "LEADSYNC_API_URL")]
        api_url: Option<String>,

        /// Config file (default: <config dir>/leadsync/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum log level: debug, info, warn, error
        #[arg(long, value_name = "LEVEL")]
        log_level: Option<LogLevel>,

        /// Leads processed in parallel
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Repeated rows in one file: first-wins or reconcile
        #[arg(long, value_name = "MODE")]
        duplicates: Option<DuplicatePolicy>,

        /// Print the batch report as JSON instead of progress lines
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            file,
            api_url,
            config,
            log_level,
            concurrency,
            duplicates,
            json,
        } => process::cmd_process(process::ProcessArgs {
            file,
            api_url,
            config,
            log_level,
            concurrency,
            duplicates,
            json,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
