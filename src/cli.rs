use crate::api::{refresh_metrics, RefreshFailure};
use crate::error::ScholarError;
use crate::services::fetch::{Fetcher, Transport};
use crate::services::store::{save_debug_html, write_record, DEFAULT_OUTPUT};
use crate::types::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scholar-metrics",
    version,
    about = "Fetch Google Scholar profile metrics into a JSON badge file"
)]
pub struct Cli {
    /// Google Scholar user id (e.g. _cxg7m4AAAAJ)
    #[arg(long)]
    pub user: String,

    /// Output JSON file path
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// On failure, save the raw page to <output>.debug.html
    #[arg(long)]
    pub save_debug: bool,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Retries on transient statuses and connection errors
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub retries: u32,

    /// Backoff factor in seconds (delay = factor * 2^(retry-1))
    #[arg(long, default_value_t = DEFAULT_BACKOFF_FACTOR)]
    pub backoff_factor: f64,

    /// Scholar base URL (mirrors, local testing)
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            referer: Some(format!("{}/", self.base_url.trim_end_matches('/'))),
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout),
            retry: RetryPolicy {
                max_retries: self.retries,
                backoff_factor: self.backoff_factor,
                ..defaults.retry.clone()
            },
            ..defaults
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // reject before building any client
    if let Err(e) = ProfileId::parse(&cli.user) {
        eprintln!("Error: {e}");
        return ExitCode::from(e.exit_code());
    }

    let fetcher = match Fetcher::new(cli.fetch_config()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    ExitCode::from(run_with(&cli, &fetcher))
}

/// Full run against any transport; returns the process exit code.
pub fn run_with<T: Transport>(cli: &Cli, fetcher: &Fetcher<T>) -> u8 {
    let result = refresh_metrics(fetcher, &cli.user).and_then(|record| {
        write_record(&cli.output, &record).map_err(RefreshFailure::from)?;
        Ok(record)
    });

    match result {
        Ok(_) => {
            info!(path = %cli.output.display(), "wrote metrics");
            println!("Wrote {}", cli.output.display());
            0
        }
        Err(failure) => {
            report_failure(cli, &failure);
            failure.error.exit_code()
        }
    }
}

fn report_failure(cli: &Cli, failure: &RefreshFailure) {
    let hint = match &failure.error {
        ScholarError::Blocked { .. } => " (wait or change network identity before retrying)",
        _ => "",
    };
    eprintln!("Error fetching or parsing Google Scholar profile: {}{hint}", failure.error);

    if !cli.save_debug {
        return;
    }
    let Some(page) = &failure.page else {
        return;
    };
    match save_debug_html(&cli.output, page) {
        Ok(path) => info!(path = %path.display(), "saved debug page"),
        Err(e) => warn!("could not save debug page: {e:#}"),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
