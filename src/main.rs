//! Binary entry point for the `oci-poller` daemon.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{debug, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use oci_poller::{ConfigError, OciCliProvider, PollSummary, Poller, Settings, TokioSleeper};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read .env file: {0}")]
    EnvFile(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    Cli::parse();
    let env_file = load_env_file();
    init_logging();

    let exit_code = match run(env_file).await {
        Ok(summary) => {
            debug!("final summary: {summary:?}");
            0
        }
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

/// Loads `.env` from the working directory. A missing file is not an error.
fn load_env_file() -> Result<Option<PathBuf>, CliError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(CliError::EnvFile(err.to_string())),
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

async fn run(env_file: Result<Option<PathBuf>, CliError>) -> Result<PollSummary, CliError> {
    match env_file? {
        Some(path) => info!("loaded environment from {}", path.display()),
        None => debug!("no .env file found, using the process environment"),
    }

    let settings = Settings::load()?;
    settings.log_startup_report(|key| env::var(key).ok());
    settings.validate()?;

    let spec = settings.launch_spec()?;
    let schedule = settings.schedule()?;
    let provider = OciCliProvider::with_process_runner(settings.cli_config()?);
    let poller = Poller::new(provider, TokioSleeper, spec, schedule);

    let shutdown = CancellationToken::new();
    cancel_on_interrupt(shutdown.clone());
    Ok(poller.run(&shutdown).await)
}

fn cancel_on_interrupt(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for interrupts: {err}");
            return;
        }
        info!("interrupt received, stopping after the current step");
        shutdown.cancel();
    });
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
