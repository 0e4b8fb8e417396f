//! Command line front end: resolves the configuration, runs it and reports.
pub mod cli;
pub mod config;
mod error;
pub mod output;

pub use cli::{Cli, ProfileArg, THRESHOLD_EXIT_CODE};
pub use error::RuntimeError;

use std::process::ExitCode;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};
use txload::LoadTest;

/// Resolve, run, print and persist. Returns the process exit code.
///
/// `env_base_url` is the value of the `BASE_URL` environment variable, if set.
#[instrument(name = "txload", skip_all, fields(profile = ?cli.profile))]
pub async fn execute(cli: &Cli, env_base_url: Option<String>) -> anyhow::Result<ExitCode> {
    let config = config::resolve(cli, env_base_url)?;
    let summary_path = config.summary_path.clone();

    let report = LoadTest::new(config)?.run().await;
    println!("{}", report.render());

    output::write_summary(&summary_path, &report)?;
    info!("Summary written to {}", summary_path.display());

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLD_EXIT_CODE))
    }
}
