use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use txload_core::BASE_URL_ENV;
use txload_runtime::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    FmtSubscriber::builder().with_env_filter(filter).init();

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
    }

    match txload_runtime::execute(&cli, std::env::var(BASE_URL_ENV).ok()).await {
        Ok(code) => Ok(code),
        Err(err) => {
            error!("{err:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}
