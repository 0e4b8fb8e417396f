use mock_service::Behavior;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

/// Listens on `MOCK_ADDR` (default `0.0.0.0:8000`). `MOCK_LATENCY_MS`, `MOCK_JITTER_MS`,
/// `MOCK_ERROR_RATE` and `MOCK_MAX_RPS` shape the answers.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let addr: SocketAddr = env_or("MOCK_ADDR", "0.0.0.0:8000").parse()?;
    let behavior = Behavior {
        latency: Duration::from_millis(env_or("MOCK_LATENCY_MS", "20").parse()?),
        jitter: Duration::from_millis(env_or("MOCK_JITTER_MS", "5").parse()?),
        error_rate: env_or("MOCK_ERROR_RATE", "0").parse()?,
        max_rps: std::env::var("MOCK_MAX_RPS").ok().map(|v| v.parse()).transpose()?,
        ..Behavior::default()
    };

    mock_service::run(addr, behavior).await
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
