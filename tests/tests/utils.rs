use mock_service::Behavior;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::FmtSubscriber;
use txload_core::{RunConfig, Schedule};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("txload=debug,mock_service=info")
            .try_init();
    });
}

#[allow(unused)]
pub async fn mock(behavior: Behavior) -> SocketAddr {
    mock_service::spawn(behavior)
        .await
        .expect("mock service binds a local port")
}

/// Load profile without pauses or stats probes, pointed at `addr`.
#[allow(unused)]
pub fn quick_config(addr: SocketAddr, schedule: Schedule) -> RunConfig {
    let mut config = RunConfig::load_profile();
    config
        .set_base_url(&format!("http://{addr}"))
        .expect("local address is a valid base URL");
    config.schedule = schedule;
    config.scenario = config.scenario.without_pauses();
    config.stats_probability = 0.;
    config
}
