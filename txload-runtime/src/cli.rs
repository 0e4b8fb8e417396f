use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use txload_core::Profile;

/// Exit code of a run that completed but failed one or more thresholds.
pub const THRESHOLD_EXIT_CODE: u8 = 99;

#[derive(Parser, Debug)]
#[command(version, about = "Staged load test for a transaction validation service")]
pub struct Cli {
    /// Built-in workload to start from.
    #[arg(short, long, value_enum, default_value_t = ProfileArg::Load)]
    pub profile: ProfileArg,

    /// JSON file merged over the profile. Objects merge key by key, anything else replaces.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root URL of the service under test. Overrides the BASE_URL environment variable.
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Where the JSON summary is written.
    #[arg(short, long)]
    pub summary_path: Option<PathBuf>,

    /// One worker, one iteration. Checks the target and the thresholds wiring.
    #[arg(long)]
    pub smoke: bool,

    /// Expose live metrics for Prometheus on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "txload=info,txload_runtime=info")]
    pub log: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileArg {
    Load,
    Stress,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Load => Profile::Load,
            ProfileArg::Stress => Profile::Stress,
        }
    }
}
