use crate::metrics::RecordError;
use crate::transport::TransportError;
use thiserror::Error;
use txload_core::ConfigError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Metric(#[from] RecordError),
}
