use std::path::PathBuf;
use thiserror::Error;
use txload_core::ConfigError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write summary to {}: {source}", path.display())]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}
