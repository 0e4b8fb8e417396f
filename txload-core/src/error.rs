use thiserror::Error;

/// Problems detected before any traffic is generated. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL `{url}`: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Schedule has no stages")]
    EmptySchedule,

    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("`{name}` must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },

    #[error("Range `{name}` is inverted: {min} > {max}")]
    InvertedRange {
        name: &'static str,
        min: String,
        max: String,
    },

    #[error("Currency set is empty")]
    NoCurrencies,

    #[error("No accepted status codes for validation")]
    NoAcceptedStatus,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
