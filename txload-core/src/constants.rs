use std::time::Duration;

/// Target root used when neither the CLI, the environment nor the config name one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding the configured base URL.
pub const BASE_URL_ENV: &str = "BASE_URL";

pub const HEALTH_PATH: &str = "/health";
pub const VALIDATE_PATH: &str = "/api/v1/validate";
pub const STATS_PATH: &str = "/api/v1/stats";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Interval at which the stage scheduler re-evaluates the worker target.
pub const SCHEDULER_TICK: Duration = Duration::from_millis(100);

/// Built-in metric names.
pub mod metric {
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_DURATION: &str = "iteration_duration";
    pub const VALIDATION_DURATION: &str = "validation_duration";
    pub const ERRORS: &str = "errors";
    pub const SUCCESSFUL_VALIDATIONS: &str = "successful_validations";
    pub const FAILED_VALIDATIONS: &str = "failed_validations";
    pub const CHECKS: &str = "checks";
}
