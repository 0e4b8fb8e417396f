use crate::error::RunError;
use crate::generator::TransactionGenerator;
use crate::metrics::{Counter, MetricsRecorder, Rate, Trend};
use crate::transport::{HttpRequest, HttpResponse, Session, Transport, TransportError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use txload_core::{
    metric, RunConfig, ScenarioConfig, ThinkTime, HEALTH_PATH, STATS_PATH, VALIDATE_PATH,
};

const HEALTH_STATUS_CHECK: &str = "health check status 200";
const HEALTH_BODY_CHECK: &str = "health check is healthy";
const TRANSACTION_ID_CHECK: &str = "validation has transaction_id";
const STATS_STATUS_CHECK: &str = "stats status 200";

/// What one iteration observed.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    /// `None` when the scenario skips the health probe.
    pub healthy: Option<bool>,
    pub validation: ValidationOutcome,
    /// `None` when the stats probe was not rolled this iteration.
    pub stats: Option<bool>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub transaction_id: String,
    /// `None` on transport failure.
    pub status: Option<u16>,
    pub latency: Option<Duration>,
    pub passed: bool,
}

/// Executes the per-worker script: health probe, validation, think time and the
/// occasional stats probe.
pub struct ScenarioRunner<T> {
    session: Session<T>,
    generator: TransactionGenerator,
    recorder: MetricsRecorder,
    scenario: ScenarioConfig,
    stats_probability: f64,
    health_url: String,
    validate_url: String,
    stats_url: String,
    status_check: String,
    latency_check: String,
    validation_duration: Trend,
    errors: Rate,
    successful: Counter,
    failed: Counter,
    iterations: Counter,
    iteration_duration: Trend,
}

impl<T: Transport + Sync> ScenarioRunner<T> {
    pub fn new(
        config: &RunConfig,
        transport: Arc<T>,
        recorder: MetricsRecorder,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let base = config.base_url.as_str().trim_end_matches('/');
        let statuses = config
            .scenario
            .accepted_statuses
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" or ");

        Ok(Self {
            session: Session::new(transport, &recorder, config.request_timeout, config.rps)?,
            generator: TransactionGenerator::new(config.generator.clone())?,
            scenario: config.scenario.clone(),
            stats_probability: config.stats_probability,
            health_url: format!("{base}{HEALTH_PATH}"),
            validate_url: format!("{base}{VALIDATE_PATH}"),
            stats_url: format!("{base}{STATS_PATH}"),
            status_check: format!("validation status {statuses}"),
            latency_check: format!(
                "validation latency < {}",
                humantime::format_duration(config.scenario.max_latency)
            ),
            validation_duration: recorder.trend(metric::VALIDATION_DURATION)?,
            errors: recorder.rate(metric::ERRORS)?,
            successful: recorder.counter(metric::SUCCESSFUL_VALIDATIONS)?,
            failed: recorder.counter(metric::FAILED_VALIDATIONS)?,
            iterations: recorder.counter(metric::ITERATIONS)?,
            iteration_duration: recorder.trend(metric::ITERATION_DURATION)?,
            recorder,
        })
    }

    pub async fn run_iteration(&self) -> IterationOutcome {
        let start = Instant::now();

        let healthy = if self.scenario.health_check {
            Some(self.probe_health().await)
        } else {
            None
        };

        pause(self.scenario.pre_validation_sleep).await;
        let validation = self.validate().await;

        let think = self.think_time();
        pause(think).await;

        let fetch_stats = self.roll_stats();
        let stats = if fetch_stats {
            Some(self.probe_stats().await)
        } else {
            None
        };

        pause(self.scenario.trailing_sleep).await;

        let duration = start.elapsed();
        self.iterations.add(1);
        self.iteration_duration.add_duration(duration);

        IterationOutcome {
            healthy,
            validation,
            stats,
            duration,
        }
    }

    async fn probe_health(&self) -> bool {
        let res = self.session.send(HttpRequest::get(&self.health_url)).await;
        let status_ok = matches!(&res, Ok(r) if r.status == 200);
        let healthy = res
            .ok()
            .and_then(|r| r.json())
            .and_then(|body| body.get("status")?.as_str().map(|s| s == "healthy"))
            .unwrap_or(false);

        // Both checks are always recorded.
        self.recorder.check(HEALTH_STATUS_CHECK, status_ok)
            & self.recorder.check(HEALTH_BODY_CHECK, healthy)
    }

    async fn validate(&self) -> ValidationOutcome {
        let transaction = self.generator.generate();
        let sent = Instant::now();
        let res = match HttpRequest::post_json(&self.validate_url, &transaction) {
            Ok(request) => self.session.send(request).await,
            Err(err) => Err(TransportError::Other(err.to_string())),
        };
        // Failed requests are timed too, a timeout is the slowest validation there is.
        self.validation_duration.add_duration(sent.elapsed());

        let (status, latency) = match &res {
            Ok(r) => (Some(r.status), Some(r.elapsed)),
            Err(_) => (None, None),
        };

        let mut passed = self.recorder.check(
            &self.status_check,
            status.is_some_and(|s| self.scenario.accepted_statuses.contains(&s)),
        );
        if self.scenario.require_transaction_id {
            let has_id = res
                .as_ref()
                .ok()
                .and_then(HttpResponse::json)
                .is_some_and(|body| body.get("transaction_id").is_some());
            passed &= self.recorder.check(TRANSACTION_ID_CHECK, has_id);
        }
        passed &= self.recorder.check(
            &self.latency_check,
            latency.is_some_and(|l| l < self.scenario.max_latency),
        );

        self.errors.add(!passed);
        if passed {
            self.successful.add(1);
        } else {
            self.failed.add(1);
            let reason = match &res {
                Ok(r) => format!("status {}", r.status),
                Err(err) => err.to_string(),
            };
            if self.scenario.log_failures {
                warn!(transaction_id = %transaction.transaction_id, "Validation failed: {reason}");
            } else {
                debug!(transaction_id = %transaction.transaction_id, "Validation failed: {reason}");
            }
        }

        ValidationOutcome {
            transaction_id: transaction.transaction_id,
            status,
            latency,
            passed,
        }
    }

    async fn probe_stats(&self) -> bool {
        let res = self.session.send(HttpRequest::get(&self.stats_url)).await;
        self.recorder
            .check(STATS_STATUS_CHECK, matches!(res, Ok(r) if r.status == 200))
    }

    fn think_time(&self) -> Duration {
        match self.scenario.think_time {
            ThinkTime::Fixed { duration } => duration,
            ThinkTime::Uniform { min, max } => rand::thread_rng().gen_range(min..=max),
        }
    }

    fn roll_stats(&self) -> bool {
        self.stats_probability > 0. && rand::thread_rng().gen_bool(self.stats_probability)
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
