use crate::duration::HumanDuration;
use crate::threshold::threshold_map;
use crate::{
    ConfigError, Currency, Schedule, Stage, Threshold, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Built-in workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Normal production-like traffic ramping to 150 workers with health and stats probes.
    Load,
    /// Aggressive ramp to 1000 workers hitting only the validate endpoint.
    Stress,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Load => "load",
            Profile::Stress => "stress",
        }
    }

    pub fn config(&self) -> RunConfig {
        match self {
            Profile::Load => RunConfig::load_profile(),
            Profile::Stress => RunConfig::stress_profile(),
        }
    }
}

/// Everything needed to drive one run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub base_url: Url,
    pub schedule: Schedule,
    #[serde(with = "threshold_map", default)]
    pub thresholds: Vec<Threshold>,
    pub scenario: ScenarioConfig,
    pub generator: GeneratorConfig,
    /// Chance that an iteration also fetches the service stats.
    pub stats_probability: f64,
    #[serde_as(as = "HumanDuration")]
    pub request_timeout: Duration,
    /// Global ceiling on requests per second across all workers.
    #[serde(default)]
    pub rps: Option<NonZeroU32>,
    pub summary_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::load_profile()
    }
}

impl RunConfig {
    pub fn load_profile() -> Self {
        Self {
            name: "PayFlow MX - Load Test".to_string(),
            base_url: default_base_url(),
            schedule: Schedule::ramping(vec![
                Stage::new(minutes(2), 50),
                Stage::new(minutes(5), 50),
                Stage::new(minutes(2), 100),
                Stage::new(minutes(5), 100),
                Stage::new(minutes(2), 150),
                Stage::new(minutes(3), 150),
                Stage::new(minutes(2), 0),
            ]),
            thresholds: thresholds(&[
                ("errors", "rate<0.001"),
                ("http_req_duration", "p(95)<250"),
                ("http_req_duration", "p(99)<500"),
                ("http_req_failed", "rate<0.001"),
                ("validation_duration", "p(95)<250"),
                ("validation_duration", "p(99)<500"),
            ]),
            scenario: ScenarioConfig::default(),
            generator: GeneratorConfig::default(),
            stats_probability: 0.1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rps: None,
            summary_path: PathBuf::from("results/load-test-summary.json"),
        }
    }

    pub fn stress_profile() -> Self {
        Self {
            name: "PayFlow MX - Stress Test".to_string(),
            base_url: default_base_url(),
            schedule: Schedule::ramping(vec![
                Stage::new(minutes(1), 100),
                Stage::new(minutes(2), 200),
                Stage::new(minutes(2), 400),
                Stage::new(minutes(3), 600),
                Stage::new(minutes(2), 800),
                Stage::new(minutes(3), 1000),
                Stage::new(minutes(2), 500),
                Stage::new(minutes(2), 0),
            ]),
            thresholds: thresholds(&[
                ("errors", "rate<0.05"),
                ("http_req_duration", "p(95)<500"),
                ("http_req_duration", "p(99)<1000"),
                ("http_req_failed", "rate<0.05"),
            ]),
            scenario: ScenarioConfig {
                health_check: false,
                pre_validation_sleep: Duration::ZERO,
                // A 500 is an answer, not a dropped request, when the service is saturated.
                accepted_statuses: vec![200, 500],
                require_transaction_id: false,
                max_latency: Duration::from_secs(2),
                think_time: ThinkTime::Fixed {
                    duration: Duration::ZERO,
                },
                trailing_sleep: Duration::from_millis(100),
                log_failures: true,
            },
            generator: GeneratorConfig {
                id_prefix: "STRESS".to_string(),
                id_suffix_bound: 100_000,
                amount_min: 100,
                amount_max: 500_099,
                currencies: vec![Currency::Mxn],
                description_prefix: "Stress test transaction".to_string(),
                ..GeneratorConfig::default()
            },
            stats_probability: 0.,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rps: None,
            summary_path: PathBuf::from("results/stress-test-summary.json"),
        }
    }

    pub fn set_base_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.base_url = parse_base_url(raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_base_url(&self.base_url)?;

        match &self.schedule {
            Schedule::RampingWorkers { stages, .. } => {
                if stages.is_empty() {
                    return Err(ConfigError::EmptySchedule);
                }
            }
            Schedule::PerWorkerIterations {
                workers,
                iterations,
                max_duration,
            } => {
                if *workers == 0 {
                    return Err(ConfigError::Zero("workers"));
                }
                if *iterations == 0 {
                    return Err(ConfigError::Zero("iterations"));
                }
                if max_duration.is_zero() {
                    return Err(ConfigError::Zero("max_duration"));
                }
            }
        }

        check_probability("stats_probability", self.stats_probability)?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout"));
        }

        self.scenario.validate()?;
        self.generator.validate()
    }
}

/// Steps and success criteria of one iteration.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub health_check: bool,
    #[serde_as(as = "HumanDuration")]
    pub pre_validation_sleep: Duration,
    pub accepted_statuses: Vec<u16>,
    pub require_transaction_id: bool,
    /// Client observed latency above this marks the validation as failed.
    #[serde_as(as = "HumanDuration")]
    pub max_latency: Duration,
    pub think_time: ThinkTime,
    #[serde_as(as = "HumanDuration")]
    pub trailing_sleep: Duration,
    /// Log every failed validation at warn level.
    #[serde(default)]
    pub log_failures: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            health_check: true,
            pre_validation_sleep: Duration::from_secs(1),
            accepted_statuses: vec![200],
            require_transaction_id: true,
            max_latency: Duration::from_millis(500),
            think_time: ThinkTime::Uniform {
                min: Duration::from_secs(1),
                max: Duration::from_secs(4),
            },
            trailing_sleep: Duration::from_secs(1),
            log_failures: false,
        }
    }
}

impl ScenarioConfig {
    /// No sleeps at all. Handy for smoke runs and tests.
    pub fn without_pauses(mut self) -> Self {
        self.pre_validation_sleep = Duration::ZERO;
        self.think_time = ThinkTime::Fixed {
            duration: Duration::ZERO,
        };
        self.trailing_sleep = Duration::ZERO;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.accepted_statuses.is_empty() {
            return Err(ConfigError::NoAcceptedStatus);
        }
        if let ThinkTime::Uniform { min, max } = self.think_time {
            if min > max {
                return Err(ConfigError::InvertedRange {
                    name: "think_time",
                    min: humantime::format_duration(min).to_string(),
                    max: humantime::format_duration(max).to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Pause between a worker's validation and its next action.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThinkTime {
    Fixed {
        #[serde_as(as = "HumanDuration")]
        duration: Duration,
    },
    Uniform {
        #[serde_as(as = "HumanDuration")]
        min: Duration,
        #[serde_as(as = "HumanDuration")]
        max: Duration,
    },
}

/// Shape of the synthetic transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub id_prefix: String,
    /// Random id suffix is drawn from `[0, id_suffix_bound)`.
    pub id_suffix_bound: u32,
    pub amount_min: u64,
    pub amount_max: u64,
    pub currencies: Vec<Currency>,
    pub account_prefix: String,
    /// Account numbers are drawn from `[0, account_space)`.
    pub account_space: u64,
    pub description_prefix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            id_prefix: "TX".to_string(),
            id_suffix_bound: 10_000,
            amount_min: 100,
            amount_max: 100_099,
            currencies: Currency::ALL.to_vec(),
            account_prefix: "ACC".to_string(),
            account_space: 1_000_000_000,
            description_prefix: "Load test transaction".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amount_min > self.amount_max {
            return Err(ConfigError::InvertedRange {
                name: "amount",
                min: self.amount_min.to_string(),
                max: self.amount_max.to_string(),
            });
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::NoCurrencies);
        }
        if self.id_suffix_bound == 0 {
            return Err(ConfigError::Zero("id_suffix_bound"));
        }
        if self.account_space == 0 {
            return Err(ConfigError::Zero("account_space"));
        }
        Ok(())
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::BaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    check_base_url(&url)?;
    Ok(url)
}

fn check_base_url(url: &Url) -> Result<(), ConfigError> {
    let reason = if !matches!(url.scheme(), "http" | "https") {
        Some(format!("unsupported scheme `{}`", url.scheme()))
    } else if url.host_str().is_none() {
        Some("missing host".to_string())
    } else if url.query().is_some() || url.fragment().is_some() {
        Some("query and fragment are not allowed".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::BaseUrl {
            url: url.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid URL")
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

// Sorted by metric so the list matches what the map form deserializes to.
fn thresholds(raw: &[(&str, &str)]) -> Vec<Threshold> {
    raw.iter()
        .filter_map(|(metric, expr)| Threshold::parse(metric, expr).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_valid() {
        RunConfig::load_profile().validate().unwrap();
        RunConfig::stress_profile().validate().unwrap();
    }

    #[test]
    fn profile_thresholds_all_parse() {
        assert_eq!(RunConfig::load_profile().thresholds.len(), 6);
        assert_eq!(RunConfig::stress_profile().thresholds.len(), 4);
    }

    #[test]
    fn load_profile_ramps_to_150_over_21_minutes() {
        let config = RunConfig::load_profile();
        assert_eq!(config.schedule.max_concurrency(), 150);
        assert_eq!(config.schedule.planned_duration(), minutes(21));
        assert_eq!(Profile::Stress.config().schedule.max_concurrency(), 1000);
    }

    #[test]
    fn rejects_bad_base_urls() {
        let mut config = RunConfig::default();
        assert!(matches!(
            config.set_base_url("ftp://example.com"),
            Err(ConfigError::BaseUrl { .. })
        ));
        assert!(matches!(
            config.set_base_url("not a url"),
            Err(ConfigError::BaseUrl { .. })
        ));
        config.set_base_url("https://validator.internal:8443").unwrap();
        assert_eq!(config.base_url.as_str(), "https://validator.internal:8443/");
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = RunConfig {
            stats_probability: 1.5,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Probability { .. })
        ));

        let config = RunConfig {
            stats_probability: f64::NAN,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_schedules() {
        let config = RunConfig {
            schedule: Schedule::ramping(vec![]),
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptySchedule)));

        let config = RunConfig {
            schedule: Schedule::iterations(0, 1),
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("workers"))));
    }

    #[test]
    fn rejects_inverted_ranges() {
        let mut config = RunConfig::default();
        config.generator.amount_min = 10;
        config.generator.amount_max = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange { name: "amount", .. })
        ));

        let mut config = RunConfig::default();
        config.scenario.think_time = ThinkTime::Uniform {
            min: Duration::from_secs(3),
            max: Duration::from_secs(1),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                name: "think_time",
                ..
            })
        ));

        let mut config = RunConfig::default();
        config.generator.currencies.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoCurrencies)));
    }

    #[test]
    fn config_survives_json() {
        let config = RunConfig::stress_profile();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
