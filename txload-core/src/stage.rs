use crate::duration::HumanDuration;
use crate::DEFAULT_GRACEFUL_STOP;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

/// One leg of the ramp profile: move to `target` concurrent workers over `duration`.
///
/// A zero `duration` jumps straight to `target`.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde_as(as = "HumanDuration")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// How workers are started and stopped over the run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum Schedule {
    /// Linearly ramp the number of workers through `stages`, starting from `start`.
    RampingWorkers {
        #[serde(default)]
        start: u32,
        stages: Vec<Stage>,
        /// How long retiring workers may take to finish their iteration once the last
        /// stage has ended.
        #[serde_as(as = "HumanDuration")]
        #[serde(default = "default_graceful_stop")]
        graceful_stop: Duration,
    },
    /// Run `workers` workers, each doing exactly `iterations` iterations.
    PerWorkerIterations {
        workers: u32,
        iterations: u64,
        #[serde_as(as = "HumanDuration")]
        max_duration: Duration,
    },
}

impl Schedule {
    pub fn ramping(stages: Vec<Stage>) -> Self {
        Schedule::RampingWorkers {
            start: 0,
            stages,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        }
    }

    pub fn iterations(workers: u32, iterations: u64) -> Self {
        Schedule::PerWorkerIterations {
            workers,
            iterations,
            max_duration: Duration::from_secs(10 * 60),
        }
    }

    /// Nominal length of the schedule, not counting graceful stop.
    pub fn planned_duration(&self) -> Duration {
        match self {
            Schedule::RampingWorkers { stages, .. } => stages.iter().map(|s| s.duration).sum(),
            Schedule::PerWorkerIterations { max_duration, .. } => *max_duration,
        }
    }

    /// Highest concurrency the schedule can ask for.
    pub fn max_concurrency(&self) -> u32 {
        match self {
            Schedule::RampingWorkers { start, stages, .. } => stages
                .iter()
                .map(|s| s.target)
                .chain(std::iter::once(*start))
                .max()
                .unwrap_or(0),
            Schedule::PerWorkerIterations { workers, .. } => *workers,
        }
    }
}

fn default_graceful_stop() -> Duration {
    DEFAULT_GRACEFUL_STOP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_ramping_schedule() {
        let schedule: Schedule = serde_json::from_str(
            r#"{
                "executor": "ramping-workers",
                "stages": [
                    {"duration": "2m", "target": 50},
                    {"duration": "5m", "target": 50},
                    {"duration": "2m", "target": 0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(schedule.planned_duration(), Duration::from_secs(9 * 60));
        assert_eq!(schedule.max_concurrency(), 50);
        match schedule {
            Schedule::RampingWorkers {
                start,
                graceful_stop,
                ..
            } => {
                assert_eq!(start, 0);
                assert_eq!(graceful_stop, DEFAULT_GRACEFUL_STOP);
            }
            _ => panic!("wrong executor"),
        }
    }

    #[test]
    fn deserializes_iteration_schedule() {
        let schedule: Schedule = serde_json::from_str(
            r#"{"executor": "per-worker-iterations", "workers": 2, "iterations": 3, "max_duration": "30s"}"#,
        )
        .unwrap();
        assert_eq!(
            schedule,
            Schedule::PerWorkerIterations {
                workers: 2,
                iterations: 3,
                max_duration: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn rejects_negative_target() {
        let res = serde_json::from_str::<Stage>(r#"{"duration": "1m", "target": -5}"#);
        assert!(res.is_err());
    }
}
