//! Run-wide metric storage shared by every worker.
//!
//! Counters and rate tallies are plain atomics and trend samples go into a lock-free
//! [`AtomicBucket`], so concurrent recording never loses an update. The name registry sits
//! behind a read-mostly lock that is only written when a metric is first registered.
use metrics_util::AtomicBucket;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use txload_core::{
    metric, CheckSummary, MetricKind, MetricSummary, RateSummary, RunSummary, TrendSummary,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Metric `{0}` is not registered")]
    Unregistered(String),

    #[error("Metric `{name}` is already registered as a {registered:?}")]
    KindMismatch {
        name: String,
        registered: MetricKind,
    },
}

/// Cloneable handle to the metrics of one run.
#[derive(Clone, Default)]
pub struct MetricsRecorder {
    inner: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    metrics: RwLock<HashMap<String, Metric>>,
    checks: RwLock<HashMap<String, Arc<CheckCells>>>,
}

#[derive(Clone)]
enum Metric {
    Counter(Counter),
    Rate(Rate),
    Trend(Trend),
}

impl Metric {
    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Rate(_) => MetricKind::Rate,
            Metric::Trend(_) => MetricKind::Trend,
        }
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Result<Counter, RecordError> {
        match self.register(name, MetricKind::Counter)? {
            Metric::Counter(c) => Ok(c),
            other => Err(mismatch(name, &other)),
        }
    }

    pub fn rate(&self, name: &str) -> Result<Rate, RecordError> {
        match self.register(name, MetricKind::Rate)? {
            Metric::Rate(r) => Ok(r),
            other => Err(mismatch(name, &other)),
        }
    }

    pub fn trend(&self, name: &str) -> Result<Trend, RecordError> {
        match self.register(name, MetricKind::Trend)? {
            Metric::Trend(t) => Ok(t),
            other => Err(mismatch(name, &other)),
        }
    }

    /// Record a raw sample against an already registered metric.
    ///
    /// Counters add `value` truncated to an integer, rates count a hit for any non-zero
    /// value and trends keep the value as is.
    pub fn record(&self, name: &str, value: f64) -> Result<(), RecordError> {
        let metric = self
            .inner
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RecordError::Unregistered(name.to_string()))?;

        match metric {
            Metric::Counter(c) => c.add(value.max(0.) as u64),
            Metric::Rate(r) => r.add(value != 0.),
            Metric::Trend(t) => t.add(value),
        }
        Ok(())
    }

    /// Record the outcome of a named check. Every check also feeds the `checks` rate.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        let cells = {
            let existing = self
                .inner
                .checks
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned();
            match existing {
                Some(cells) => cells,
                None => self
                    .inner
                    .checks
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(name.to_string())
                    .or_default()
                    .clone(),
            }
        };

        if passed {
            cells.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            cells.fails.fetch_add(1, Ordering::Relaxed);
        }

        match self.rate(metric::CHECKS) {
            Ok(rate) => rate.add(passed),
            Err(err) => tracing::error!("Unable to record checks rate: {err}"),
        }

        passed
    }

    /// Freeze the recorded values. Intended to be called once all workers have stopped.
    pub fn summarize(
        &self,
        name: &str,
        started_at: OffsetDateTime,
        duration: Duration,
        peak_concurrency: u32,
    ) -> RunSummary {
        let secs = duration.as_secs_f64();
        let metrics = self
            .inner
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, metric)| {
                let summary = match metric {
                    Metric::Counter(c) => {
                        let count = c.value();
                        let rate = if secs > 0. { count as f64 / secs } else { 0. };
                        MetricSummary::Counter { count, rate }
                    }
                    Metric::Rate(r) => MetricSummary::Rate(r.summary()),
                    Metric::Trend(t) => MetricSummary::Trend(TrendSummary::from_samples(t.samples())),
                };
                (name.clone(), summary)
            })
            .collect::<BTreeMap<_, _>>();

        let checks = self
            .inner
            .checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, cells)| {
                (
                    name.clone(),
                    CheckSummary {
                        passes: cells.passes.load(Ordering::Relaxed),
                        fails: cells.fails.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        RunSummary {
            name: name.to_string(),
            started_at,
            duration,
            peak_concurrency,
            metrics,
            checks,
        }
    }

    fn register(&self, name: &str, kind: MetricKind) -> Result<Metric, RecordError> {
        if let Some(metric) = self
            .inner
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(metric.clone());
        }

        let mut metrics = self
            .inner
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let metric = metrics
            .entry(name.to_string())
            .or_insert_with(|| new_metric(name, kind))
            .clone();
        if metric.kind() != kind {
            return Err(mismatch(name, &metric));
        }
        Ok(metric)
    }
}

fn new_metric(name: &str, kind: MetricKind) -> Metric {
    let name: Arc<str> = Arc::from(name);
    match kind {
        MetricKind::Counter => Metric::Counter(Counter {
            name,
            value: Arc::new(AtomicU64::new(0)),
        }),
        MetricKind::Rate => Metric::Rate(Rate {
            name,
            passes: Arc::new(AtomicU64::new(0)),
            fails: Arc::new(AtomicU64::new(0)),
        }),
        MetricKind::Trend => Metric::Trend(Trend {
            name,
            samples: Arc::new(AtomicBucket::new()),
        }),
    }
}

fn mismatch(name: &str, registered: &Metric) -> RecordError {
    RecordError::KindMismatch {
        name: name.to_string(),
        registered: registered.kind(),
    }
}

#[derive(Default)]
struct CheckCells {
    passes: AtomicU64,
    fails: AtomicU64,
}

/// Monotonically increasing sum.
#[derive(Clone)]
pub struct Counter {
    name: Arc<str>,
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        ::metrics::counter!(self.name.to_string()).increment(n);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Fraction of samples that were hits.
#[derive(Clone)]
pub struct Rate {
    name: Arc<str>,
    passes: Arc<AtomicU64>,
    fails: Arc<AtomicU64>,
}

impl Rate {
    pub fn add(&self, hit: bool) {
        if hit {
            self.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fails.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "metrics")]
        ::metrics::counter!(self.name.to_string(), "outcome" => if hit { "hit" } else { "miss" })
            .increment(1);
    }

    pub fn summary(&self) -> RateSummary {
        RateSummary {
            passes: self.passes.load(Ordering::Relaxed),
            fails: self.fails.load(Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Every sample of a distribution, in milliseconds.
#[derive(Clone)]
pub struct Trend {
    name: Arc<str>,
    samples: Arc<AtomicBucket<f64>>,
}

impl Trend {
    pub fn add(&self, value: f64) {
        self.samples.push(value);

        #[cfg(feature = "metrics")]
        ::metrics::histogram!(self.name.to_string()).record(value);
    }

    pub fn add_duration(&self, duration: Duration) {
        self.add(duration.as_nanos() as f64 / 1e6);
    }

    pub fn samples(&self) -> Vec<f64> {
        self.samples.data()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
