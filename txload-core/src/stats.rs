use crate::duration::HumanDuration;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::BTreeMap;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

/// Final aggregated view of a run. Built once when every worker has stopped.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde_as(as = "HumanDuration")]
    pub duration: Duration,
    pub peak_concurrency: u32,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub checks: BTreeMap<String, CheckSummary>,
}

impl RunSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.metric(name)? {
            MetricSummary::Counter { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// `None` when the metric is not a rate or recorded no samples.
    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.metric(name)? {
            MetricSummary::Rate(rate) => rate.rate(),
            _ => None,
        }
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.metric(name)? {
            MetricSummary::Trend(trend) => Some(trend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSummary {
    Counter {
        count: u64,
        /// Per second over the run's wall duration.
        rate: f64,
    },
    Rate(RateSummary),
    Trend(TrendSummary),
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Counter { .. } => MetricKind::Counter,
            MetricSummary::Rate(_) => MetricKind::Rate,
            MetricSummary::Trend(_) => MetricKind::Trend,
        }
    }

    /// Number of samples, or the counter's total.
    pub fn count(&self) -> u64 {
        match self {
            MetricSummary::Counter { count, .. } => *count,
            MetricSummary::Rate(rate) => rate.total(),
            MetricSummary::Trend(trend) => trend.count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSummary {
    pub passes: u64,
    pub fails: u64,
}

impl RateSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of samples that were hits.
    pub fn rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.passes as f64 / total as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

/// Distribution of a trend metric, in milliseconds.
///
/// The sorted samples are kept so any percentile can be queried after the run; they are
/// not serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub stats: Option<TrendStats>,
    #[serde(skip)]
    samples: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl TrendSummary {
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.retain(|s| s.is_finite());
        samples.sort_by(f64::total_cmp);

        let stats = match (samples.first(), samples.last()) {
            (Some(min), Some(max)) => Some(TrendStats {
                count: samples.len() as u64,
                min: *min,
                max: *max,
                avg: statistical::mean(&samples),
                med: percentile(&samples, 50.).unwrap_or_default(),
                p90: percentile(&samples, 90.).unwrap_or_default(),
                p95: percentile(&samples, 95.).unwrap_or_default(),
                p99: percentile(&samples, 99.).unwrap_or_default(),
            }),
            _ => None,
        };

        Self { stats, samples }
    }

    pub fn count(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.samples, p)
    }
}

fn serialize_rfc3339<S>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let formatted = at.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// Percentile over sorted samples, linearly interpolating between the closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p.clamp(0., 100.) / 100. * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
