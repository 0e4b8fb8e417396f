use serde::Serialize;
use std::fmt::Write;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use txload_core::{
    metric, Aggregation, MetricSummary, RunSummary, Threshold, ThresholdOutcome, ThresholdStatus,
};

const RULE: &str = "==============================================";

/// Outcome of a finished run: the summary plus the verdict of every threshold.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunReport {
    pub fn new(summary: RunSummary, thresholds: &[Threshold]) -> Self {
        let thresholds = evaluate(&summary, thresholds);
        Self {
            summary,
            thresholds,
        }
    }

    /// True unless a threshold failed. Skipped thresholds do not fail a run.
    pub fn passed(&self) -> bool {
        !self.thresholds.iter().any(ThresholdOutcome::failed)
    }

    pub fn render(&self) -> String {
        render_report(&self.summary, &self.thresholds)
    }
}

pub fn evaluate(summary: &RunSummary, thresholds: &[Threshold]) -> Vec<ThresholdOutcome> {
    thresholds
        .iter()
        .map(|threshold| {
            let observed = observe(summary, threshold);
            let status = match observed {
                Some(value) if threshold.check(value) => ThresholdStatus::Pass,
                Some(_) => ThresholdStatus::Fail,
                None => {
                    warn!("No data to evaluate threshold `{threshold}`; skipping");
                    ThresholdStatus::Skipped
                }
            };
            ThresholdOutcome {
                metric: threshold.metric.clone(),
                expression: threshold.expression.clone(),
                status,
                observed,
            }
        })
        .collect()
}

fn observe(summary: &RunSummary, threshold: &Threshold) -> Option<f64> {
    let metric = summary.metric(&threshold.metric)?;
    match (threshold.aggregation, metric) {
        (Aggregation::Count, m) if m.count() > 0 => Some(m.count() as f64),
        (Aggregation::Rate, MetricSummary::Rate(rate)) => rate.rate(),
        (Aggregation::Rate, MetricSummary::Counter { count, rate }) if *count > 0 => Some(*rate),
        (Aggregation::Percentile(p), MetricSummary::Trend(trend)) => trend.percentile(p),
        (Aggregation::Avg, MetricSummary::Trend(trend)) => trend.stats.map(|s| s.avg),
        (Aggregation::Min, MetricSummary::Trend(trend)) => trend.stats.map(|s| s.min),
        (Aggregation::Max, MetricSummary::Trend(trend)) => trend.stats.map(|s| s.max),
        (Aggregation::Med, MetricSummary::Trend(trend)) => trend.stats.map(|s| s.med),
        _ => None,
    }
}

/// Human readable end-of-run summary. Deterministic for a given summary.
pub fn render_report(summary: &RunSummary, outcomes: &[ThresholdOutcome]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, summary, outcomes);
    out
}

fn write_report(
    out: &mut String,
    summary: &RunSummary,
    outcomes: &[ThresholdOutcome],
) -> std::fmt::Result {
    writeln!(out, "{RULE}")?;
    writeln!(out, "  {} Summary", summary.name)?;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "Duration: {}  Peak workers: {}",
        humantime::format_duration(std::time::Duration::from_secs(
            summary.duration.as_secs()
        )),
        summary.peak_concurrency
    )?;

    writeln!(out)?;
    writeln!(out, "HTTP Metrics:")?;
    writeln!(
        out,
        "  Total Requests: {}",
        summary.counter(metric::HTTP_REQS).unwrap_or(0)
    )?;
    write_latencies(out, summary, metric::HTTP_REQ_DURATION)?;
    write_error_rate(out, summary, metric::HTTP_REQ_FAILED)?;

    writeln!(out)?;
    writeln!(out, "Validation Metrics:")?;
    write_latencies(out, summary, metric::VALIDATION_DURATION)?;
    write_error_rate(out, summary, metric::ERRORS)?;

    let counters: Vec<_> = summary
        .metrics
        .iter()
        .filter_map(|(name, m)| match m {
            MetricSummary::Counter { count, .. } if name != metric::HTTP_REQS => {
                Some((name, count))
            }
            _ => None,
        })
        .collect();
    if !counters.is_empty() {
        writeln!(out)?;
        writeln!(out, "Counters:")?;
        for (name, count) in counters {
            writeln!(out, "  {}: {count}", title_case(name))?;
        }
    }

    if !summary.checks.is_empty() {
        writeln!(out)?;
        writeln!(out, "Checks:")?;
        for (name, check) in &summary.checks {
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            writeln!(
                out,
                "  {mark} {name}: {}/{} passed",
                check.passes,
                check.total()
            )?;
        }
    }

    if !outcomes.is_empty() {
        writeln!(out)?;
        writeln!(out, "SLO Compliance:")?;
        for outcome in outcomes {
            let verdict = match outcome.status {
                ThresholdStatus::Pass => "PASS ✓",
                ThresholdStatus::Fail => "FAIL ✗",
                ThresholdStatus::Skipped => "SKIP",
            };
            let observed = match outcome.observed {
                Some(value) => format_observed(summary, outcome, value),
                None => "no data".to_string(),
            };
            writeln!(
                out,
                "  {} {}: {verdict} ({observed})",
                outcome.metric, outcome.expression
            )?;
        }
    }

    writeln!(out)?;
    let passed = !outcomes.iter().any(ThresholdOutcome::failed);
    writeln!(out, "Result: {}", if passed { "PASS" } else { "FAIL" })?;
    writeln!(out, "{RULE}")
}

fn write_latencies(out: &mut String, summary: &RunSummary, name: &str) -> std::fmt::Result {
    let Some(trend) = summary.trend(name) else {
        return Ok(());
    };
    for p in [50., 95., 99.] {
        match trend.percentile(p) {
            Some(value) => writeln!(out, "  Latency P{p}: {value:.2}ms")?,
            None => writeln!(out, "  Latency P{p}: n/a")?,
        }
    }
    Ok(())
}

fn write_error_rate(out: &mut String, summary: &RunSummary, name: &str) -> std::fmt::Result {
    match summary.rate(name) {
        Some(rate) => writeln!(out, "  Error Rate: {:.3}%", rate * 100.),
        None => writeln!(out, "  Error Rate: n/a"),
    }
}

fn format_observed(summary: &RunSummary, outcome: &ThresholdOutcome, value: f64) -> String {
    if outcome.expression.starts_with("count") {
        format!("{value}")
    } else if matches!(summary.metric(&outcome.metric), Some(MetricSummary::Trend(_))) {
        format!("{value:.2}ms")
    } else {
        format!("{value:.4}")
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
