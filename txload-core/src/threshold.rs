use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Statistic a threshold extracts from a metric summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// `p(N)`, N within `[0, 100]`.
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("Expression is empty")]
    Empty,

    #[error("No comparison operator in `{0}`")]
    MissingOperator(String),

    #[error("Unknown aggregation `{0}`")]
    UnknownAggregation(String),

    #[error("Percentile `{0}` must be a number within [0, 100]")]
    InvalidPercentile(String),

    #[error("Bound `{0}` is not a finite number")]
    InvalidBound(String),
}

/// A pass/fail bound on one aggregated metric, written the way load-test
/// configurations usually do: `p(95)<250`, `rate<0.001`, `count>=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ThresholdParseError::Empty);
        }

        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;
        let (lhs, rest) = compact.split_at(op_start);

        let (comparison, rhs) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .iter()
        .find_map(|(token, cmp)| rest.strip_prefix(token).map(|rhs| (*cmp, rhs)))
        .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;

        let aggregation = parse_aggregation(lhs)?;
        let bound = rhs
            .parse::<f64>()
            .ok()
            .filter(|b| b.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidBound(rhs.to_string()))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: compact,
            aggregation,
            comparison,
            bound,
        })
    }

    pub fn check(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.bound)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.metric, self.expression)
    }
}

fn parse_aggregation(raw: &str) -> Result<Aggregation, ThresholdParseError> {
    let agg = match raw {
        "avg" => Aggregation::Avg,
        "min" => Aggregation::Min,
        "max" => Aggregation::Max,
        "med" => Aggregation::Med,
        "rate" => Aggregation::Rate,
        "count" => Aggregation::Count,
        "" => return Err(ThresholdParseError::UnknownAggregation(raw.to_string())),
        other => {
            let inner = other
                .strip_prefix("p(")
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| ThresholdParseError::UnknownAggregation(other.to_string()))?;
            let p = inner
                .parse::<f64>()
                .ok()
                .filter(|p| (0.0..=100.0).contains(p))
                .ok_or_else(|| ThresholdParseError::InvalidPercentile(inner.to_string()))?;
            Aggregation::Percentile(p)
        }
    };
    Ok(agg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStatus {
    Pass,
    Fail,
    /// The metric was absent, empty, or of a kind the aggregation does not apply to.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub status: ThresholdStatus,
    pub observed: Option<f64>,
}

impl ThresholdOutcome {
    pub fn failed(&self) -> bool {
        self.status == ThresholdStatus::Fail
    }
}

/// Serde representation of a threshold list as `{ "metric": ["expr", ...] }`.
pub mod threshold_map {
    use super::Threshold;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(thresholds: &[Threshold], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for t in thresholds {
            map.entry(&t.metric).or_default().push(&t.expression);
        }
        map.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Threshold>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut thresholds = vec![];
        for (metric, expressions) in map {
            for expr in expressions {
                let threshold = Threshold::parse(&metric, &expr)
                    .map_err(|e| D::Error::custom(format!("threshold `{metric}`: {e}")))?;
                thresholds.push(threshold);
            }
        }
        Ok(thresholds)
    }
}
