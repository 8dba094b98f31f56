use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// IRI of the hourly aggregation period.
pub const HOURLY: &str = "https://w3id.org/city_of_things#Hourly";
/// IRI of the daily aggregation period.
pub const DAILY: &str = "https://w3id.org/city_of_things#Daily";

/// Granularity of the summary view.
///
/// Periods are resources themselves, so they are identified by IRI on the
/// wire. The short forms `hourly` and `daily` are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPeriod {
    #[default]
    Hourly,
    Daily,
}

impl AggregationPeriod {
    pub fn iri(&self) -> &'static str {
        match self {
            Self::Hourly => HOURLY,
            Self::Daily => DAILY,
        }
    }

    /// Resolve a `period` query value. Unknown or absent values fall back to
    /// [`AggregationPeriod::Hourly`].
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some(DAILY) => Self::Daily,
            Some(p) if p.eq_ignore_ascii_case("daily") => Self::Daily,
            _ => Self::Hourly,
        }
    }
}

/// Statistical function applied to the values of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Count,
    Average,
    Minimum,
    Maximum,
    StdDev,
}

impl AggregateFunction {
    /// All functions in the order the summary view emits them.
    pub const ALL: [AggregateFunction; 6] = [
        Self::Sum,
        Self::Count,
        Self::Average,
        Self::Minimum,
        Self::Maximum,
        Self::StdDev,
    ];

    /// Compact IRI of the function in the City of Things vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "cot:Sum",
            Self::Count => "cot:Count",
            Self::Average => "cot:Average",
            Self::Minimum => "cot:Minimum",
            Self::Maximum => "cot:Maximum",
            Self::StdDev => "cot:StdDev",
        }
    }
}

/// Grouping key for aggregation.
///
/// A `sensor` of `None` aggregates across every sensor observing the feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub sensor: Option<String>,
    pub feature: String,
    pub observed_property: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
}

/// The result of one function over one bucket.
///
/// `value` is `NaN` when the function has no defined result for an empty
/// bucket (average, minimum, maximum, stddev).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub sensor: Option<String>,
    pub feature: String,
    pub observed_property: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub value: f64,
    pub unit_code: Option<String>,
}

impl Aggregation {
    /// Whether the value carries data, as opposed to the "no data" signal.
    pub fn has_value(&self) -> bool {
        self.value.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_param() {
        assert_eq!(AggregationPeriod::from_param(None), AggregationPeriod::Hourly);
        assert_eq!(
            AggregationPeriod::from_param(Some(DAILY)),
            AggregationPeriod::Daily
        );
        assert_eq!(
            AggregationPeriod::from_param(Some("Daily")),
            AggregationPeriod::Daily
        );
        assert_eq!(
            AggregationPeriod::from_param(Some("weekly")),
            AggregationPeriod::Hourly
        );
        assert_eq!(AggregationPeriod::Daily.iri(), DAILY);
    }

    #[test]
    fn test_function_names() {
        let names: Vec<_> = AggregateFunction::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            [
                "cot:Sum",
                "cot:Count",
                "cot:Average",
                "cot:Minimum",
                "cot:Maximum",
                "cot:StdDev"
            ]
        );
    }
}
