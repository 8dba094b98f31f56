use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single sensor reading decoded from an upstream fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Identifier of the sensor entity that produced the value
    pub sensor: String,
    /// Identifier of the feature of interest that was observed
    pub feature: String,
    /// Name of the observed property, e.g. `NO2`
    pub observed_property: String,
    pub value: f64,
    pub unit_code: Option<String>,
    pub time: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        sensor: impl Into<String>,
        feature: impl Into<String>,
        observed_property: impl Into<String>,
        value: f64,
        unit_code: Option<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor: sensor.into(),
            feature: feature.into(),
            observed_property: observed_property.into(),
            value,
            unit_code,
            time,
        }
    }
}
