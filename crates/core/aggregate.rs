//! Bucketed statistics over raw observations.
//!
//! The summary view reads the raw fragments of a page window, flattens them
//! into [`Observation`]s and groups those into [`Bucket`]s: every combination
//! of sensor (including "all sensors"), feature of interest and observed
//! property, for every bucket-sized slice of the window. Each bucket yields
//! one [`Aggregation`] per [`AggregateFunction`].

use crate::compute::time::{TimeFragmenter, format_instant, parse_instant};
use crate::error::{Result, TessellaError};
use crate::fragment::vocabulary;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tessella_types::aggregation::{AggregateFunction, Aggregation, AggregationPeriod, Bucket};
use tessella_types::observation::Observation;

/// Window sizes of a summary period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryPlan {
    pub period: AggregationPeriod,
    /// Size of one summary page
    pub page: TimeFragmenter,
    /// Size of one bucket within the page
    pub bucket: TimeFragmenter,
}

impl SummaryPlan {
    pub fn for_period(period: AggregationPeriod) -> Self {
        match period {
            AggregationPeriod::Hourly => Self {
                period,
                page: TimeFragmenter::new(TimeFragmenter::HOUR * 6),
                bucket: TimeFragmenter::hourly(),
            },
            AggregationPeriod::Daily => Self {
                period,
                page: TimeFragmenter::weekly(),
                bucket: TimeFragmenter::daily(),
            },
        }
    }

    /// Page window for a request: `(from, next, to)` where `to` is `next`
    /// capped at `now`, since nothing beyond the current instant exists yet.
    pub fn window(
        &self,
        page: Option<&str>,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
        let from = self.page.window_start(page, now);
        let next = self.page.next_window(from);
        (from, next, next.min(now))
    }
}

/// Observations gathered from the raw fragments of one summary page.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    /// Vocabulary of the last raw fragment read
    pub context: Value,
    pub observations: Vec<Observation>,
    /// URIs of the raw fragments, in reading order
    pub resources_used: Vec<String>,
}

impl SourceData {
    pub fn new() -> Self {
        Self {
            context: Value::Object(Map::new()),
            ..Default::default()
        }
    }

    /// Take in one raw fragment fetched from `uri` while walking from
    /// `current`, and return where the walk continues.
    ///
    /// The fragment must declare an end date later than `current`; anything
    /// else would never terminate the walk.
    pub fn absorb(
        &mut self,
        uri: impl Into<String>,
        page: &Value,
        current: DateTime<Utc>,
        metrics: &[String],
    ) -> Result<DateTime<Utc>> {
        let uri = uri.into();
        let end = page
            .get("tree:value")
            .and_then(|v| v.get("schema:endDate"))
            .and_then(Value::as_str)
            .and_then(parse_instant)
            .ok_or_else(|| {
                TessellaError::MalformedPayload(format!(
                    "{uri} does not declare tree:value/schema:endDate"
                ))
            })?;

        if end <= current {
            return Err(TessellaError::MalformedPayload(format!(
                "{uri} ends at {}, which does not advance past {}",
                format_instant(end),
                format_instant(current)
            )));
        }

        self.observations.extend(extract_observations(page, metrics)?);
        self.context = vocabulary::extract(page);
        self.resources_used.push(uri);
        Ok(end)
    }
}

/// Decode the `@graph` of a raw fragment into observations.
///
/// Every entity is a sensor; each metric it carries holds an array of
/// `{value, unitCode, observedAt}` records. Entities without a feature of
/// interest and records without a numeric value or a timestamp are skipped.
pub fn extract_observations(page: &Value, metrics: &[String]) -> Result<Vec<Observation>> {
    let graph = page
        .get("@graph")
        .and_then(Value::as_array)
        .ok_or_else(|| TessellaError::MalformedPayload("fragment has no @graph array".into()))?;

    let mut observations = Vec::new();
    for entity in graph {
        let Some(sensor) = entity_id(entity) else {
            log::debug!("skipping entity without identifier");
            continue;
        };
        let Some(feature) = entity.get("featureOfInterest").and_then(reference) else {
            log::debug!("skipping {sensor}: no featureOfInterest");
            continue;
        };

        for metric in metrics {
            let records = match entity.get(metric) {
                Some(Value::Array(records)) => records.as_slice(),
                Some(record @ Value::Object(_)) => std::slice::from_ref(record),
                _ => continue,
            };

            for record in records {
                let value = record.get("value").and_then(Value::as_f64);
                let time = record
                    .get("observedAt")
                    .and_then(Value::as_str)
                    .and_then(parse_instant);
                let (Some(value), Some(time)) = (value, time) else {
                    log::debug!("skipping {metric} record of {sensor}: no value or observedAt");
                    continue;
                };
                let unit_code = record
                    .get("unitCode")
                    .and_then(Value::as_str)
                    .map(str::to_string);

                observations.push(Observation::new(
                    sensor, feature, metric, value, unit_code, time,
                ));
            }
        }
    }
    Ok(observations)
}

fn entity_id(entity: &Value) -> Option<&str> {
    entity
        .get("id")
        .or_else(|| entity.get("@id"))
        .and_then(Value::as_str)
}

/// A relationship target, in either the normalized or the keyValues form.
fn reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map
            .get("object")
            .or_else(|| map.get("@id"))
            .or_else(|| map.get("id"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Every bucket of `[from, to)`.
///
/// Sensors, features and properties are enumerated in order of first
/// appearance, with the "all sensors" bucket (`None`) first.
pub fn select_buckets(
    observations: &[Observation],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    bucket_size: &TimeFragmenter,
) -> Vec<Bucket> {
    let mut sensors: Vec<Option<&str>> = vec![None];
    let mut features: Vec<&str> = Vec::new();
    let mut properties: Vec<&str> = Vec::new();
    let mut seen: HashSet<(u8, &str)> = HashSet::new();

    for observation in observations {
        let sensor = observation.sensor.as_str();
        let feature = observation.feature.as_str();
        let property = observation.observed_property.as_str();
        if seen.insert((0, sensor)) {
            sensors.push(Some(sensor));
        }
        if seen.insert((1, feature)) {
            features.push(feature);
        }
        if seen.insert((2, property)) {
            properties.push(property);
        }
    }

    let mut buckets = Vec::with_capacity(sensors.len() * features.len() * properties.len());
    for window in bucket_size.windows_between(from, to) {
        for sensor in &sensors {
            for feature in &features {
                for property in &properties {
                    buckets.push(Bucket {
                        sensor: sensor.map(str::to_string),
                        feature: feature.to_string(),
                        observed_property: property.to_string(),
                        time_start: window.start,
                        time_end: window.end,
                    });
                }
            }
        }
    }
    buckets
}

/// Apply every function to every bucket.
pub fn aggregate(
    observations: &[Observation],
    buckets: &[Bucket],
    functions: &[AggregateFunction],
) -> Vec<Aggregation> {
    let mut result = Vec::with_capacity(buckets.len() * functions.len());

    for bucket in buckets {
        let mut unit_code: Option<&str> = None;
        let mut values = Vec::new();

        for observation in observations {
            if observation.feature != bucket.feature {
                continue;
            }
            // mixed units within a feature are not reconciled; the last one wins
            if let Some(unit) = observation.unit_code.as_deref() {
                unit_code = Some(unit);
            }
            if let Some(sensor) = &bucket.sensor
                && &observation.sensor != sensor
            {
                continue;
            }
            if observation.observed_property != bucket.observed_property {
                continue;
            }
            if observation.time < bucket.time_start || observation.time >= bucket.time_end {
                continue;
            }
            values.push(observation.value);
        }

        for function in functions {
            result.push(Aggregation {
                function: *function,
                sensor: bucket.sensor.clone(),
                feature: bucket.feature.clone(),
                observed_property: bucket.observed_property.clone(),
                time_start: bucket.time_start,
                time_end: bucket.time_end,
                value: evaluate(*function, &values),
                unit_code: unit_code.map(str::to_string),
            });
        }
    }
    result
}

/// Value of `function` over `values`. `NaN` signals "no data".
pub fn evaluate(function: AggregateFunction, values: &[f64]) -> f64 {
    match function {
        AggregateFunction::Sum => values.iter().sum(),
        AggregateFunction::Count => values.len() as f64,
        AggregateFunction::Average => average(values),
        AggregateFunction::Minimum => values.iter().copied().reduce(f64::min).unwrap_or(f64::NAN),
        AggregateFunction::Maximum => values.iter().copied().reduce(f64::max).unwrap_or(f64::NAN),
        AggregateFunction::StdDev => {
            // mean squared deviation divided by the sum, not the count
            let mean = average(values);
            let squares: Vec<f64> = values.iter().map(|v| (v - mean) * (v - mean)).collect();
            let sum: f64 = values.iter().sum();
            (average(&squares) / sum).sqrt()
        }
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linked-data record of one aggregation.
///
/// The identifier is a digest of the aggregation and the area it covers, so
/// the same statistic over the same cell always gets the same URI.
pub fn wrap_aggregation(
    aggregation: &Aggregation,
    period: AggregationPeriod,
    area: &Map<String, Value>,
    base: &str,
) -> Result<Value> {
    let canonical = serde_json::to_vec(&json!([aggregation, area]))?;
    let digest = hex::encode(Sha256::digest(&canonical));

    let result = if aggregation.has_value() {
        json!(aggregation.value)
    } else {
        Value::Null
    };

    let mut record = Map::new();
    record.insert("@id".into(), json!(format!("{base}/aggregation/{digest}")));
    record.insert("@type".into(), json!("cot:Aggregation"));
    record.insert("cot:hasAggregationPeriod".into(), json!(period.iri()));
    record.insert("cot:usingFunction".into(), json!(aggregation.function.name()));
    record.insert(
        "cot:duringPeriod".into(),
        json!({
            "schema:startDate": format_instant(aggregation.time_start),
            "schema:endDate": format_instant(aggregation.time_end),
        }),
    );
    record.insert("cot:inArea".into(), Value::Object(area.clone()));
    if let Some(sensor) = &aggregation.sensor {
        record.insert("sosa:madeBySensor".into(), json!(sensor));
    }
    record.insert("sosa:hasFeatureOfInterest".into(), json!(aggregation.feature));
    record.insert(
        "sosa:observedProperty".into(),
        json!(aggregation.observed_property),
    );
    record.insert("sosa:hasSimpleResult".into(), result);
    record.insert("schema:unitCode".into(), json!(aggregation.unit_code));
    Ok(Value::Object(record))
}
