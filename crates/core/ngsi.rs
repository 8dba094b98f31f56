//! NGSI-LD entity reshaping.

use crate::compute::time::{TimeWindow, format_instant, parse_instant};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

/// Convert an entity from the normalized representation to keyValues.
///
/// Relationships collapse to their `object`, properties and geo-properties
/// to their `value`. Arrays and nested objects are converted recursively.
pub fn to_key_values(entity: &Value) -> Value {
    match entity {
        Value::Object(map) => {
            let mut converted = Map::with_capacity(map.len());
            for (key, attribute) in map {
                converted.insert(key.clone(), simplify(attribute));
            }
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_key_values).collect()),
        other => other.clone(),
    }
}

fn simplify(attribute: &Value) -> Value {
    let kind = attribute.get("type").and_then(Value::as_str);
    match (kind, attribute) {
        (Some("Relationship"), _) => attribute
            .get("object")
            .map(to_key_values)
            .unwrap_or(Value::Null),
        (Some("Property" | "GeoProperty"), _) => attribute
            .get("value")
            .map(to_key_values)
            .unwrap_or(Value::Null),
        (_, Value::Array(items)) => Value::Array(items.iter().map(simplify).collect()),
        (_, Value::Object(_)) => to_key_values(attribute),
        _ => attribute.clone(),
    }
}

/// Turn entity histories into versioned event-stream members.
///
/// Every distinct `modifiedAt` found anywhere in an entity, on the entity
/// itself or on attribute instances, is a version of it. Each version inside
/// `window` becomes one member `{id}/{modifiedAt}` holding the entity as it
/// stood at that instant.
pub fn version_members(
    entities: &[Value],
    entity_type: &str,
    target: &str,
    window: &TimeWindow,
) -> Vec<Value> {
    let collection = format!("{target}/{}", urlencoding::encode(entity_type));
    let mut members = Vec::new();

    for entity in entities {
        let Some(map) = entity.as_object() else {
            continue;
        };
        let Some(id) = map.get("id").and_then(Value::as_str) else {
            continue;
        };

        let mut versions = BTreeSet::new();
        modification_instants(entity, &mut versions);

        for modified in versions.into_iter().filter(|t| window.contains(*t)) {
            let version = format_instant(modified);
            let mut member = state_as_of(map, modified);
            member.insert("id".into(), json!(format!("{id}/{version}")));
            member.insert("modifiedAt".into(), json!(version));
            member.insert("dcterms:isVersionOf".into(), json!(id));
            member.insert("prov:generatedAtTime".into(), json!(version));
            member.insert("memberOf".into(), json!(collection));
            members.push(Value::Object(member));
        }
    }
    members
}

fn modification_instants(value: &Value, instants: &mut BTreeSet<DateTime<Utc>>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if key == "modifiedAt" {
                    if let Some(instant) = nested.as_str().and_then(parse_instant) {
                        instants.insert(instant);
                    }
                } else {
                    modification_instants(nested, instants);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                modification_instants(item, instants);
            }
        }
        _ => {}
    }
}

fn modified_after(value: &Value, instant: DateTime<Utc>) -> bool {
    value
        .get("modifiedAt")
        .and_then(Value::as_str)
        .and_then(parse_instant)
        .is_some_and(|t| t > instant)
}

/// The entity without the attribute instances modified after `instant`.
fn state_as_of(entity: &Map<String, Value>, instant: DateTime<Utc>) -> Map<String, Value> {
    let mut state = Map::with_capacity(entity.len());
    for (key, attribute) in entity {
        match attribute {
            Value::Array(instances) => {
                let kept: Vec<Value> = instances
                    .iter()
                    .filter(|i| !modified_after(i, instant))
                    .cloned()
                    .collect();
                if kept.is_empty() && !instances.is_empty() {
                    continue;
                }
                state.insert(key.clone(), Value::Array(kept));
            }
            Value::Object(_) if modified_after(attribute, instant) => {}
            _ => {
                state.insert(key.clone(), attribute.clone());
            }
        }
    }
    state
}
