//! JSON-LD context handling for outbound fragments.
//!
//! The vocabulary of a fragment is the context of the data it embeds plus the
//! terms the fragment itself uses. Remote context references (strings) are
//! kept in order and deduplicated; every inline definition is folded into a
//! single object, so merging the same terms twice yields the same context.

use serde_json::{Map, Value, json};

/// Terms every fragment uses: hypermedia controls, tree relations and the
/// vocabularies of its metadata.
pub fn fragment_terms() -> Map<String, Value> {
    let terms = json!({
        "xsd": "http://www.w3.org/2001/XMLSchema#",
        "schema": "http://schema.org/",
        "schema:endDate": { "@type": "xsd:dateTime" },
        "dcterms": "http://purl.org/dc/terms/",
        "tiles": "https://w3id.org/tree/terms#",
        "hydra": "http://www.w3.org/ns/hydra/core#",
        "hydra:variableRepresentation": { "@type": "@id" },
        "hydra:property": { "@type": "@id" },
        "tree": "https://w3id.org/tree/terms#",
        "tree:node": { "@type": "@id" },
        "tree:child": { "@type": "@id" },
        "tree:path": { "@type": "@id" },
        "sh": "https://www.w3.org/ns/shacl#",
        "sh:path": { "@type": "@id" },
        "ngsi-ld": "https://uri.etsi.org/ngsi-ld/",
        "prov": "http://www.w3.org/ns/prov#",
    });
    into_map(terms)
}

/// Additional terms of the summary view.
pub fn aggregation_terms() -> Map<String, Value> {
    let terms = json!({
        "cot": "https://w3id.org/city_of_things#",
        "cot:hasAggregationPeriod": { "@type": "@id" },
        "cot:usingFunction": { "@type": "@id" },
        "sosa": "http://www.w3.org/ns/sosa/",
        "sosa:madeBySensor": { "@type": "@id" },
        "sosa:observedProperty": { "@type": "@id" },
    });
    into_map(terms)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Vocabulary of some input data.
///
/// Upstream answers either with an array of entities, each carrying its own
/// `@context`, or with a single document. The first entity's context wins.
/// Data without any context yields an empty vocabulary.
pub fn extract(data: &Value) -> Value {
    let context = match data {
        Value::Array(entities) => entities.first().and_then(|e| e.get("@context")),
        Value::Object(document) => document.get("@context"),
        _ => None,
    };

    match context {
        Some(context) => context.clone(),
        None => {
            log::debug!("input data carries no @context, starting from an empty vocabulary");
            Value::Object(Map::new())
        }
    }
}

/// Merge `terms` into `vocabulary`.
///
/// The result is a single object when the vocabulary has no remote
/// references, otherwise an array of the references followed by one object.
pub fn merge(vocabulary: &Value, terms: &Map<String, Value>) -> Value {
    let mut remote: Vec<Value> = Vec::new();
    let mut inline = Map::new();

    collect(vocabulary, &mut remote, &mut inline);
    for (term, definition) in terms {
        inline.insert(term.clone(), definition.clone());
    }

    if remote.is_empty() {
        Value::Object(inline)
    } else {
        remote.push(Value::Object(inline));
        Value::Array(remote)
    }
}

fn collect(context: &Value, remote: &mut Vec<Value>, inline: &mut Map<String, Value>) {
    match context {
        Value::String(_) => {
            if !remote.contains(context) {
                remote.push(context.clone());
            }
        }
        Value::Object(map) => {
            for (term, definition) in map {
                inline.insert(term.clone(), definition.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, remote, inline);
            }
        }
        _ => {}
    }
}

/// Remove the per-entity contexts once they are hoisted to the fragment.
pub fn strip_contexts(graph: &mut Value) {
    match graph {
        Value::Array(entities) => {
            for entity in entities {
                if let Value::Object(map) = entity {
                    map.remove("@context");
                }
            }
        }
        Value::Object(map) => {
            map.remove("@context");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld";

    #[test]
    fn test_extract_from_first_entity() {
        let data = json!([
            { "id": "a", "@context": [CORE] },
            { "id": "b", "@context": ["other"] },
        ]);
        assert_eq!(extract(&data), json!([CORE]));
        assert_eq!(extract(&json!([])), json!({}));
        assert_eq!(extract(&json!({ "@graph": [] })), json!({}));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let source = json!([CORE, { "NO2": "https://example.org/NO2" }]);
        let once = merge(&source, &fragment_terms());
        let twice = merge(&once, &fragment_terms());
        assert_eq!(once, twice);

        let items = once.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], CORE);
        assert_eq!(items[1]["NO2"], "https://example.org/NO2");
        assert_eq!(items[1]["tree"], "https://w3id.org/tree/terms#");
    }

    #[test]
    fn test_merge_without_remote_references_is_an_object() {
        let merged = merge(&json!({}), &fragment_terms());
        assert!(merged.is_object());
        assert_eq!(merged["sh:path"]["@type"], "@id");
    }

    #[test]
    fn test_strip_contexts() {
        let mut graph = json!([{ "id": "a", "@context": [CORE] }, { "id": "b" }]);
        strip_contexts(&mut graph);
        assert_eq!(graph, json!([{ "id": "a" }, { "id": "b" }]));
    }
}
