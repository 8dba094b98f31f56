//! Hydra `IriTemplate` descriptions of the fragment URI spaces.

use serde_json::{Value, json};

/// One variable of an IRI template and the property it fills in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mapping {
    pub variable: &'static str,
    pub property: &'static str,
    pub required: bool,
}

impl Mapping {
    pub const fn required(variable: &'static str, property: &'static str) -> Self {
        Self {
            variable,
            property,
            required: true,
        }
    }

    pub const fn optional(variable: &'static str, property: &'static str) -> Self {
        Self {
            variable,
            property,
            required: false,
        }
    }
}

pub(crate) const PAGE: Mapping = Mapping::optional("page", "schema:startDate");
pub(crate) const TYPE: Mapping = Mapping::required("type", "rdf:type");
pub(crate) const PERIOD: Mapping = Mapping::optional("period", "cot:hasAggregationPeriod");

pub(crate) fn iri_template(template: String, mappings: &[Mapping]) -> Value {
    let mapping: Vec<Value> = mappings
        .iter()
        .map(|m| {
            json!({
                "@type": "hydra:IriTemplateMapping",
                "hydra:variable": m.variable,
                "hydra:property": m.property,
                "hydra:required": m.required,
            })
        })
        .collect();

    json!({
        "@type": "hydra:IriTemplate",
        "hydra:template": template,
        "hydra:variableRepresentation": "hydra:BasicRepresentation",
        "hydra:mapping": mapping,
    })
}

/// The three views every tiling scheme exposes.
pub(crate) fn data_template(base: &str, path: &str, cell: &[Mapping]) -> Value {
    let mut mappings = cell.to_vec();
    mappings.extend([PAGE, TYPE]);
    iri_template(format!("{base}{path}{{?page,type}}"), &mappings)
}

pub(crate) fn summary_template(base: &str, path: &str, cell: &[Mapping]) -> Value {
    let mut mappings = cell.to_vec();
    mappings.extend([PAGE, PERIOD, TYPE]);
    iri_template(format!("{base}{path}/summary{{?page,period,type}}"), &mappings)
}

pub(crate) fn latest_template(base: &str, path: &str, cell: &[Mapping]) -> Value {
    let mut mappings = cell.to_vec();
    mappings.push(TYPE);
    iri_template(format!("{base}{path}/latest{{?type}}"), &mappings)
}
