//! Outbound fragment construction.
//!
//! A fragment is one page of the dataset: a `tree:Node` that names itself,
//! describes the cell and time window it covers, links to its neighbours and
//! embeds either raw entities or aggregation records. Fragments are built
//! fresh per request and never stored.

pub mod vocabulary;

use crate::aggregate::{self, SourceData, SummaryPlan};
use crate::compute::geo::{Cell, Fragmenter, GeoFragmenter, TileRequest};
use crate::compute::time::{TimeFragmenter, format_instant};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tessella_types::aggregation::AggregateFunction;

/// How long clients and proxies may keep a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// The window closed before the fragment was fetched; its content is final.
    Stable,
    /// The window is still filling up.
    Volatile,
}

impl CachePolicy {
    /// Policy of a window ending at `end`, fetched at `fetched_at`.
    pub fn for_window(end: DateTime<Utc>, fetched_at: DateTime<Utc>) -> Self {
        if end < fetched_at {
            Self::Stable
        } else {
            Self::Volatile
        }
    }

    /// Lifetime in seconds.
    pub fn max_age(&self) -> u32 {
        match self {
            Self::Stable => 60 * 60 * 24,
            Self::Volatile => 5,
        }
    }

    /// `Cache-Control` header value.
    pub fn header_value(&self) -> String {
        format!("public, max-age={}", self.max_age())
    }
}

/// A built fragment and the cache policy it is served with.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub body: Value,
    pub cache: CachePolicy,
}

/// Navigation relation kinds used between fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    LessThan,
    GreaterThan,
    AlternateView,
}

impl Relation {
    fn to_json(self, node: String) -> Value {
        let kind = match self {
            Self::LessThan => "tree:LessThanRelation",
            Self::GreaterThan => "tree:GreaterThanRelation",
            Self::AlternateView => "tree:AlternateViewRelation",
        };
        json!({ "@type": kind, "tree:node": node })
    }
}

/// Mints fragments under a public base URI.
#[derive(Debug, Clone)]
pub struct FragmentBuilder {
    base: String,
}

impl FragmentBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Raw data page of the window selected by `page`.
    ///
    /// A link to the next window is only given once that window has started
    /// filling up, i.e. when `now` is past it; until then the fragment points
    /// at the floating latest view instead.
    pub fn build_page(
        &self,
        request: &TileRequest,
        page: Option<&str>,
        mut raw_data: Value,
        time: &TimeFragmenter,
        entity_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Fragment> {
        let fragmenter = Fragmenter::for_request(request);
        let Cell { focus, precision } = fragmenter.resolve(request)?;

        let from = time.window_start(page, now);
        let next = time.next_window(from);
        let previous = time.previous_window(from);

        let context = vocabulary::merge(
            &vocabulary::extract(&raw_data),
            &vocabulary::fragment_terms(),
        );
        vocabulary::strip_contexts(&mut raw_data);

        let base = self.base.as_str();
        let mut relations = vec![Relation::LessThan.to_json(fragmenter.data_fragment_uri(
            base,
            &focus,
            precision,
            previous,
            entity_type,
        )?)];
        if now > next {
            relations.push(Relation::GreaterThan.to_json(fragmenter.data_fragment_uri(
                base,
                &focus,
                precision,
                next,
                entity_type,
            )?));
        } else {
            relations.push(Relation::AlternateView.to_json(fragmenter.latest_fragment_uri(
                base,
                &focus,
                precision,
                entity_type,
            )?));
        }

        let mut body = Map::new();
        body.insert("@context".into(), context);
        body.insert(
            "@id".into(),
            json!(fragmenter.data_fragment_uri(base, &focus, precision, from, entity_type)?),
        );
        body.insert("@type".into(), json!("tree:Node"));
        body.extend(fragmenter.metadata(&focus, precision)?);
        body.insert("tree:relation".into(), Value::Array(relations));
        body.insert(
            "tree:value".into(),
            json!({
                "schema:startDate": format_instant(from),
                "schema:endDate": format_instant(next),
            }),
        );
        body.insert("sh:path".into(), json!("ngsi-ld:observedAt"));
        body.insert(
            "dcterms:isPartOf".into(),
            self.collection(fragmenter.data_search_template(base)),
        );
        body.insert("@graph".into(), raw_data);

        Ok(Fragment {
            body: Value::Object(body),
            cache: CachePolicy::for_window(next, now),
        })
    }

    /// Most recent values of the cell, known as of `as_of`.
    ///
    /// The latest view floats; its only relation points back to the hourly
    /// page that contains `as_of`.
    pub fn build_latest(
        &self,
        request: &TileRequest,
        mut raw_data: Value,
        as_of: DateTime<Utc>,
        entity_type: Option<&str>,
    ) -> Result<Fragment> {
        let fragmenter = Fragmenter::for_request(request);
        let Cell { focus, precision } = fragmenter.resolve(request)?;

        let context = vocabulary::merge(
            &vocabulary::extract(&raw_data),
            &vocabulary::fragment_terms(),
        );
        vocabulary::strip_contexts(&mut raw_data);

        let base = self.base.as_str();
        let page = TimeFragmenter::hourly().window_start_at(as_of);
        let relations = vec![Relation::AlternateView.to_json(fragmenter.data_fragment_uri(
            base,
            &focus,
            precision,
            page,
            entity_type,
        )?)];

        let mut body = Map::new();
        body.insert("@context".into(), context);
        body.insert(
            "@id".into(),
            json!(fragmenter.latest_fragment_uri(base, &focus, precision, entity_type)?),
        );
        body.insert("@type".into(), json!("tree:Node"));
        body.extend(fragmenter.metadata(&focus, precision)?);
        body.insert("tree:relation".into(), Value::Array(relations));
        body.insert(
            "tree:value".into(),
            json!({ "schema:endDate": format_instant(as_of) }),
        );
        body.insert("sh:path".into(), json!("ngsi-ld:observedAt"));
        body.insert(
            "dcterms:isPartOf".into(),
            self.collection(fragmenter.latest_search_template(base)),
        );
        body.insert("@graph".into(), raw_data);

        Ok(Fragment {
            body: Value::Object(body),
            cache: CachePolicy::Volatile,
        })
    }

    /// Aggregated view of the page selected by `page`, over the raw
    /// fragments collected in `source`.
    pub fn build_summary(
        &self,
        request: &TileRequest,
        plan: &SummaryPlan,
        page: Option<&str>,
        source: &SourceData,
        entity_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Fragment> {
        let fragmenter = Fragmenter::for_request(request);
        let Cell { focus, precision } = fragmenter.resolve(request)?;
        let period = plan.period;

        let (from, next, to) = plan.window(page, now);
        let previous = plan.page.previous_window(from);

        let buckets = aggregate::select_buckets(&source.observations, from, to, &plan.bucket);
        let aggregations =
            aggregate::aggregate(&source.observations, &buckets, &AggregateFunction::ALL);

        let base = self.base.as_str();
        let area = fragmenter.metadata(&focus, precision)?;
        let graph = aggregations
            .iter()
            .map(|a| aggregate::wrap_aggregation(a, period, &area, base))
            .collect::<Result<Vec<_>>>()?;

        let mut terms = vocabulary::fragment_terms();
        terms.extend(vocabulary::aggregation_terms());
        let context = vocabulary::merge(&source.context, &terms);

        let summary_uri = |time: DateTime<Utc>| {
            fragmenter.summary_fragment_uri(base, &focus, precision, time, period, entity_type)
        };
        let mut relations = vec![Relation::LessThan.to_json(summary_uri(previous)?)];
        if now > next {
            relations.push(Relation::GreaterThan.to_json(summary_uri(next)?));
        } else {
            relations.push(Relation::AlternateView.to_json(fragmenter.latest_fragment_uri(
                base,
                &focus,
                precision,
                entity_type,
            )?));
        }

        let mut body = Map::new();
        body.insert("@context".into(), context);
        body.insert("@id".into(), json!(summary_uri(from)?));
        body.insert("@type".into(), json!("tree:Node"));
        body.extend(area);
        body.insert("tree:relation".into(), Value::Array(relations));
        body.insert(
            "tree:value".into(),
            json!({
                "schema:startDate": format_instant(from),
                "schema:endDate": format_instant(next),
            }),
        );
        body.insert("sh:path".into(), json!("schema:startDate"));
        body.insert(
            "dcterms:isPartOf".into(),
            self.collection(fragmenter.summary_search_template(base)),
        );
        body.insert("prov:wasDerivedFrom".into(), json!(source.resources_used));
        body.insert("@graph".into(), Value::Array(graph));

        Ok(Fragment {
            body: Value::Object(body),
            cache: CachePolicy::for_window(to, now),
        })
    }

    fn collection(&self, search: Value) -> Value {
        json!({
            "@id": self.base,
            "@type": "hydra:Collection",
            "hydra:search": search,
        })
    }
}
