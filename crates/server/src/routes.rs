//! HTTP route handlers and router configuration

use crate::error::ServerError;
use crate::state::AppState;
use crate::upstream;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tessella::{
    AggregationPeriod, Fragment, Fragmenter, GeoFragmenter, SourceData, SummaryPlan,
    TessellaError, TileRequest, TimeFragmenter, TimeWindow, ngsi,
};

const LD_JSON: &str = "application/ld+json; charset=utf-8";

/// Query parameters shared by every fragment route.
#[derive(Debug, Default, Deserialize)]
pub struct FragmentQuery {
    pub page: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub period: Option<String>,
}

impl FragmentQuery {
    fn required_type(&self) -> Result<&str, ServerError> {
        self.entity_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ServerError::Engine(TessellaError::MissingParameter("type")))
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/:z/:x/:y", get(slippy_page))
        .route("/:z/:x/:y/latest", get(slippy_latest))
        .route("/:z/:x/:y/summary", get(slippy_summary))
        .route("/geohash/:hash", get(geohash_page))
        .route("/geohash/:hash/latest", get(geohash_latest))
        .route("/geohash/:hash/summary", get(geohash_summary))
        .route("/h3/:index", get(h3_page))
        .route("/h3/:index/latest", get(h3_latest))
        .route("/h3/:index/summary", get(h3_summary))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

type Handled = Result<Response, ServerError>;
type AppQuery = Query<FragmentQuery>;

async fn slippy_page(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
    Query(query): AppQuery,
) -> Handled {
    data_page(&state, TileRequest::slippy(z, x, y), query).await
}

async fn slippy_latest(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
    Query(query): AppQuery,
) -> Handled {
    latest(&state, TileRequest::slippy(z, x, y), query).await
}

async fn slippy_summary(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
    Query(query): AppQuery,
) -> Handled {
    summary(&state, TileRequest::slippy(z, x, y), query).await
}

async fn geohash_page(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    data_page(&state, TileRequest::geohash(hash), query).await
}

async fn geohash_latest(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    latest(&state, TileRequest::geohash(hash), query).await
}

async fn geohash_summary(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    summary(&state, TileRequest::geohash(hash), query).await
}

async fn h3_page(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    data_page(&state, TileRequest::h3(index), query).await
}

async fn h3_latest(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    latest(&state, TileRequest::h3(index), query).await
}

async fn h3_summary(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(query): AppQuery,
) -> Handled {
    summary(&state, TileRequest::h3(index), query).await
}

/// Raw entity states of one hourly window.
async fn data_page(state: &AppState, request: TileRequest, query: FragmentQuery) -> Handled {
    let fragmenter = Fragmenter::for_request(&request);
    let cell = fragmenter.resolve(&request)?;
    let entity_type = query.required_type()?;

    let now = state.now();
    let time = TimeFragmenter::hourly();
    let window = time.window_for(time.window_start(query.page.as_deref(), now));
    let region = fragmenter.bounding_region(&cell.focus, cell.precision)?;

    let uri = upstream::temporal_query(
        &state.config.ngsi.host,
        entity_type,
        &region,
        window.start,
        window.end,
    )?;
    let data = state.cache.get_or_fetch(&uri, state.source.as_ref()).await?;
    let data = reshape(state, data, entity_type, &window)?;

    let fragment = state.builder.build_page(
        &request,
        query.page.as_deref(),
        data,
        &time,
        Some(entity_type),
        now,
    )?;
    Ok(respond(fragment))
}

/// The most recent values of the cell.
async fn latest(state: &AppState, request: TileRequest, query: FragmentQuery) -> Handled {
    let fragmenter = Fragmenter::for_request(&request);
    let cell = fragmenter.resolve(&request)?;
    let entity_type = query.required_type()?;

    let now = state.now();
    let region = fragmenter.bounding_region(&cell.focus, cell.precision)?;
    let uri = upstream::latest_query(
        &state.config.ngsi.host,
        entity_type,
        &region,
        now,
        state.config.api.last_n,
    )?;
    let data = state.cache.get_or_fetch(&uri, state.source.as_ref()).await?;
    let data = entities(data)?;
    let data = if state.config.api.key_values {
        key_values(data)
    } else {
        data
    };

    let fragment = state
        .builder
        .build_latest(&request, data, now, Some(entity_type))?;
    Ok(respond(fragment))
}

/// Aggregations over the raw pages of one summary window.
///
/// Raw pages are read one after the other; each declares where the next one
/// starts.
async fn summary(state: &AppState, request: TileRequest, query: FragmentQuery) -> Handled {
    let fragmenter = Fragmenter::for_request(&request);
    let cell = fragmenter.resolve(&request)?;
    let entity_type = query.required_type()?;

    let now = state.now();
    let plan = SummaryPlan::for_period(AggregationPeriod::from_param(query.period.as_deref()));
    let (from, _, to) = plan.window(query.page.as_deref(), now);

    let mut source = SourceData::new();
    let mut current = from;
    while current < to {
        let uri = fragmenter.data_fragment_uri(
            state.config.api.summary_source(),
            &cell.focus,
            cell.precision,
            current,
            Some(entity_type),
        )?;
        let page = state.cache.get_or_fetch(&uri, state.source.as_ref()).await?;
        current = source.absorb(uri, &page, current, &state.config.data.metrics)?;
    }

    let fragment = state.builder.build_summary(
        &request,
        &plan,
        query.page.as_deref(),
        &source,
        Some(entity_type),
        now,
    )?;
    Ok(respond(fragment))
}

fn entities(data: Value) -> Result<Value, ServerError> {
    match data {
        Value::Array(_) => Ok(data),
        _ => Err(TessellaError::MalformedPayload(
            "expected an array of entities from the temporal source".into(),
        )
        .into()),
    }
}

fn key_values(data: Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(items.iter().map(ngsi::to_key_values).collect()),
        other => ngsi::to_key_values(&other),
    }
}

/// Apply the configured NGSI-LD simplifications to raw entity states.
fn reshape(
    state: &AppState,
    data: Value,
    entity_type: &str,
    window: &TimeWindow,
) -> Result<Value, ServerError> {
    let mut data = entities(data)?;
    // versions are read from the instance metadata that keyValues drops
    if state.config.api.version_members
        && let Value::Array(items) = &data
    {
        data = Value::Array(ngsi::version_members(
            items,
            entity_type,
            &state.config.api.host,
            window,
        ));
    }
    if state.config.api.key_values {
        data = key_values(data);
    }
    Ok(data)
}

fn respond(fragment: Fragment) -> Response {
    let Fragment { body, cache } = fragment;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, LD_JSON.to_string()),
            (header::CACHE_CONTROL, cache.header_value()),
        ],
        body.to_string(),
    )
        .into_response()
}
