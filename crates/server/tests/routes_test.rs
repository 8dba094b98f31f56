use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tessella::{Config, H3Fragmenter, Location, format_instant, parse_instant};
use tessella_server::{AppState, Fetched, ServerError, TemporalSource, build_router, load_config};
use tower::ServiceExt;

const AIR: &str = "https://uri.etsi.org/ngsi-ld/default-context/AirQualityObserved";

/// Upstream double that records every URI it is asked for.
struct FakeSource {
    uris: Mutex<Vec<String>>,
    respond: Box<dyn Fn(&str) -> Result<Fetched, ServerError> + Send + Sync>,
}

impl FakeSource {
    fn new(
        respond: impl Fn(&str) -> Result<Fetched, ServerError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            uris: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    fn calls(&self) -> usize {
        self.uris.lock().unwrap().len()
    }

    fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemporalSource for FakeSource {
    async fn fetch(&self, uri: &str) -> Result<Fetched, ServerError> {
        self.uris.lock().unwrap().push(uri.to_string());
        (self.respond)(uri)
    }
}

fn at(s: &str) -> DateTime<Utc> {
    parse_instant(s).unwrap()
}

fn entities() -> Value {
    json!([{
        "id": "urn:ngsi-ld:AirQualityObserved:1",
        "type": "AirQualityObserved",
        "@context": ["https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld"],
        "modifiedAt": "2024-01-01T00:30:00Z",
    }])
}

fn app(source: Arc<FakeSource>, now: DateTime<Utc>) -> axum::Router {
    app_with(Config::default(), source, now)
}

fn app_with(config: Config, source: Arc<FakeSource>, now: DateTime<Utc>) -> axum::Router {
    let state = AppState::with_source(config, source).with_clock(move || now);
    build_router(Arc::new(state))
}

async fn get(
    app: &axum::Router,
    uri: &str,
) -> anyhow::Result<(StatusCode, axum::http::HeaderMap, Vec<u8>)> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, headers, body.to_vec()))
}

fn encoded_type() -> String {
    urlencoding::encode(AIR).into_owned()
}

#[tokio::test]
async fn test_closed_slippy_page() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let source = FakeSource::new(|_| Ok(Fetched::new(entities(), Duration::from_secs(60))));
    let app = app(source.clone(), at("2024-06-01T00:00:00Z"));

    let uri = format!("/13/4096/2048?page=2024-01-01T00:00:00Z&type={}", encoded_type());
    let (status, headers, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/ld+json; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=86400");

    let body: Value = serde_json::from_slice(&body)?;
    let id = body["@id"].as_str().unwrap();
    assert!(id.contains("page=2024-01-01T00:00:00.000Z"));

    let relations = body["tree:relation"].as_array().unwrap();
    let node = |kind: &str| {
        relations
            .iter()
            .find(|r| r["@type"] == kind)
            .and_then(|r| r["tree:node"].as_str())
            .map(str::to_string)
    };
    let previous = node("tree:LessThanRelation").unwrap();
    assert!(previous.contains("page=2023-12-31T23:00:00.000Z"));
    let next = node("tree:GreaterThanRelation").unwrap();
    assert!(next.contains("page=2024-01-01T01:00:00.000Z"));
    assert_eq!(body["@graph"][0]["id"], "urn:ngsi-ld:AirQualityObserved:1");

    let upstream = source.uris();
    assert_eq!(upstream.len(), 1);
    assert!(upstream[0].starts_with("http://localhost:3000/temporal/entities?type="));
    assert!(upstream[0].contains("&georel=within&geometry=Polygon&coordinates="));
    assert!(upstream[0].contains(
        "&timerel=between&time=2024-01-01T00:00:00.000Z&endTime=2024-01-01T01:00:00.000Z"
    ));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_zoom_never_reaches_upstream() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| Ok(Fetched::new(entities(), Duration::from_secs(60))));
    let app = app(source.clone(), Utc::now());

    let uri = format!("/20/1/1?type={}", encoded_type());
    let (status, _, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8(body)?.contains("Precision 20"));

    let (status, _, _) = get(&app, "/geohash/u14dkwq/latest?type=x").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(&app, "/20/1/1/summary").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(source.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_type_is_rejected() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| Ok(Fetched::new(entities(), Duration::from_secs(60))));
    let app = app(source.clone(), Utc::now());

    let (status, _, body) = get(&app, "/geohash/u14dk").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(String::from_utf8(body)?, "Missing required parameter: type");

    let (status, _, _) = get(&app, "/13/4096/2048/latest").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(&app, "/13/abc/2048?type=x").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // summaries read raw pages, which cannot be served without a type either
    let uri = "/geohash/u14dk/summary?page=2024-01-01T00:00:00Z";
    let (status, _, body) = get(&app, uri).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(String::from_utf8(body)?, "Missing required parameter: type");

    let (status, _, _) = get(&app, "/geohash/u14dk/summary?type=%20").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(source.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_repeated_request_hits_cache() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| Ok(Fetched::new(entities(), Duration::from_secs(60))));
    let app = app(source.clone(), at("2024-06-01T00:00:00Z"));

    let uri = format!("/geohash/u14dk?page=2024-01-01T00:00:00Z&type={}", encoded_type());
    let (first, _, a) = get(&app, &uri).await?;
    let (second, _, b) = get(&app, &uri).await?;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(a, b);
    assert_eq!(source.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failures_are_bad_gateway() -> anyhow::Result<()> {
    let source = FakeSource::new(|uri| Err(ServerError::Timeout(uri.to_string())));
    let app = app(source.clone(), Utc::now());

    let uri = format!("/13/4096/2048?type={}", encoded_type());
    let (status, _, _) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let malformed = FakeSource::new(|_| {
        Ok(Fetched::new(json!({ "error": "nope" }), Duration::from_secs(1)))
    });
    let (status, _, body) = get(&app_with(Config::default(), malformed, Utc::now()), &uri).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8(body)?.starts_with("Malformed upstream payload"));
    Ok(())
}

#[tokio::test]
async fn test_silent_upstream_times_out() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = Config::default()
        .with_source(format!("http://{addr}"))
        .with_timeout_secs(1);
    let app = build_router(Arc::new(AppState::new(config)?));

    let uri = format!("/geohash/u14dk?type={}", encoded_type());
    let (status, _, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8(body)?.contains("timed out"));

    silent.abort();
    Ok(())
}

#[tokio::test]
async fn test_latest_view() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| Ok(Fetched::new(entities(), Duration::from_secs(1))));
    let now = at("2024-01-01T10:42:00Z");
    let app = app_with(Config::default().with_last_n(3), source.clone(), now);

    let cell = H3Fragmenter::cell_of(&Location::new(51.0543, 3.7174), 7)?;
    let uri = format!("/h3/{cell}/latest?type={}", encoded_type());
    let (status, headers, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=5");

    let body: Value = serde_json::from_slice(&body)?;
    assert!(body["@id"].as_str().unwrap().contains("/latest?type="));
    assert_eq!(body["tree:value"]["schema:endDate"], "2024-01-01T10:42:00.000Z");
    assert!(source.uris()[0].ends_with("&timerel=before&time=2024-01-01T10:42:00.000Z&lastN=3"));
    Ok(())
}

#[tokio::test]
async fn test_key_values_and_versioned_members() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| {
        Ok(Fetched::new(
            json!([{
                "id": "urn:a",
                "modifiedAt": "2024-01-01T05:00:00Z",
                "NO2": [
                    { "type": "Property", "value": 12.0, "modifiedAt": "2024-01-01T00:10:00Z" },
                    { "type": "Property", "value": 14.0, "modifiedAt": "2024-01-01T00:40:00Z" },
                ],
            }]),
            Duration::from_secs(1),
        ))
    });
    let mut config = Config::default();
    config.api.key_values = true;
    config.api.version_members = true;
    let app = app_with(config, source, at("2024-06-01T00:00:00Z"));

    let uri = "/geohash/u14dk?page=2024-01-01T00:00:00Z&type=AirQualityObserved";
    let (status, _, body) = get(&app, uri).await?;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body)?;
    let graph = body["@graph"].as_array().unwrap();
    assert_eq!(graph.len(), 2);

    assert_eq!(graph[0]["id"], "urn:a/2024-01-01T00:10:00.000Z");
    assert_eq!(graph[0]["NO2"], json!([12.0]));
    assert_eq!(graph[1]["id"], "urn:a/2024-01-01T00:40:00.000Z");
    assert_eq!(graph[1]["NO2"], json!([12.0, 14.0]));
    assert_eq!(graph[1]["dcterms:isVersionOf"], "urn:a");
    assert_eq!(graph[1]["memberOf"], "http://localhost:3001/AirQualityObserved");
    Ok(())
}

/// Answers every raw page request with one hour of data: one NO2 reading
/// in the middle of the hour.
fn raw_hour(uri: &str) -> Result<Fetched, ServerError> {
    let page = uri
        .split("page=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .and_then(parse_instant)
        .ok_or_else(|| ServerError::Upstream(format!("unexpected uri {uri}")))?;
    let end = page + ChronoDuration::hours(1);

    Ok(Fetched::new(
        json!({
            "@context": { "NO2": "https://example.org/NO2" },
            "tree:value": {
                "schema:startDate": format_instant(page),
                "schema:endDate": format_instant(end),
            },
            "@graph": [{
                "id": "urn:sensor:1",
                "featureOfInterest": "urn:feature:air",
                "NO2": [{
                    "value": 10.0,
                    "unitCode": "GQ",
                    "observedAt": format_instant(page + ChronoDuration::minutes(30)),
                }],
            }],
        }),
        Duration::from_secs(60),
    ))
}

#[tokio::test]
async fn test_daily_summary() -> anyhow::Result<()> {
    let source = FakeSource::new(raw_hour);
    let app = app(source.clone(), at("2024-06-01T00:00:00Z"));

    let uri = format!(
        "/geohash/u14dk/summary?page=2024-01-04T00:00:00Z&period=daily&type={}",
        encoded_type()
    );
    let (status, headers, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=86400");

    // one raw page per hour of the week
    assert_eq!(source.calls(), 7 * 24);

    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["tree:value"]["schema:startDate"], "2024-01-04T00:00:00.000Z");
    assert_eq!(body["tree:value"]["schema:endDate"], "2024-01-11T00:00:00.000Z");
    assert_eq!(body["prov:wasDerivedFrom"].as_array().unwrap().len(), 7 * 24);

    // 7 days x (sensor + all sensors) x 1 feature x 1 property x 6 functions
    let graph = body["@graph"].as_array().unwrap();
    assert_eq!(graph.len(), 7 * 2 * 6);
    for record in graph {
        let start = at(record["cot:duringPeriod"]["schema:startDate"].as_str().unwrap());
        let end = at(record["cot:duringPeriod"]["schema:endDate"].as_str().unwrap());
        assert_eq!(end - start, ChronoDuration::hours(24));
        assert_eq!(record["cot:hasAggregationPeriod"], "https://w3id.org/city_of_things#Daily");
    }

    let count = graph
        .iter()
        .find(|r| r["cot:usingFunction"] == "cot:Count" && r.get("sosa:madeBySensor").is_none())
        .unwrap();
    assert_eq!(count["sosa:hasSimpleResult"], 24.0);
    assert_eq!(count["schema:unitCode"], "GQ");
    Ok(())
}

#[tokio::test]
async fn test_summary_of_open_window() -> anyhow::Result<()> {
    let source = FakeSource::new(raw_hour);
    let app = app(source.clone(), at("2024-01-01T03:30:00Z"));

    let uri = format!("/geohash/u14dk/summary?type={}", encoded_type());
    let (status, headers, body) = get(&app, &uri).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=5");

    // hours 00, 01, 02 and the running hour 03; nothing past now is read
    let pages: Vec<String> = source
        .uris()
        .iter()
        .filter_map(|uri| uri.split("page=").nth(1))
        .filter_map(|rest| rest.split('&').next())
        .map(str::to_string)
        .collect();
    assert_eq!(
        pages,
        [
            "2024-01-01T00:00:00.000Z",
            "2024-01-01T01:00:00.000Z",
            "2024-01-01T02:00:00.000Z",
            "2024-01-01T03:00:00.000Z",
        ]
    );
    assert!(source.uris().iter().all(|uri| uri.contains("&type=")));

    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["tree:value"]["schema:startDate"], "2024-01-01T00:00:00.000Z");
    assert_eq!(body["tree:value"]["schema:endDate"], "2024-01-01T06:00:00.000Z");

    let relations = body["tree:relation"].as_array().unwrap();
    assert!(!relations.iter().any(|r| r["@type"] == "tree:GreaterThanRelation"));
    let latest = relations
        .iter()
        .find(|r| r["@type"] == "tree:AlternateViewRelation")
        .and_then(|r| r["tree:node"].as_str())
        .unwrap();
    assert!(latest.starts_with("http://localhost:3001/geohash/u14dk/latest?type="));

    // 4 started hours x (sensor + all sensors) x 1 feature x 1 property x 6 functions
    assert_eq!(body["@graph"].as_array().unwrap().len(), 4 * 2 * 6);
    Ok(())
}

#[tokio::test]
async fn test_summary_stops_on_stalled_source() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| {
        Ok(Fetched::new(
            json!({
                "tree:value": { "schema:endDate": "2024-01-01T00:00:00.000Z" },
                "@graph": [],
            }),
            Duration::from_secs(60),
        ))
    });
    let app = app(source.clone(), at("2024-06-01T00:00:00Z"));

    let uri = "/geohash/u14dk/summary?page=2024-01-01T00:00:00Z&type=AirQualityObserved";
    let (status, _, _) = get(&app, uri).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(source.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_health() -> anyhow::Result<()> {
    let source = FakeSource::new(|_| Err(ServerError::Upstream("unused".into())));
    let app = app(source, Utc::now());
    let (status, _, body) = get(&app, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    Ok(())
}

#[test]
fn test_load_config_by_extension() -> anyhow::Result<()> {
    use std::io::Write;

    let mut toml = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(toml, "[ngsi]\nhost = \"http://broker:9090\"\n\n[api]\nlast_n = 2")?;
    let config = load_config(toml.path())?;
    assert_eq!(config.ngsi.host, "http://broker:9090");
    assert_eq!(config.api.last_n, 2);

    let mut json = tempfile::Builder::new().suffix(".json").tempfile()?;
    write!(json, r#"{{"api": {{"host": "https://tiles.example.org"}}}}"#)?;
    let config = load_config(json.path())?;
    assert_eq!(config.api.host, "https://tiles.example.org");

    let mut invalid = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(invalid, "[api]\nlast_n = 0")?;
    let err = load_config(invalid.path()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(load_config(std::path::Path::new("/nonexistent/tessella.toml")).is_err());
    Ok(())
}
