//! Access to the upstream temporal entity source.

use crate::error::ServerError;
use async_trait::async_trait;
use axum::http::header;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tessella::{Region, format_instant};

/// Lifetime of an upstream answer that carries no `max-age` directive.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1);

/// An upstream answer and how long it may be reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: Value,
    pub max_age: Duration,
}

impl Fetched {
    pub fn new(body: Value, max_age: Duration) -> Self {
        Self { body, max_age }
    }
}

/// Anything that can resolve a URI into a JSON document.
#[async_trait]
pub trait TemporalSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Fetched, ServerError>;
}

/// HTTP implementation on top of a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Every request through this source fails once `timeout` has elapsed.
    pub fn new(timeout: Duration) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tessella/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TemporalSource for HttpSource {
    async fn fetch(&self, uri: &str) -> Result<Fetched, ServerError> {
        let response = self
            .client
            .get(uri)
            .header(header::ACCEPT, "application/ld+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Upstream(format!("{uri} answered {status}")));
        }

        let max_age = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_MAX_AGE);

        let body = response.json::<Value>().await?;
        Ok(Fetched { body, max_age })
    }
}

/// The `max-age` directive of a `Cache-Control` header value.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        let secs = value.trim().trim_matches('"').parse::<u64>().ok()?;
        (secs > 0).then(|| Duration::from_secs(secs))
    })
}

/// Entity states of `entity_type` inside `region` modified during `[from, to)`.
pub fn temporal_query(
    source: &str,
    entity_type: &str,
    region: &Region,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<String, ServerError> {
    Ok(format!(
        "{}&timerel=between&time={}&endTime={}&timeproperty=modifiedAt&options=sysAttrs",
        area_query(source, entity_type, region)?,
        format_instant(from),
        format_instant(to),
    ))
}

/// The `last_n` most recent values per attribute before `now`.
pub fn latest_query(
    source: &str,
    entity_type: &str,
    region: &Region,
    now: DateTime<Utc>,
    last_n: usize,
) -> Result<String, ServerError> {
    Ok(format!(
        "{}&timerel=before&time={}&lastN={last_n}",
        area_query(source, entity_type, region)?,
        format_instant(now),
    ))
}

fn area_query(source: &str, entity_type: &str, region: &Region) -> Result<String, ServerError> {
    let coordinates = serde_json::to_string(&region.to_geojson_ring())
        .map_err(tessella::TessellaError::from)?;
    Ok(format!(
        "{}/temporal/entities?type={}&georel=within&geometry=Polygon&coordinates={}",
        source.trim_end_matches('/'),
        urlencoding::encode(entity_type),
        urlencoding::encode(&coordinates),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella::Location;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_max_age("Max-Age=5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=0"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
    }

    #[test]
    fn test_queries() {
        let region = Region::from_corners(&[
            Location::new(0.0, 0.0),
            Location::new(0.0, 1.0),
            Location::new(1.0, 1.0),
            Location::new(1.0, 0.0),
        ]);
        let from = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2024-01-01T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let uri =
            temporal_query("http://broker/", "AirQualityObserved", &region, from, to).unwrap();
        let ring = "[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,1.0],[0.0,0.0]]]";
        let coordinates = urlencoding::encode(ring);
        assert_eq!(
            uri,
            format!(
                "http://broker/temporal/entities?type=AirQualityObserved&georel=within\
                 &geometry=Polygon&coordinates={coordinates}&timerel=between\
                 &time=2024-01-01T00:00:00.000Z&endTime=2024-01-01T01:00:00.000Z\
                 &timeproperty=modifiedAt&options=sysAttrs"
            )
        );

        let uri = latest_query("http://broker", "AirQualityObserved", &region, to, 5).unwrap();
        assert!(uri.ends_with("&timerel=before&time=2024-01-01T01:00:00.000Z&lastN=5"));
    }
}
