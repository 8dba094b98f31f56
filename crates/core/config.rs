//! Service configuration.
//!
//! The layout follows the sections of the service's TOML file:
//!
//! ```toml
//! [ngsi]
//! host = "http://localhost:3000"
//!
//! [api]
//! host = "http://localhost:3001"
//! last_n = 5
//!
//! [data]
//! metrics = ["NO2", "O3", "PM10", "PM1", "PM25"]
//! ```
use serde::de::Error;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Upstream temporal entity source
    #[serde(default)]
    pub ngsi: NgsiConfig,

    /// Outbound API settings
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NgsiConfig {
    /// Base URI of the NGSI-LD broker
    #[serde(default = "NgsiConfig::default_host")]
    pub host: String,
}

impl NgsiConfig {
    fn default_host() -> String {
        "http://localhost:3000".to_string()
    }
}

impl Default for NgsiConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Public base URI used to mint fragment identifiers
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,

    /// Number of most recent values per attribute in the latest view
    #[serde(default = "ApiConfig::default_last_n")]
    pub last_n: usize,

    /// Simplify NGSI-LD entities to their keyValues form
    #[serde(default)]
    pub key_values: bool,

    /// Turn raw entities into versioned event-stream members
    #[serde(default)]
    pub version_members: bool,

    /// Where the summary view reads raw fragments from; defaults to `host`
    #[serde(default)]
    pub summary_source: Option<String>,
}

impl ApiConfig {
    fn default_host() -> String {
        "http://localhost:3001".to_string()
    }

    const fn default_last_n() -> usize {
        5
    }

    /// Base URI of the raw fragments the summary view aggregates.
    pub fn summary_source(&self) -> &str {
        self.summary_source.as_deref().unwrap_or(&self.host)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            last_n: Self::default_last_n(),
            key_values: false,
            version_members: false,
            summary_source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Observed properties extracted for aggregation
    #[serde(default = "DataConfig::default_metrics")]
    pub metrics: Vec<String>,
}

impl DataConfig {
    fn default_metrics() -> Vec<String> {
        ["NO2", "O3", "PM10", "PM1", "PM25"]
            .iter()
            .map(|m| m.to_string())
            .collect()
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            metrics: Self::default_metrics(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Per-request timeout for upstream calls
    #[serde(default = "UpstreamConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    const fn default_timeout_secs() -> u64 {
        10
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn with_source(mut self, host: impl Into<String>) -> Self {
        self.ngsi.host = host.into();
        self
    }

    pub fn with_target(mut self, host: impl Into<String>) -> Self {
        self.api.host = host.into();
        self
    }

    pub fn with_last_n(mut self, last_n: usize) -> Self {
        assert!(last_n > 0, "lastN must be greater than zero");
        self.api.last_n = last_n;
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.upstream.timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ngsi.host.trim().is_empty() {
            return Err("ngsi.host must not be empty".to_string());
        }

        if self.api.host.trim().is_empty() {
            return Err("api.host must not be empty".to_string());
        }

        if self.api.last_n == 0 {
            return Err("api.last_n must be greater than zero".to_string());
        }

        if self.data.metrics.is_empty() {
            log::warn!("No metrics configured, summaries will be empty");
        }

        if self.upstream.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ngsi: NgsiConfig::default(),
            api: ApiConfig::default(),
            data: DataConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.last_n, 5);
        assert_eq!(config.data.metrics.len(), 5);
        assert_eq!(config.api.summary_source(), "http://localhost:3001");
    }

    #[test]
    fn test_json_roundtrip_with_partial_sections() {
        let config = Config::from_json(r#"{"api": {"host": "https://tiles.example.org"}}"#)
            .unwrap();
        assert_eq!(config.api.host, "https://tiles.example.org");
        assert_eq!(config.ngsi.host, "http://localhost:3000");

        let back = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{"api": {"hostname": "x"}}"#).is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::from_json(r#"{"api": {"last_n": 0}}"#).is_err());
        assert!(Config::from_json(r#"{"upstream": {"timeout_secs": 0}}"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_sections() {
        let config = Config::from_toml(
            r#"
            [ngsi]
            host = "http://broker:9090"

            [api]
            host = "http://tiles:3001"
            last_n = 3

            [data]
            metrics = ["NO2"]
            "#,
        )
        .unwrap();
        assert_eq!(config.ngsi.host, "http://broker:9090");
        assert_eq!(config.api.last_n, 3);
        assert_eq!(config.data.metrics, vec!["NO2".to_string()]);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default()
            .with_metrics(["NO2", "PM25"])
            .with_timeout_secs(3);
        let back = Config::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.upstream.timeout(), std::time::Duration::from_secs(3));
    }

    #[test]
    fn test_empty_metrics_are_allowed() {
        let config = Config::default().with_metrics(Vec::<String>::new());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[should_panic(expected = "lastN must be greater than zero")]
    fn test_with_last_n_zero_panics() {
        let _ = Config::default().with_last_n(0);
    }
}
