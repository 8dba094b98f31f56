//! Geospatial fragmentation.
//!
//! A tiling scheme partitions the planet into addressable cells. Each scheme
//! implements [`GeoFragmenter`]: it reads the precision and focus point from a
//! [`TileRequest`], describes the cell's outline, and names it. Fragment
//! identities are canonical: whatever point inside a cell a request started
//! from, the cell's focus point re-encodes to the same path.
//!
//! Only three schemes exist, so they are a closed set dispatched through
//! [`Fragmenter`].

mod geohash;
mod h3;
mod slippy;
pub(crate) mod templates;

pub use self::geohash::GeohashFragmenter;
pub use self::h3::H3Fragmenter;
pub use self::slippy::{SlippyFragmenter, lat_to_tile, lon_to_tile, tile_to_lat, tile_to_lon};

use crate::compute::time::format_instant;
use crate::compute::validation::{validate_location, validate_precision};
use crate::error::{Result, TessellaError};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tessella_types::aggregation::AggregationPeriod;
use tessella_types::geo::{Location, PrecisionRange, Region};

/// Supported tiling schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileScheme {
    Slippy,
    Geohash,
    H3,
}

impl std::fmt::Display for TileScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slippy => write!(f, "slippy"),
            Self::Geohash => write!(f, "geohash"),
            Self::H3 => write!(f, "h3"),
        }
    }
}

/// The cell a client addressed, as raw path segments.
///
/// Segments stay unparsed until a fragmenter reads them so that malformed
/// identifiers surface as validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileRequest {
    Slippy { zoom: String, x: String, y: String },
    Geohash { hash: String },
    H3 { index: String },
}

impl TileRequest {
    pub fn slippy(zoom: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self::Slippy {
            zoom: zoom.into(),
            x: x.into(),
            y: y.into(),
        }
    }

    pub fn geohash(hash: impl Into<String>) -> Self {
        Self::Geohash { hash: hash.into() }
    }

    pub fn h3(index: impl Into<String>) -> Self {
        Self::H3 {
            index: index.into(),
        }
    }

    pub fn scheme(&self) -> TileScheme {
        match self {
            Self::Slippy { .. } => TileScheme::Slippy,
            Self::Geohash { .. } => TileScheme::Geohash,
            Self::H3 { .. } => TileScheme::H3,
        }
    }
}

/// A validated cell: its focus point and precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub focus: Location,
    pub precision: u8,
}

/// Capabilities every tiling scheme provides.
pub trait GeoFragmenter {
    fn scheme(&self) -> TileScheme;

    /// Hierarchical level of the request: zoom level, hash length, resolution.
    fn precision(&self, request: &TileRequest) -> Result<u8>;

    /// Levels of granularity this scheme serves.
    fn precision_range(&self) -> PrecisionRange;

    /// Centre of the requested cell.
    fn focus_point(&self, request: &TileRequest) -> Result<Location>;

    /// Outline of the cell containing `focus`.
    fn bounding_region(&self, focus: &Location, precision: u8) -> Result<Region>;

    /// Scheme-specific part of the resource path, e.g. `/13/4096/2048`.
    fn fragment_path(&self, focus: &Location, precision: u8) -> Result<String>;

    /// Descriptive `tiles:*` fields of the cell.
    fn metadata(&self, focus: &Location, precision: u8) -> Result<Map<String, Value>>;

    fn data_search_template(&self, base: &str) -> Value;

    fn summary_search_template(&self, base: &str) -> Value;

    fn latest_search_template(&self, base: &str) -> Value;

    /// Validate a request and resolve it to a [`Cell`].
    ///
    /// The precision is checked first, so an unsupported level is rejected
    /// without interpreting the rest of the identifier.
    fn resolve(&self, request: &TileRequest) -> Result<Cell> {
        if request.scheme() != self.scheme() {
            return Err(wrong_request(self.scheme(), request));
        }
        let precision = self.precision(request)?;
        validate_precision(precision, self.precision_range())?;
        let focus = self.focus_point(request)?;
        validate_location(&focus)?;
        Ok(Cell { focus, precision })
    }

    /// Paginated raw data URI of the window starting at `time`.
    fn data_fragment_uri(
        &self,
        base: &str,
        focus: &Location,
        precision: u8,
        time: DateTime<Utc>,
        entity_type: Option<&str>,
    ) -> Result<String> {
        let path = self.fragment_path(focus, precision)?;
        let mut uri = format!("{base}{path}?page={}", format_instant(time));
        if let Some(t) = entity_type {
            uri.push_str("&type=");
            uri.push_str(&urlencoding::encode(t));
        }
        Ok(uri)
    }

    /// URI of the floating "latest" view.
    fn latest_fragment_uri(
        &self,
        base: &str,
        focus: &Location,
        precision: u8,
        entity_type: Option<&str>,
    ) -> Result<String> {
        let path = self.fragment_path(focus, precision)?;
        let mut uri = format!("{base}{path}/latest");
        if let Some(t) = entity_type {
            uri.push_str("?type=");
            uri.push_str(&urlencoding::encode(t));
        }
        Ok(uri)
    }

    /// Paginated summary URI. Periods are resources, so their IRI is encoded.
    fn summary_fragment_uri(
        &self,
        base: &str,
        focus: &Location,
        precision: u8,
        time: DateTime<Utc>,
        period: AggregationPeriod,
        entity_type: Option<&str>,
    ) -> Result<String> {
        let path = self.fragment_path(focus, precision)?;
        let mut uri = format!(
            "{base}{path}/summary?page={}&period={}",
            format_instant(time),
            urlencoding::encode(period.iri())
        );
        if let Some(t) = entity_type {
            uri.push_str("&type=");
            uri.push_str(&urlencoding::encode(t));
        }
        Ok(uri)
    }
}

/// Enum dispatch over the three supported schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragmenter {
    Slippy(SlippyFragmenter),
    Geohash(GeohashFragmenter),
    H3(H3Fragmenter),
}

impl Fragmenter {
    pub fn for_scheme(scheme: TileScheme) -> Self {
        match scheme {
            TileScheme::Slippy => Self::Slippy(SlippyFragmenter),
            TileScheme::Geohash => Self::Geohash(GeohashFragmenter),
            TileScheme::H3 => Self::H3(H3Fragmenter),
        }
    }

    pub fn for_request(request: &TileRequest) -> Self {
        Self::for_scheme(request.scheme())
    }
}

macro_rules! dispatch {
    ($self:ident, $f:ident => $call:expr) => {
        match $self {
            Fragmenter::Slippy($f) => $call,
            Fragmenter::Geohash($f) => $call,
            Fragmenter::H3($f) => $call,
        }
    };
}

impl GeoFragmenter for Fragmenter {
    fn scheme(&self) -> TileScheme {
        dispatch!(self, f => f.scheme())
    }

    fn precision(&self, request: &TileRequest) -> Result<u8> {
        dispatch!(self, f => f.precision(request))
    }

    fn precision_range(&self) -> PrecisionRange {
        dispatch!(self, f => f.precision_range())
    }

    fn focus_point(&self, request: &TileRequest) -> Result<Location> {
        dispatch!(self, f => f.focus_point(request))
    }

    fn bounding_region(&self, focus: &Location, precision: u8) -> Result<Region> {
        dispatch!(self, f => f.bounding_region(focus, precision))
    }

    fn fragment_path(&self, focus: &Location, precision: u8) -> Result<String> {
        dispatch!(self, f => f.fragment_path(focus, precision))
    }

    fn metadata(&self, focus: &Location, precision: u8) -> Result<Map<String, Value>> {
        dispatch!(self, f => f.metadata(focus, precision))
    }

    fn data_search_template(&self, base: &str) -> Value {
        dispatch!(self, f => f.data_search_template(base))
    }

    fn summary_search_template(&self, base: &str) -> Value {
        dispatch!(self, f => f.summary_search_template(base))
    }

    fn latest_search_template(&self, base: &str) -> Value {
        dispatch!(self, f => f.latest_search_template(base))
    }
}

fn wrong_request(scheme: TileScheme, request: &TileRequest) -> TessellaError {
    TessellaError::InvalidTile(format!(
        "{} fragmenter cannot serve a {} request",
        scheme,
        request.scheme()
    ))
}
