//! Wrapped geometric types from the `geo` crate used to describe fragments.
//!
//! [`Location`] is a WGS84 point, [`Region`] the closed outline of a tile,
//! geohash cell or H3 hexagon, and [`PrecisionRange`] the granularity a tiling
//! scheme accepts.

use serde::{Deserialize, Serialize};

/// A point on the planet in WGS84 coordinates.
///
/// This wraps `geo::Point` with x = longitude and y = latitude.
///
/// # Examples
///
/// ```
/// use tessella_types::geo::Location;
///
/// let ghent = Location::new(51.0543, 3.7174);
/// assert_eq!(ghent.latitude(), 51.0543);
/// assert_eq!(ghent.longitude(), 3.7174);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    inner: geo::Point<f64>,
}

impl Location {
    /// Create a location from latitude and longitude in degrees.
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            inner: geo::Point::new(longitude, latitude),
        }
    }

    /// Latitude in degrees.
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.inner.y()
    }

    /// Longitude in degrees.
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.inner.x()
    }

    /// Access the inner `geo::Point`.
    #[inline]
    pub fn inner(&self) -> &geo::Point<f64> {
        &self.inner
    }

    /// Coordinates in GeoJSON order: `[longitude, latitude]`.
    #[inline]
    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude(), self.latitude()]
    }
}

impl From<geo::Point<f64>> for Location {
    fn from(point: geo::Point<f64>) -> Self {
        Self { inner: point }
    }
}

impl From<Location> for geo::Point<f64> {
    fn from(location: Location) -> Self {
        location.inner
    }
}

/// The outline of a fragment's area.
///
/// Tiles and geohash cells have four corners, H3 cells six (or more for
/// distorted cells). The ring is stored open; [`Region::to_geojson_ring`]
/// closes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    inner: geo::Polygon<f64>,
}

impl Region {
    /// Build a region from its corner locations, in drawing order.
    pub fn from_corners(corners: &[Location]) -> Self {
        let exterior: geo::LineString<f64> = corners
            .iter()
            .map(|c| geo::coord! { x: c.longitude(), y: c.latitude() })
            .collect();
        Self {
            inner: geo::Polygon::new(exterior, vec![]),
        }
    }

    /// The corners of the region without the closing point.
    pub fn corners(&self) -> Vec<Location> {
        let ring = &self.inner.exterior().0;
        let open = if ring.len() > 1 && ring.first() == ring.last() {
            &ring[..ring.len() - 1]
        } else {
            &ring[..]
        };
        open.iter().map(|c| Location::new(c.y, c.x)).collect()
    }

    /// Access the inner `geo::Polygon`.
    pub fn inner(&self) -> &geo::Polygon<f64> {
        &self.inner
    }

    /// The closed exterior ring as GeoJSON `Polygon` coordinates:
    /// `[[[lon, lat], ..., [lon0, lat0]]]`.
    pub fn to_geojson_ring(&self) -> Vec<Vec<[f64; 2]>> {
        let ring = self.inner.exterior().0.iter().map(|c| [c.x, c.y]).collect();
        vec![ring]
    }
}

/// The supported levels of granularity of a tiling scheme, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionRange {
    pub minimum: u8,
    pub maximum: u8,
}

impl PrecisionRange {
    pub const fn new(minimum: u8, maximum: u8) -> Self {
        Self { minimum, maximum }
    }

    #[inline]
    pub fn contains(&self, precision: u8) -> bool {
        (self.minimum..=self.maximum).contains(&precision)
    }

    /// Every precision in the range, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        self.minimum..=self.maximum
    }
}

impl std::fmt::Display for PrecisionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.minimum, self.maximum)
    }
}
