//! Web-Mercator ("slippy map") tiles addressed as `/{z}/{x}/{y}`.

use super::templates::{self, Mapping};
use super::{GeoFragmenter, TileRequest, TileScheme, wrong_request};
use crate::compute::validation::parse_segment;
use crate::error::{Result, TessellaError};
use serde_json::{Map, Value, json};
use std::f64::consts::PI;
use tessella_types::geo::{Location, PrecisionRange, Region};

const CELL: [Mapping; 3] = [
    Mapping::required("z", "tiles:zoom"),
    Mapping::required("x", "tiles:longitudeTile"),
    Mapping::required("y", "tiles:latitudeTile"),
];

/// Longitude of the western edge of tile column `x`.
pub fn tile_to_lon(x: f64, zoom: u8) -> f64 {
    x / 2f64.powi(zoom as i32) * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row `y`.
pub fn tile_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI - 2.0 * PI * y / 2f64.powi(zoom as i32);
    (0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

/// Tile column containing `lon`.
pub fn lon_to_tile(lon: f64, zoom: u8) -> u32 {
    let n = 2f64.powi(zoom as i32);
    clamp_tile(((lon + 180.0) / 360.0 * n).floor(), zoom)
}

/// Tile row containing `lat`, through the inverse Mercator projection.
pub fn lat_to_tile(lat: f64, zoom: u8) -> u32 {
    let n = 2f64.powi(zoom as i32);
    let phi = lat.to_radians();
    let y = (1.0 - (phi.tan() + 1.0 / phi.cos()).ln() / PI) / 2.0 * n;
    clamp_tile(y.floor(), zoom)
}

/// Points beyond the antimeridian or the Mercator latitude limit belong to
/// the outermost tile.
fn clamp_tile(tile: f64, zoom: u8) -> u32 {
    let max = 2f64.powi(zoom as i32) - 1.0;
    if tile.is_nan() {
        return 0;
    }
    tile.clamp(0.0, max) as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlippyFragmenter;

impl SlippyFragmenter {
    /// Centre of the tile: the midpoint of its NW and SE corners.
    pub fn center_of_tile(x: u32, y: u32, zoom: u8) -> Location {
        let (x, y) = (x as f64, y as f64);
        let lat1 = tile_to_lat(y, zoom);
        let lat2 = tile_to_lat(y + 1.0, zoom);
        let lon1 = tile_to_lon(x, zoom);
        let lon2 = tile_to_lon(x + 1.0, zoom);
        Location::new((lat1 + lat2) / 2.0, (lon1 + lon2) / 2.0)
    }

    fn tile_of(focus: &Location, zoom: u8) -> (u32, u32) {
        (
            lon_to_tile(focus.longitude(), zoom),
            lat_to_tile(focus.latitude(), zoom),
        )
    }
}

impl GeoFragmenter for SlippyFragmenter {
    fn scheme(&self) -> TileScheme {
        TileScheme::Slippy
    }

    fn precision(&self, request: &TileRequest) -> Result<u8> {
        match request {
            TileRequest::Slippy { zoom, .. } => parse_segment("zoom", zoom),
            other => Err(wrong_request(self.scheme(), other)),
        }
    }

    fn precision_range(&self) -> PrecisionRange {
        PrecisionRange::new(13, 14) // 10.5 km2 down to 3.2 km2
    }

    fn focus_point(&self, request: &TileRequest) -> Result<Location> {
        let TileRequest::Slippy { x, y, .. } = request else {
            return Err(wrong_request(self.scheme(), request));
        };
        let zoom = self.precision(request)?;
        let x: u32 = parse_segment("x", x)?;
        let y: u32 = parse_segment("y", y)?;

        let tiles = 1u64 << zoom.min(63);
        if x as u64 >= tiles || y as u64 >= tiles {
            return Err(TessellaError::InvalidTile(format!(
                "tile ({x}, {y}) does not exist at zoom {zoom}"
            )));
        }

        Ok(Self::center_of_tile(x, y, zoom))
    }

    fn bounding_region(&self, focus: &Location, precision: u8) -> Result<Region> {
        let (x, y) = Self::tile_of(focus, precision);
        let (x, y) = (x as f64, y as f64);

        let north = tile_to_lat(y, precision);
        let south = tile_to_lat(y + 1.0, precision);
        let west = tile_to_lon(x, precision);
        let east = tile_to_lon(x + 1.0, precision);

        Ok(Region::from_corners(&[
            Location::new(south, west),
            Location::new(south, east),
            Location::new(north, east),
            Location::new(north, west),
        ]))
    }

    fn fragment_path(&self, focus: &Location, precision: u8) -> Result<String> {
        let (x, y) = Self::tile_of(focus, precision);
        Ok(format!("/{precision}/{x}/{y}"))
    }

    fn metadata(&self, focus: &Location, precision: u8) -> Result<Map<String, Value>> {
        let (x, y) = Self::tile_of(focus, precision);
        let mut meta = Map::new();
        meta.insert("tiles:zoom".into(), json!(precision));
        meta.insert("tiles:longitudeTile".into(), json!(x));
        meta.insert("tiles:latitudeTile".into(), json!(y));
        Ok(meta)
    }

    fn data_search_template(&self, base: &str) -> Value {
        templates::data_template(base, "/{z}/{x}/{y}", &CELL)
    }

    fn summary_search_template(&self, base: &str) -> Value {
        templates::summary_template(base, "/{z}/{x}/{y}", &CELL)
    }

    fn latest_search_template(&self, base: &str) -> Value {
        templates::latest_template(base, "/{z}/{x}/{y}", &CELL)
    }
}
