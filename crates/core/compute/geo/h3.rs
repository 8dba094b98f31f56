//! Uber H3 hexagons addressed as `/h3/{index}`.

use super::templates::{self, Mapping};
use super::{GeoFragmenter, TileRequest, TileScheme, wrong_request};
use crate::error::{Result, TessellaError};
use h3o::{CellIndex, LatLng, Resolution};
use serde_json::{Map, Value, json};
use tessella_types::geo::{Location, PrecisionRange, Region};

const CELL: [Mapping; 1] = [Mapping::required("index", "tiles:h3Index")];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct H3Fragmenter;

impl H3Fragmenter {
    /// Cell of the given resolution containing `focus`.
    pub fn cell_of(focus: &Location, precision: u8) -> Result<CellIndex> {
        let resolution = Resolution::try_from(precision)
            .map_err(|e| TessellaError::InvalidTile(format!("invalid H3 resolution: {e}")))?;
        let point = LatLng::new(focus.latitude(), focus.longitude())
            .map_err(|e| TessellaError::InvalidTile(format!("invalid coordinates: {e}")))?;
        Ok(point.to_cell(resolution))
    }

    fn index_of(request: &TileRequest) -> Result<CellIndex> {
        match request {
            TileRequest::H3 { index } => index
                .trim()
                .parse::<CellIndex>()
                .map_err(|e| {
                    TessellaError::InvalidTile(format!("invalid H3 index {index:?}: {e}"))
                }),
            other => Err(wrong_request(TileScheme::H3, other)),
        }
    }
}

impl GeoFragmenter for H3Fragmenter {
    fn scheme(&self) -> TileScheme {
        TileScheme::H3
    }

    fn precision(&self, request: &TileRequest) -> Result<u8> {
        Ok(u8::from(Self::index_of(request)?.resolution()))
    }

    fn precision_range(&self) -> PrecisionRange {
        PrecisionRange::new(6, 7) // 36 km2 down to 5 km2
    }

    fn focus_point(&self, request: &TileRequest) -> Result<Location> {
        let centroid = LatLng::from(Self::index_of(request)?);
        Ok(Location::new(centroid.lat(), centroid.lng()))
    }

    fn bounding_region(&self, focus: &Location, precision: u8) -> Result<Region> {
        let boundary = Self::cell_of(focus, precision)?.boundary();
        let corners: Vec<Location> = boundary
            .iter()
            .map(|vertex| Location::new(vertex.lat(), vertex.lng()))
            .collect();
        Ok(Region::from_corners(&corners))
    }

    fn fragment_path(&self, focus: &Location, precision: u8) -> Result<String> {
        Ok(format!("/h3/{}", Self::cell_of(focus, precision)?))
    }

    fn metadata(&self, focus: &Location, precision: u8) -> Result<Map<String, Value>> {
        let mut meta = Map::new();
        meta.insert(
            "tiles:h3Index".into(),
            json!(Self::cell_of(focus, precision)?.to_string()),
        );
        Ok(meta)
    }

    fn data_search_template(&self, base: &str) -> Value {
        templates::data_template(base, "/h3/{index}", &CELL)
    }

    fn summary_search_template(&self, base: &str) -> Value {
        templates::summary_template(base, "/h3/{index}", &CELL)
    }

    fn latest_search_template(&self, base: &str) -> Value {
        templates::latest_template(base, "/h3/{index}", &CELL)
    }
}
