//! Base-32 geohash cells addressed as `/geohash/{hash}`.

use super::templates::{self, Mapping};
use super::{GeoFragmenter, TileRequest, TileScheme, wrong_request};
use crate::error::{Result, TessellaError};
use geo::Rect;
use serde_json::{Map, Value, json};
use tessella_types::geo::{Location, PrecisionRange, Region};

const CELL: [Mapping; 1] = [Mapping::required("hash", "tiles:geohash")];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeohashFragmenter;

impl GeohashFragmenter {
    pub fn encode(focus: &Location, precision: u8) -> Result<String> {
        let coord = geohash::Coord {
            x: focus.longitude(),
            y: focus.latitude(),
        };
        geohash::encode(coord, precision as usize)
            .map_err(|e| TessellaError::InvalidTile(format!("cannot encode geohash: {e}")))
    }

    pub fn decode_bbox(hash: &str) -> Result<Rect<f64>> {
        geohash::decode_bbox(hash)
            .map_err(|e| TessellaError::InvalidTile(format!("invalid geohash {hash:?}: {e}")))
    }

    fn hash_of(request: &TileRequest) -> Result<&str> {
        match request {
            TileRequest::Geohash { hash } => Ok(hash.trim()),
            other => Err(wrong_request(TileScheme::Geohash, other)),
        }
    }
}

impl GeoFragmenter for GeohashFragmenter {
    fn scheme(&self) -> TileScheme {
        TileScheme::Geohash
    }

    fn precision(&self, request: &TileRequest) -> Result<u8> {
        let hash = Self::hash_of(request)?;
        u8::try_from(hash.chars().count())
            .map_err(|_| TessellaError::InvalidTile(format!("geohash too long: {hash:?}")))
    }

    fn precision_range(&self) -> PrecisionRange {
        PrecisionRange::new(5, 6) // ~20 km2 down to ~1 km2
    }

    fn focus_point(&self, request: &TileRequest) -> Result<Location> {
        let rect = Self::decode_bbox(Self::hash_of(request)?)?;
        let center = rect.center();
        Ok(Location::new(center.y, center.x))
    }

    fn bounding_region(&self, focus: &Location, precision: u8) -> Result<Region> {
        let rect = Self::decode_bbox(&Self::encode(focus, precision)?)?;
        let (min, max) = (rect.min(), rect.max());

        Ok(Region::from_corners(&[
            Location::new(min.y, min.x),
            Location::new(min.y, max.x),
            Location::new(max.y, max.x),
            Location::new(max.y, min.x),
        ]))
    }

    fn fragment_path(&self, focus: &Location, precision: u8) -> Result<String> {
        Ok(format!("/geohash/{}", Self::encode(focus, precision)?))
    }

    fn metadata(&self, focus: &Location, precision: u8) -> Result<Map<String, Value>> {
        let mut meta = Map::new();
        meta.insert(
            "tiles:geohash".into(),
            json!(Self::encode(focus, precision)?),
        );
        Ok(meta)
    }

    fn data_search_template(&self, base: &str) -> Value {
        templates::data_template(base, "/geohash/{hash}", &CELL)
    }

    fn summary_search_template(&self, base: &str) -> Value {
        templates::summary_template(base, "/geohash/{hash}", &CELL)
    }

    fn latest_search_template(&self, base: &str) -> Value {
        templates::latest_template(base, "/geohash/{hash}", &CELL)
    }
}
