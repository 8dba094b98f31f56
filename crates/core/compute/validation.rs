//! Validation for tile requests and geographic coordinates.

use crate::error::{Result, TessellaError};
use tessella_types::geo::{Location, PrecisionRange};

/// Rejects precisions the tiling scheme does not serve.
///
/// # Examples
///
/// ```
/// use tessella::compute::validation::validate_precision;
/// use tessella_types::geo::PrecisionRange;
///
/// let zoom = PrecisionRange::new(13, 14);
/// assert!(validate_precision(13, zoom).is_ok());
/// assert!(validate_precision(20, zoom).is_err());
/// ```
pub fn validate_precision(precision: u8, range: PrecisionRange) -> Result<()> {
    if !range.contains(precision) {
        return Err(TessellaError::PrecisionOutOfRange { precision, range });
    }
    Ok(())
}

/// Validates a location has finite, in-range latitude and longitude.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use tessella::compute::validation::validate_location;
/// use tessella_types::geo::Location;
///
/// assert!(validate_location(&Location::new(51.05, 3.72)).is_ok());
/// assert!(validate_location(&Location::new(95.0, 3.72)).is_err());
/// ```
pub fn validate_location(location: &Location) -> Result<()> {
    let (lat, lon) = (location.latitude(), location.longitude());

    if !lat.is_finite() || !lon.is_finite() {
        return Err(TessellaError::InvalidTile(format!(
            "Coordinates must be finite, got: ({}, {})",
            lat, lon
        )));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(TessellaError::InvalidTile(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(TessellaError::InvalidTile(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }

    Ok(())
}

/// Parses a numeric path segment, reporting which segment was wrong.
pub fn parse_segment<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        TessellaError::InvalidTile(format!("{} is not a valid number: {:?}", name, raw))
    })
}
