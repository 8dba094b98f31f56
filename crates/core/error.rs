//! Error types for the fragmentation engine.

use tessella_types::geo::PrecisionRange;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TessellaError {
    /// Requested precision is not served by the tiling scheme
    #[error("Precision {precision} is outside the supported range {range}")]
    PrecisionOutOfRange { precision: u8, range: PrecisionRange },

    /// Tile identifier could not be interpreted
    #[error("Invalid tile identifier: {0}")]
    InvalidTile(String),

    /// Required query parameter is absent
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Upstream document does not have the expected shape
    #[error("Malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TessellaError {
    /// Whether the error rejects the request itself, before any upstream call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::PrecisionOutOfRange { .. } | Self::InvalidTile(_) | Self::MissingParameter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TessellaError>;
