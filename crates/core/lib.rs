//! Spatiotemporal fragmentation of sensor observations into linked-data pages.
//!
//! ## Features
//! - **Tiling schemes**: slippy map tiles, geohashes and H3 hexagons behind one
//!   [`GeoFragmenter`] contract
//! - **Time windows**: fixed-size, epoch-aligned pages via [`TimeFragmenter`]
//! - **Fragments**: `tree:Node` documents with navigation relations, hydra
//!   search templates and cache policies
//! - **Summaries**: bucketed sum, count, average, minimum, maximum and stddev
//!   per sensor, feature and property
//!
//! The engine does no I/O: callers fetch upstream data and pass the current
//! instant in explicitly.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use tessella::{FragmentBuilder, TileRequest, TimeFragmenter};
//!
//! let builder = FragmentBuilder::new("http://localhost:3001");
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//!
//! let fragment = builder.build_page(
//!     &TileRequest::slippy("13", "4096", "2048"),
//!     Some("2024-01-01T00:00:00Z"),
//!     json!([]),
//!     &TimeFragmenter::hourly(),
//!     None,
//!     now,
//! )?;
//!
//! assert_eq!(
//!     fragment.body["@id"],
//!     "http://localhost:3001/13/4096/2048?page=2024-01-01T00:00:00.000Z"
//! );
//! assert_eq!(fragment.cache.header_value(), "public, max-age=86400");
//! # Ok::<(), tessella::TessellaError>(())
//! ```

pub mod aggregate;
pub mod compute;
pub mod config;
pub mod error;
pub mod fragment;
pub mod ngsi;

pub use error::{Result, TessellaError};

pub use config::Config;

pub use compute::geo::{
    Cell, Fragmenter, GeoFragmenter, GeohashFragmenter, H3Fragmenter, SlippyFragmenter,
    TileRequest, TileScheme,
};
pub use compute::time::{TimeFragmenter, TimeWindow, format_instant, parse_instant};

pub use aggregate::{SourceData, SummaryPlan};
pub use fragment::{CachePolicy, Fragment, FragmentBuilder};

pub use tessella_types::aggregation::{AggregateFunction, Aggregation, AggregationPeriod, Bucket};
pub use tessella_types::geo::{Location, PrecisionRange, Region};
pub use tessella_types::observation::Observation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
