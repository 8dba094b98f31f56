//! # tessella-types
//!
//! Core value types shared by the Tessella fragmentation engine and server.
//!
//! - **Geometry**: [`Location`](geo::Location), [`Region`](geo::Region),
//!   [`PrecisionRange`](geo::PrecisionRange)
//! - **Observations**: [`Observation`](observation::Observation)
//! - **Aggregation**: [`Bucket`](aggregation::Bucket),
//!   [`Aggregation`](aggregation::Aggregation),
//!   [`AggregationPeriod`](aggregation::AggregationPeriod)
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use tessella_types::geo::{Location, PrecisionRange};
//!
//! let antwerp = Location::new(51.2194, 4.4025);
//! assert_eq!(antwerp.to_lon_lat(), [4.4025, 51.2194]);
//!
//! let zoom = PrecisionRange::new(13, 14);
//! assert!(zoom.contains(14));
//! ```

pub mod aggregation;
pub mod geo;
pub mod observation;
