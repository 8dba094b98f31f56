//! Tiling schemes, time windows and request validation.

pub mod geo;
pub mod time;
pub mod validation;
