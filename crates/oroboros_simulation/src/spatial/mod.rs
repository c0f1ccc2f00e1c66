//! # Spatial Index
//!
//! Area-of-interest tracking for one region: which entities each entity can
//! currently see, and who is near a point.

mod aoi;
mod cell;

pub use aoi::{AoiDelta, SpatialIndex};
pub use cell::CellCoord;
