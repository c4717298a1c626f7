//! CRS, bounding box, tile matrix set and pyramid data model.
//!
//! This crate carries no tile storage or pixel-decoding logic of its own; it
//! describes the geometry a pyramid is built on so that `rok4_storage` and
//! `rok4_image` can agree on what a level, a tile matrix and a bounding box
//! mean.

mod bbox;
mod crs;
mod pyramid;
mod tile_matrix;

pub use bbox::{BoundingBox, GeoBoundingBox};
pub use crs::{CoordinateTransformer, Crs};
pub use pyramid::{Level, LevelStorage, Pyramid, SampleFormat};
pub use tile_matrix::{TileMatrix, TileMatrixSet};
