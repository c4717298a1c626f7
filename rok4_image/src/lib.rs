//! Pull-based, lazily-evaluated scanline image pipeline for rok4 raster
//! pyramids: tile decoding, mosaicking, border padding, resampling,
//! reprojection, styling and final encoding.
//!
//! Every stage implements [`raster::ImageSource`], carrying samples as `f32`
//! regardless of the on-disk sample format. A typical WMS request chains:
//!
//! `TileSource -> MosaicImage -> ExtendedImage -> ResampledImage ->
//! ReprojectedImage -> StyledImage -> Encoder`

pub mod aligned;
pub mod codec;
pub mod color;
pub mod extended;
pub mod format;
pub mod grid;
pub mod kernel;
pub mod mosaic;
pub mod pipeline;
pub mod raster;
pub mod reprojected;
pub mod resampled;
pub mod style;
pub mod styled;
pub mod tile_source;

pub mod encoder;

pub use extended::ExtendedImage;
pub use mosaic::MosaicImage;
pub use raster::{ImageSource, Raster};
pub use reprojected::ReprojectedImage;
pub use resampled::ResampledImage;
pub use styled::StyledImage;
pub use tile_source::{SlabShape, TileFormat, read_tile};
