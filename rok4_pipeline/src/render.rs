//! Assembles and drains the scanline pipeline answering one WMS `GetMap` /
//! WMTS `GetTile` request against a pyramid:
//!
//! `MosaicImage -> [ResampledImage | ReprojectedImage] -> StyledImage -> Encoder`
//!
//! Same-CRS requests take the cheaper separable path (`ResampledImage`);
//! cross-CRS requests go through `ReprojectedImage`, which performs both the
//! warp and the resampling in one pass. In both cases the mosaic window is
//! fetched with a margin of real tile data (or `MosaicImage`'s own no-data
//! tiles past the matrix edge) on every side, which is the kernel's
//! footprint, so no separate edge-padding stage is needed.

use crate::error::{ErrorCode, ServiceError};
use crate::request::{GetMapRequest, GetTileRequest};
use anyhow::{Context, Result, anyhow};
use rok4_core::Blob;
use rok4_geometry::{CoordinateTransformer, Crs, Pyramid};
use rok4_image::codec::Codec;
use rok4_image::encoder::Encoder;
use rok4_image::format::tiff;
use rok4_image::grid::Grid;
use rok4_image::kernel::Kernel;
use rok4_image::mosaic::MosaicImage;
use rok4_image::reprojected::ReprojectedImage;
use rok4_image::resampled::ResampledImage;
use rok4_image::style::Style;
use rok4_image::styled::StyledImage;
use rok4_image::tile_source::{SlabShape, TileFormat, read_tile};
use rok4_image::ImageSource;

/// What a registered layer serves its pyramid in.
pub struct LayerSource {
	pub pyramid: Pyramid,
	pub slab_shape: SlabShape,
	pub tile_format: TileFormat,
}

fn output_format(format: &str) -> Result<Encoder, ServiceError> {
	let base = format.split(';').next().unwrap_or(format).trim();
	match base {
		"image/png" => Ok(Encoder::Png { speed: None }),
		"image/jpeg" | "image/jpg" => Ok(Encoder::Jpeg { quality: None }),
		"image/tiff" | "image/geotiff" => Ok(Encoder::Tiff {
			codec: Codec::Raw,
			layout: tiff::Layout::Striped { rows_per_strip: 256 },
			sample_kind: tiff::SampleKindArg::UInt8,
		}),
		"image/x-bil" | "image/x-bil;bits=32" => Ok(Encoder::Bil { xllcorner: 0.0, yllcorner: 0.0, cellsize: 1.0 }),
		_ => Err(ServiceError::new(ErrorCode::InvalidFormat, format!("unsupported FORMAT '{format}'")).with_locator("FORMAT")),
	}
}

/// Chooses the best pyramid level for a requested resolution, in the
/// pyramid's own CRS (callers resolve reprojection separately).
fn choose_level<'a>(layer: &'a LayerSource, target_resolution: f64) -> Result<(&'a rok4_geometry::TileMatrix, &'a rok4_geometry::Level), ServiceError> {
	let tile_matrix = layer
		.pyramid
		.tile_matrix_set
		.best_level_for_resolution(target_resolution)
		.ok_or_else(|| ServiceError::new(ErrorCode::NoApplicableCode, "pyramid has no tile matrix levels"))?;
	let level = layer
		.pyramid
		.level(&tile_matrix.id)
		.ok_or_else(|| ServiceError::new(ErrorCode::NoApplicableCode, format!("no pyramid level for tile matrix '{}'", tile_matrix.id)))?;
	Ok((tile_matrix, level))
}

/// Renders a WMTS/TMS `GetTile` request: decodes the one stored tile
/// addressed by `TILEMATRIX`/`TILEROW`/`TILECOL` and re-encodes it in the
/// requested output format.
///
/// # Errors
/// Returns `TileOutOfRange` (not `NoApplicableCode`) when the row/column
/// falls outside the matrix extent, so WMTS callers can map it to its own
/// 404 response rather than the general 500 fallback.
pub async fn render_get_tile(layer: &LayerSource, req: &GetTileRequest) -> Result<Blob, ServiceError> {
	let encoder = output_format(&req.format)?;
	let tile_matrix = layer
		.pyramid
		.tile_matrix_set
		.get(&req.tile_matrix)
		.ok_or_else(|| ServiceError::new(ErrorCode::InvalidParameter, format!("unknown TILEMATRIX '{}'", req.tile_matrix)).with_locator("TILEMATRIX"))?;
	let level = layer
		.pyramid
		.level(&tile_matrix.id)
		.ok_or_else(|| ServiceError::new(ErrorCode::NoApplicableCode, format!("no pyramid level for tile matrix '{}'", tile_matrix.id)))?;

	if req.tile_col >= tile_matrix.matrix_width || req.tile_row >= tile_matrix.matrix_height {
		return Err(ServiceError::new(
			ErrorCode::TileOutOfRange,
			format!("tile ({}, {}) is outside matrix extent {}x{}", req.tile_col, req.tile_row, tile_matrix.matrix_width, tile_matrix.matrix_height),
		)
		.with_locator("TILEROW,TILECOL"));
	}

	let mut raster = read_tile(level, tile_matrix, layer.slab_shape, layer.tile_format, req.tile_col, req.tile_row)
		.await
		.map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))?;

	encoder.encode(&mut raster).map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))
}

/// Builds the scanline producer for a `GetMap` request, through styling if
/// a style is given, without draining it into an encoded image. Shared by
/// [`render_get_map`] and [`get_feature_info`], which only need a handful of
/// lines of the same pipeline rather than the whole encoded output.
async fn build_get_map_image(layer: &LayerSource, req: &GetMapRequest, style: Option<Style>) -> Result<Box<dyn ImageSource>, ServiceError> {
	let request_crs = Crs::new(req.crs.clone());
	if !request_crs.proj4_compatible() {
		return Err(ServiceError::new(ErrorCode::InvalidCRS, format!("CRS '{}' is not a recognised authority:code", req.crs)).with_locator("CRS"));
	}
	let source_crs = layer.pyramid.tile_matrix_set.crs.clone();
	let kernel = Kernel::Cubic;

	let mut image: Box<dyn ImageSource> = if request_crs == source_crs {
		render_same_crs(layer, req, kernel).await
	} else {
		render_cross_crs(layer, req, &source_crs, &request_crs, kernel).await
	}
	.map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))?;

	if let Some(style) = style {
		let styled = StyledImage::new(RewrapBox(image), style).map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))?;
		image = Box::new(styled);
	}
	Ok(image)
}

/// Renders a `GetMap` request into an encoded image.
///
/// # Errors
/// Returns a [`ServiceError`] for malformed CRS, unsupported output formats,
/// or a pyramid mismatch; any other failure (storage I/O, decode errors) is
/// reported as `NoApplicableCode`.
pub async fn render_get_map(layer: &LayerSource, req: &GetMapRequest, style: Option<Style>) -> Result<Blob, ServiceError> {
	let encoder = output_format(&req.format)?;
	let mut image = build_get_map_image(layer, req, style).await?;
	encoder.encode(image.as_mut()).map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))
}

/// Answers a `GetFeatureInfo` request: renders the same window as `GetMap`
/// but returns the pixel value at `(i, j)` instead of an encoded image.
///
/// # Errors
/// Returns the same `ServiceError` conditions as [`render_get_map`].
pub async fn get_feature_info(layer: &LayerSource, req: &crate::request::GetFeatureInfoRequest, style: Option<Style>) -> Result<Vec<f32>, ServiceError> {
	let mut image = build_get_map_image(layer, &req.map, style).await?;
	let line = image.get_line(req.j as usize).map_err(|err| ServiceError::new(ErrorCode::NoApplicableCode, format!("{err:#}")))?;
	let channels = image.channels() as usize;
	let start = req.i as usize * channels;
	Ok(line[start..start + channels].to_vec())
}

/// `Box<dyn ImageSource>` is itself `ImageSource` through this thin wrapper,
/// letting stages built for a generic `S: ImageSource` accept the boxed
/// trait object produced by the CRS branch above.
struct RewrapBox(Box<dyn ImageSource>);

impl ImageSource for RewrapBox {
	fn width(&self) -> usize {
		self.0.width()
	}
	fn height(&self) -> usize {
		self.0.height()
	}
	fn channels(&self) -> u8 {
		self.0.channels()
	}
	fn nodata(&self) -> &[f32] {
		self.0.nodata()
	}
	fn get_line(&mut self, y: usize) -> Result<Vec<f32>> {
		self.0.get_line(y)
	}
}

async fn render_same_crs(layer: &LayerSource, req: &GetMapRequest, kernel: Kernel) -> Result<Box<dyn ImageSource>> {
	let target_res = (req.bbox.width() / f64::from(req.width)).min(req.bbox.height() / f64::from(req.height));
	let (tile_matrix, level) = choose_level(layer, target_res).map_err(|err| anyhow!("{err}"))?;

	let res = tile_matrix.resolution;
	let margin = (kernel.radius().ceil() as i64) + 2;

	let col0 = ((req.bbox.xmin - tile_matrix.x0) / res).floor() as i64 - margin;
	let col1 = ((req.bbox.xmax - tile_matrix.x0) / res).ceil() as i64 + margin;
	let row0 = ((tile_matrix.y0 - req.bbox.ymax) / res).floor() as i64 - margin;
	let row1 = ((tile_matrix.y0 - req.bbox.ymin) / res).ceil() as i64 + margin;
	let window_width = (col1 - col0).max(1) as usize;
	let window_height = (row1 - row0).max(1) as usize;

	// The window already carries `margin` pixels of real tile data (or
	// MosaicImage's own no-data tiles past the matrix edge) on every side,
	// which is the kernel's footprint, so ResampledImage reads straight off
	// it without an ExtendedImage padding stage.
	let mosaic = MosaicImage::new(level, tile_matrix, layer.slab_shape, layer.tile_format, col0, row0, window_width, window_height)
		.await
		.context("assembling mosaic window")?;

	let ratio_x = res / (req.bbox.width() / f64::from(req.width));
	let ratio_y = res / (req.bbox.height() / f64::from(req.height));
	let left = (req.bbox.xmin - tile_matrix.x0) / res - col0 as f64;
	let top = (tile_matrix.y0 - req.bbox.ymax) / res - row0 as f64;

	let resampled = ResampledImage::new(mosaic, kernel, left, top, ratio_x, ratio_y, req.width as usize, req.height as usize).context("resampling to requested resolution")?;
	Ok(Box::new(resampled))
}

async fn render_cross_crs(layer: &LayerSource, req: &GetMapRequest, source_crs: &Crs, request_crs: &Crs, kernel: Kernel) -> Result<Box<dyn ImageSource>> {
	let step = 16.max((req.width.min(req.height) / 32) as usize).max(1);
	let mut grid = Grid::new(req.width as usize, req.height as usize, step, req.bbox)?;

	let transformer = CoordinateTransformer::new(request_crs, source_crs)?;
	grid.reproject(&transformer, request_crs, source_crs)?;
	let source_bbox = grid.bbox();

	let target_res = (source_bbox.width() / f64::from(req.width)).min(source_bbox.height() / f64::from(req.height));
	let (tile_matrix, level) = choose_level(layer, target_res).map_err(|err| anyhow!("{err}"))?;
	let res = tile_matrix.resolution;
	let margin = (kernel.radius().ceil() as i64) + 2;

	let col0 = ((source_bbox.xmin - tile_matrix.x0) / res).floor() as i64 - margin;
	let col1 = ((source_bbox.xmax - tile_matrix.x0) / res).ceil() as i64 + margin;
	let row0 = ((tile_matrix.y0 - source_bbox.ymax) / res).floor() as i64 - margin;
	let row1 = ((tile_matrix.y0 - source_bbox.ymin) / res).ceil() as i64 + margin;
	let window_width = (col1 - col0).max(1) as usize;
	let window_height = (row1 - row0).max(1) as usize;

	let mosaic = MosaicImage::new(level, tile_matrix, layer.slab_shape, layer.tile_format, col0, row0, window_width, window_height)
		.await
		.context("assembling mosaic window for reprojection")?;

	// Converts the grid's geographic (source-CRS) nodes into pixel
	// coordinates local to the mosaic window just fetched.
	grid.affine_transform(1.0 / res, -tile_matrix.x0 / res - col0 as f64, -1.0 / res, tile_matrix.y0 / res - row0 as f64);

	let reprojected = ReprojectedImage::new(mosaic, grid, kernel).context("reprojecting mosaic window")?;
	Ok(Box::new(reprojected))
}
