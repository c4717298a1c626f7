//! Splices adjacent pyramid tiles into one virtual source-CRS image over an
//! arbitrary pixel window.

use crate::raster::{ImageSource, Raster};
use crate::tile_source::{SlabShape, TileFormat, read_tile};
use anyhow::{Result, bail};
use futures::future::try_join_all;
use rok4_geometry::{Level, TileMatrix};

/// A pixel window `[x0, x0+width) x [y0, y0+height)` spliced from the tile
/// grid covering it. `x0`/`y0` may be negative or extend past the matrix
/// extent; tiles outside `[0, matrix_width) x [0, matrix_height)` are
/// no-data, matching [`crate::tile_source::read_tile`]'s own out-of-range handling.
pub struct MosaicImage {
	x0: i64,
	y0: i64,
	width: usize,
	height: usize,
	channels: u8,
	nodata: Vec<f32>,
	tile_width: i64,
	tile_height: i64,
	tc0: i64,
	tr0: i64,
	tiles_wide: usize,
	/// Row-major over `(tr0..=tr1) x (tc0..=tc1)`.
	tiles: Vec<Raster>,
}

impl MosaicImage {
	/// Fetches every tile the window covers concurrently, then assembles a
	/// synchronous producer over them.
	///
	/// # Errors
	/// Returns an error if `width`/`height` is zero, or an underlying tile
	/// fetch fails after its retry budget (see [`read_tile`]).
	pub async fn new(
		level: &Level,
		tile_matrix: &TileMatrix,
		slab_shape: SlabShape,
		format: TileFormat,
		x0: i64,
		y0: i64,
		width: usize,
		height: usize,
	) -> Result<Self> {
		if width == 0 || height == 0 {
			bail!("mosaic window must be non-empty, got {width}x{height}");
		}

		let tile_width = i64::from(tile_matrix.tile_width);
		let tile_height = i64::from(tile_matrix.tile_height);
		let channels = level.channels;
		let nodata = match &level.nodata {
			Some(values) => values.iter().map(|&v| v as f32).collect(),
			None => vec![0.0; channels as usize],
		};

		let tc0 = x0.div_euclid(tile_width);
		let tc1 = (x0 + width as i64 - 1).div_euclid(tile_width);
		let tr0 = y0.div_euclid(tile_height);
		let tr1 = (y0 + height as i64 - 1).div_euclid(tile_height);
		let tiles_wide = (tc1 - tc0 + 1) as usize;
		let tiles_high = (tr1 - tr0 + 1) as usize;

		let mut fetches = Vec::with_capacity(tiles_wide * tiles_high);
		for tr in tr0..=tr1 {
			for tc in tc0..=tc1 {
				let nodata = nodata.clone();
				fetches.push(async move {
					if tc < 0 || tr < 0 {
						Ok(Raster::new_nodata(tile_matrix.tile_width as usize, tile_matrix.tile_height as usize, channels, nodata))
					} else {
						read_tile(level, tile_matrix, slab_shape, format, tc as u64, tr as u64).await
					}
				});
			}
		}
		let tiles = try_join_all(fetches).await?;

		Ok(Self { x0, y0, width, height, channels, nodata, tile_width, tile_height, tc0, tr0, tiles_wide, tiles })
	}
}

impl ImageSource for MosaicImage {
	fn width(&self) -> usize {
		self.width
	}

	fn height(&self) -> usize {
		self.height
	}

	fn channels(&self) -> u8 {
		self.channels
	}

	fn nodata(&self) -> &[f32] {
		&self.nodata
	}

	fn get_line(&mut self, y: usize) -> Result<Vec<f32>> {
		if y >= self.height {
			bail!("row {y} is out of range for a {}-row mosaic", self.height);
		}
		let y_abs = self.y0 + y as i64;
		let tr = y_abs.div_euclid(self.tile_height);
		let local_y = y_abs.rem_euclid(self.tile_height) as usize;
		let tile_row = (tr - self.tr0) as usize;

		let mut out = Vec::with_capacity(self.width * self.channels as usize);
		for x in 0..self.width {
			let x_abs = self.x0 + x as i64;
			let tc = x_abs.div_euclid(self.tile_width);
			let local_x = x_abs.rem_euclid(self.tile_width) as usize;
			let tile_col = (tc - self.tc0) as usize;
			let tile = &self.tiles[tile_row * self.tiles_wide + tile_col];
			let row = tile.row(local_y);
			let start = local_x * self.channels as usize;
			out.extend_from_slice(&row[start..start + self.channels as usize]);
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use rok4_core::{Blob, ByteRange};
	use rok4_geometry::{LevelStorage, SampleFormat};
	use rok4_storage::{TILE_INDEX_OFFSET, TileIndex};
	use std::sync::Arc;

	#[derive(Debug)]
	struct SolidTileStorage {
		value: u8,
	}

	#[async_trait]
	impl LevelStorage for SolidTileStorage {
		async fn read(&self, _object: &str, offset: u64, length: u64) -> Result<Blob> {
			let slab_shape = SlabShape::default();
			let index_len = TileIndex::byte_len(slab_shape.width, slab_shape.height);
			if offset == TILE_INDEX_OFFSET {
				let mut index = TileIndex::new_empty(slab_shape.width, slab_shape.height);
				index.set(0, 0, ByteRange::new(0, 12)).unwrap();
				return Ok(index.to_blob().unwrap());
			}
			let _ = (offset, index_len);
			Ok(Blob::from(vec![self.value; length as usize]))
		}
		async fn write(&self, _object: &str, _offset: u64, _data: &Blob) -> Result<()> {
			Ok(())
		}
		async fn exists(&self, _object: &str) -> Result<bool> {
			Ok(true)
		}
		fn describe(&self) -> String {
			"solid".to_string()
		}
	}

	fn level(value: u8) -> Level {
		Level {
			tile_matrix_id: "0".to_string(),
			storage: Arc::new(SolidTileStorage { value }),
			format: SampleFormat::UInt8,
			channels: 3,
			nodata: None,
		}
	}

	fn matrix() -> TileMatrix {
		TileMatrix::new("0", 10.0, 0.0, 0.0, 2, 2, 4, 4).unwrap()
	}

	#[tokio::test]
	async fn window_within_one_tile_returns_its_pixels() {
		let mut mosaic = MosaicImage::new(&level(42), &matrix(), SlabShape::default(), TileFormat::Raw, 0, 0, 2, 2).await.unwrap();
		let line = mosaic.get_line(0).unwrap();
		assert_eq!(line, vec![42.0; 6]);
	}

	#[tokio::test]
	async fn window_spanning_two_tiles_concatenates_them() {
		let mut mosaic = MosaicImage::new(&level(7), &matrix(), SlabShape::default(), TileFormat::Raw, 1, 0, 3, 1).await.unwrap();
		let line = mosaic.get_line(0).unwrap();
		assert_eq!(line.len(), 9);
	}

	#[tokio::test]
	async fn negative_origin_yields_nodata_on_that_side() {
		let mut mosaic = MosaicImage::new(&level(9), &matrix(), SlabShape::default(), TileFormat::Raw, -2, 0, 4, 1).await.unwrap();
		let line = mosaic.get_line(0).unwrap();
		assert_eq!(&line[0..6], &[0.0; 6]);
	}
}
