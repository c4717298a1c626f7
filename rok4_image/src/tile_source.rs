//! Decodes one pyramid tile into a [`Raster`], the bottom of the producer pipeline.
//!
//! Tiles are grouped into slab objects of `slab_width x slab_height` tiles
//! each (16x16 by default). Each slab holds, from
//! [`rok4_storage::TILE_INDEX_OFFSET`], a [`TileIndex`] over its own local
//! grid, followed by the tile bodies themselves. A missing tile (absent
//! from its slab's index, or a column/row outside the matrix) yields a
//! no-data tile rather than an error: the mosaic stage above relies on this
//! to paper over pyramid holes.

use crate::codec::Codec;
use crate::raster::Raster;
use anyhow::Result;
use rok4_core::Blob;
use rok4_geometry::{Level, SampleFormat, TileMatrix};
use rok4_storage::{TILE_INDEX_OFFSET, TileIndex};
use std::time::Duration;

/// The on-disk tile codec, spanning both the raw-plane codecs in
/// [`crate::codec`] and the pixel-container formats in [`crate::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
	Raw,
	Lzw,
	PackBits,
	Zip,
	Jpeg,
	Png,
}

/// How many tiles each storage object groups together, default `16x16`
/// per the conventional ROK4 slab layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabShape {
	pub width: u32,
	pub height: u32,
}

impl Default for SlabShape {
	fn default() -> Self {
		Self { width: 16, height: 16 }
	}
}

const MAX_ATTEMPTS: u32 = 2;

/// Reads tile `(col, row)` of `level` (whose geometry is described by
/// `tile_matrix`), stored with `format`.
///
/// Out-of-range coordinates and tiles absent from the index both yield a
/// no-data tile. A transient storage failure is retried once with a jittered
/// backoff before propagating; a tile that exists but fails to decode is
/// replaced with a white tile and logged rather than aborting the caller.
///
/// # Errors
/// Returns an error only if storage reads keep failing after the retry budget
/// is exhausted.
pub async fn read_tile(level: &Level, tile_matrix: &TileMatrix, slab_shape: SlabShape, format: TileFormat, col: u64, row: u64) -> Result<Raster> {
	let width = tile_matrix.tile_width as usize;
	let height = tile_matrix.tile_height as usize;
	let channels = level.channels;
	let nodata = nodata_vec(level);

	if col >= tile_matrix.matrix_width || row >= tile_matrix.matrix_height {
		return Ok(Raster::new_nodata(width, height, channels, nodata));
	}

	let Some(bytes) = fetch_tile_bytes(level, slab_shape, col, row).await? else {
		return Ok(Raster::new_nodata(width, height, channels, nodata));
	};

	match decode_tile(format, level.format, &bytes, width, height, channels) {
		Ok(raster) => Ok(raster),
		Err(err) => {
			log::warn!(
				"tile ({col}, {row}) of level '{}' ({}) failed to decode: {err:#}; substituting a white tile",
				level.tile_matrix_id,
				level.storage.describe()
			);
			Ok(Raster::new_nodata(width, height, channels, vec![255.0; channels as usize]))
		}
	}
}

fn nodata_vec(level: &Level) -> Vec<f32> {
	match &level.nodata {
		Some(values) => values.iter().map(|&v| v as f32).collect(),
		None => vec![0.0; level.channels as usize],
	}
}

/// The slab path holding tile `(col, row)`: `<tile_matrix_id>/<slab_col>_<slab_row>.data`.
fn slab_object(level: &Level, slab_shape: SlabShape, col: u64, row: u64) -> (String, u32, u32) {
	let slab_col = col / u64::from(slab_shape.width);
	let slab_row = row / u64::from(slab_shape.height);
	let local_col = (col % u64::from(slab_shape.width)) as u32;
	let local_row = (row % u64::from(slab_shape.height)) as u32;
	(format!("{}/{slab_col}_{slab_row}.data", level.tile_matrix_id), local_col, local_row)
}

/// Fetches the raw, still-encoded bytes of a tile, or `None` if it is absent
/// from its slab's index. Retries transient read failures (index or body)
/// with a jittered backoff derived from the tile's address, since no RNG
/// dependency is otherwise needed in this crate.
async fn fetch_tile_bytes(level: &Level, slab_shape: SlabShape, col: u64, row: u64) -> Result<Option<Blob>> {
	let (object, local_col, local_row) = slab_object(level, slab_shape, col, row);
	let index_len = TileIndex::byte_len(slab_shape.width, slab_shape.height);

	let mut attempt = 0;
	let index_blob = loop {
		attempt += 1;
		match level.storage.read(&object, TILE_INDEX_OFFSET, index_len).await {
			Ok(blob) => break blob,
			Err(err) if attempt < MAX_ATTEMPTS => {
				log::warn!("reading tile index of '{object}' failed (attempt {attempt}): {err:#}; retrying");
				backoff(&object, col, row, attempt).await;
			}
			Err(err) => return Err(err),
		}
	};

	let index = TileIndex::from_blob(slab_shape.width, slab_shape.height, &index_blob)?;
	let Some(range) = index.get(local_col, local_row) else {
		return Ok(None);
	};

	let body_offset = TILE_INDEX_OFFSET + index_len + range.offset;
	attempt = 0;
	loop {
		attempt += 1;
		match level.storage.read(&object, body_offset, range.length).await {
			Ok(blob) => return Ok(Some(blob)),
			Err(err) if attempt < MAX_ATTEMPTS => {
				log::warn!("reading tile ({col}, {row}) body of '{object}' failed (attempt {attempt}): {err:#}; retrying");
				backoff(&object, col, row, attempt).await;
			}
			Err(err) => return Err(err),
		}
	}
}

async fn backoff(object: &str, col: u64, row: u64, attempt: u32) {
	use std::collections::hash_map::DefaultHasher;
	use std::hash::{Hash, Hasher};
	let mut hasher = DefaultHasher::new();
	(object, col, row, attempt).hash(&mut hasher);
	let jitter_ms = hasher.finish() % 250;
	let backoff_ms = 100u64 * u64::from(attempt) + jitter_ms;
	tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
}

fn decode_tile(format: TileFormat, sample_format: SampleFormat, bytes: &Blob, width: usize, height: usize, channels: u8) -> Result<Raster> {
	match format {
		TileFormat::Jpeg => crate::format::jpeg::decode(bytes),
		TileFormat::Png => crate::format::png::decode(bytes),
		TileFormat::Raw | TileFormat::Lzw | TileFormat::PackBits | TileFormat::Zip => {
			let codec = match format {
				TileFormat::Raw => Codec::Raw,
				TileFormat::Lzw => Codec::Lzw,
				TileFormat::PackBits => Codec::PackBits,
				TileFormat::Zip => Codec::Zip,
				TileFormat::Jpeg | TileFormat::Png => unreachable!(),
			};
			let bytes_per_sample = match sample_format {
				SampleFormat::UInt8 => 1,
				SampleFormat::Float32 => 4,
			};
			let expected_len = width * height * channels as usize * bytes_per_sample;
			let raw = codec.decode(bytes, expected_len)?;
			match sample_format {
				SampleFormat::UInt8 => Ok(Raster::from_u8(width, height, channels, vec![0.0; channels as usize], &raw)),
				SampleFormat::Float32 => decode_float32(&raw, width, height, channels),
			}
		}
	}
}

fn decode_float32(raw: &[u8], width: usize, height: usize, channels: u8) -> Result<Raster> {
	use byteorder::{LittleEndian, ReadBytesExt};
	let mut cursor = std::io::Cursor::new(raw);
	let count = width * height * channels as usize;
	let mut data = Vec::with_capacity(count);
	for _ in 0..count {
		data.push(cursor.read_f32::<LittleEndian>()?);
	}
	Raster::new(width, height, channels, vec![0.0; channels as usize], data)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::Arc;

	#[derive(Debug)]
	struct EmptyStorage;
	#[async_trait]
	impl rok4_geometry::LevelStorage for EmptyStorage {
		async fn read(&self, _object: &str, _offset: u64, length: u64) -> Result<Blob> {
			Ok(Blob::new_sized(length as usize))
		}
		async fn write(&self, _object: &str, _offset: u64, _data: &Blob) -> Result<()> {
			Ok(())
		}
		async fn exists(&self, _object: &str) -> Result<bool> {
			Ok(false)
		}
		fn describe(&self) -> String {
			"empty".to_string()
		}
	}

	fn level() -> Level {
		Level {
			tile_matrix_id: "0".to_string(),
			storage: Arc::new(EmptyStorage),
			format: SampleFormat::UInt8,
			channels: 3,
			nodata: Some(vec![1.0, 2.0, 3.0]),
		}
	}

	fn matrix() -> TileMatrix {
		TileMatrix::new("0", 10.0, 0.0, 0.0, 4, 4, 2, 2).unwrap()
	}

	#[tokio::test]
	async fn out_of_range_tile_is_nodata() {
		let raster = read_tile(&level(), &matrix(), SlabShape::default(), TileFormat::Raw, 99, 99).await.unwrap();
		assert_eq!(raster.data()[0..3], [1.0, 2.0, 3.0]);
	}

	#[tokio::test]
	async fn missing_tile_in_empty_index_is_nodata() {
		let raster = read_tile(&level(), &matrix(), SlabShape::default(), TileFormat::Raw, 0, 0).await.unwrap();
		assert_eq!(raster.data()[0..3], [1.0, 2.0, 3.0]);
	}
}
