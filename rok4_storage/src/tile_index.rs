//! The tile index every pyramid level storage object carries at a fixed
//! offset: two parallel little-endian `u32` arrays (tile offsets, then tile
//! lengths) over the level's `tiles_per_width x tiles_per_height` grid.
//!
//! Laid out the way the ROK4 slab format is read in practice: a combined
//! read of the whole index in one request, followed by one read of a single
//! tile body once its offset and length are known. The split-offsets/
//! split-lengths layout follows the format directly; the big-endian
//! `(offset, length)`-pair-per-entry layout used by container index formats
//! elsewhere in this workspace does not apply here.

use anyhow::{Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rok4_core::{Blob, ByteRange};
use std::io::Cursor;

/// Conventional byte offset of the tile index from the start of a storage object.
pub const TILE_INDEX_OFFSET: u64 = 2048;

/// A sentinel offset/length meaning "no tile stored at this grid cell".
const EMPTY: u32 = 0;

/// The tile offset/length table for one pyramid level's storage object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileIndex {
	tiles_per_width: u32,
	tiles_per_height: u32,
	offsets: Vec<u32>,
	lengths: Vec<u32>,
}

impl TileIndex {
	/// Byte size of the encoded index for a grid of this shape.
	#[must_use]
	pub fn byte_len(tiles_per_width: u32, tiles_per_height: u32) -> u64 {
		u64::from(tiles_per_width) * u64::from(tiles_per_height) * 8
	}

	/// Creates an empty index (every tile absent) for a `tiles_per_width x
	/// tiles_per_height` grid.
	#[must_use]
	pub fn new_empty(tiles_per_width: u32, tiles_per_height: u32) -> Self {
		let count = (tiles_per_width * tiles_per_height) as usize;
		Self {
			tiles_per_width,
			tiles_per_height,
			offsets: vec![EMPTY; count],
			lengths: vec![EMPTY; count],
		}
	}

	/// Parses an index out of the raw bytes read from [`TILE_INDEX_OFFSET`].
	///
	/// # Errors
	/// Returns an error if `blob` is shorter than the expected size for this
	/// grid shape.
	pub fn from_blob(tiles_per_width: u32, tiles_per_height: u32, blob: &Blob) -> Result<Self> {
		let count = (tiles_per_width * tiles_per_height) as usize;
		let expected = Self::byte_len(tiles_per_width, tiles_per_height);
		ensure!(
			blob.len() >= expected,
			"tile index for a {tiles_per_width}x{tiles_per_height} grid needs {expected} bytes, got {}",
			blob.len()
		);

		let mut cursor = Cursor::new(blob.as_slice());
		let mut offsets = Vec::with_capacity(count);
		for _ in 0..count {
			offsets.push(cursor.read_u32::<LittleEndian>()?);
		}
		let mut lengths = Vec::with_capacity(count);
		for _ in 0..count {
			lengths.push(cursor.read_u32::<LittleEndian>()?);
		}

		Ok(Self { tiles_per_width, tiles_per_height, offsets, lengths })
	}

	/// Encodes the index back to its on-storage byte layout.
	///
	/// # Errors
	/// Returns an error if writing to the in-memory buffer fails.
	pub fn to_blob(&self) -> Result<Blob> {
		let mut buf = Vec::with_capacity(usize::try_from(Self::byte_len(self.tiles_per_width, self.tiles_per_height))?);
		for offset in &self.offsets {
			buf.write_u32::<LittleEndian>(*offset)?;
		}
		for length in &self.lengths {
			buf.write_u32::<LittleEndian>(*length)?;
		}
		Ok(Blob::from(buf))
	}

	fn index_of(&self, col: u32, row: u32) -> Option<usize> {
		if col >= self.tiles_per_width || row >= self.tiles_per_height {
			return None;
		}
		Some((row * self.tiles_per_width + col) as usize)
	}

	/// Sets the stored byte range for tile `(col, row)`, relative to the
	/// start of the tile body section (after the index and any header).
	///
	/// # Errors
	/// Returns an error if `(col, row)` is outside the grid, or if `range`
	/// does not fit in the index's 32-bit offset/length fields.
	pub fn set(&mut self, col: u32, row: u32, range: ByteRange) -> Result<()> {
		let Some(index) = self.index_of(col, row) else {
			bail!("tile ({col}, {row}) is outside the {}x{} grid", self.tiles_per_width, self.tiles_per_height);
		};
		self.offsets[index] = u32::try_from(range.offset).map_err(|_| anyhow::anyhow!("tile offset {} exceeds u32", range.offset))?;
		self.lengths[index] = u32::try_from(range.length).map_err(|_| anyhow::anyhow!("tile length {} exceeds u32", range.length))?;
		Ok(())
	}

	/// The stored byte range for tile `(col, row)`, or `None` if the tile is
	/// absent (out of grid bounds, or present but unwritten).
	#[must_use]
	pub fn get(&self, col: u32, row: u32) -> Option<ByteRange> {
		let index = self.index_of(col, row)?;
		let (offset, length) = (self.offsets[index], self.lengths[index]);
		if length == EMPTY {
			return None;
		}
		Some(ByteRange::new(u64::from(offset), u64::from(length)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_bytes() {
		let mut index = TileIndex::new_empty(4, 3);
		index.set(1, 1, ByteRange::new(2048 + 512, 4096)).unwrap();
		index.set(3, 2, ByteRange::new(2048, 256)).unwrap();

		let blob = index.to_blob().unwrap();
		assert_eq!(blob.len(), TileIndex::byte_len(4, 3));

		let decoded = TileIndex::from_blob(4, 3, &blob).unwrap();
		assert_eq!(decoded, index);
		assert_eq!(decoded.get(1, 1), Some(ByteRange::new(2048 + 512, 4096)));
		assert_eq!(decoded.get(0, 0), None);
	}

	#[test]
	fn out_of_bounds_set_errors() {
		let mut index = TileIndex::new_empty(2, 2);
		assert!(index.set(5, 5, ByteRange::new(10, 10)).is_err());
		assert_eq!(index.get(5, 5), None);
	}

	#[test]
	fn rejects_short_buffer() {
		let blob = Blob::new_empty();
		assert!(TileIndex::from_blob(4, 4, &blob).is_err());
	}
}
