//! `Pyramid`: a `TileMatrixSet` bound to per-level storage and sample format.

use crate::TileMatrixSet;
use anyhow::{Result, bail};
use async_trait::async_trait;
use rok4_core::Blob;
use std::sync::Arc;

/// Pixel sample format carried by every level of a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
	UInt8,
	Float32,
}

/// Reads and writes byte ranges of the objects that back one pyramid level:
/// a local directory tree, or an object store pool/bucket/container.
///
/// `object` is backend-relative (e.g. a ROK4 slab path or key). A handle is
/// acquired once at startup and shared across threads (`Arc<dyn
/// LevelStorage>`); implementations must tolerate concurrent calls from
/// multiple readers. Concrete backends (local file, Ceph RADOS via its S3
/// gateway, S3, Swift) live in `rok4_storage`, which depends on this crate
/// for the trait rather than the other way around, keeping the geometry
/// data model free of any particular storage client.
#[async_trait]
pub trait LevelStorage: std::fmt::Debug + Send + Sync {
	/// Reads `length` bytes starting at `offset` from `object`.
	///
	/// # Errors
	/// Returns an error if the object does not exist or the read fails.
	async fn read(&self, object: &str, offset: u64, length: u64) -> Result<Blob>;

	/// Writes `data` at `offset` into `object`, creating it if necessary.
	///
	/// # Errors
	/// Returns an error if the write fails.
	async fn write(&self, object: &str, offset: u64, data: &Blob) -> Result<()>;

	/// Whether `object` exists in this backend.
	///
	/// # Errors
	/// Returns an error if the existence check itself fails.
	async fn exists(&self, object: &str) -> Result<bool>;

	/// Human-readable description of where this level's tiles live, for logs
	/// and error messages.
	fn describe(&self) -> String;
}

/// One level of a [`Pyramid`]: a `TileMatrix` id, its storage, and the pixel
/// format of the tiles stored there.
pub struct Level {
	pub tile_matrix_id: String,
	pub storage: Arc<dyn LevelStorage>,
	pub format: SampleFormat,
	pub channels: u8,
	/// Per-channel no-data value, if the level declares one.
	pub nodata: Option<Vec<f64>>,
}

impl std::fmt::Debug for Level {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Level")
			.field("tile_matrix_id", &self.tile_matrix_id)
			.field("storage", &self.storage.describe())
			.field("format", &self.format)
			.field("channels", &self.channels)
			.field("nodata", &self.nodata)
			.finish()
	}
}

/// Binds a [`TileMatrixSet`] to the [`Level`]s that actually have data.
pub struct Pyramid {
	pub tile_matrix_set: Arc<TileMatrixSet>,
	levels: Vec<Level>,
}

impl Pyramid {
	/// # Errors
	/// Returns an error if a level references a `TileMatrix` id absent from
	/// `tile_matrix_set`, or if levels disagree on channel count or sample
	/// format.
	pub fn new(tile_matrix_set: Arc<TileMatrixSet>, levels: Vec<Level>) -> Result<Self> {
		for level in &levels {
			if tile_matrix_set.get(&level.tile_matrix_id).is_none() {
				bail!(
					"pyramid level references unknown tile matrix '{}' in set '{}'",
					level.tile_matrix_id,
					tile_matrix_set.name
				);
			}
		}
		if let Some(first) = levels.first() {
			for level in &levels[1..] {
				if level.channels != first.channels {
					bail!(
						"pyramid levels disagree on channel count: '{}' has {}, '{}' has {}",
						first.tile_matrix_id,
						first.channels,
						level.tile_matrix_id,
						level.channels
					);
				}
				if level.format != first.format {
					bail!(
						"pyramid levels disagree on sample format: '{}' is {:?}, '{}' is {:?}",
						first.tile_matrix_id,
						first.format,
						level.tile_matrix_id,
						level.format
					);
				}
			}
		}
		Ok(Self { tile_matrix_set, levels })
	}

	#[must_use]
	pub fn levels(&self) -> &[Level] {
		&self.levels
	}

	#[must_use]
	pub fn level(&self, tile_matrix_id: &str) -> Option<&Level> {
		self.levels.iter().find(|level| level.tile_matrix_id == tile_matrix_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Crs, TileMatrix};

	#[derive(Debug)]
	struct FakeStorage;
	#[async_trait]
	impl LevelStorage for FakeStorage {
		async fn read(&self, _object: &str, _offset: u64, _length: u64) -> Result<Blob> {
			Ok(Blob::new_empty())
		}

		async fn write(&self, _object: &str, _offset: u64, _data: &Blob) -> Result<()> {
			Ok(())
		}

		async fn exists(&self, _object: &str) -> Result<bool> {
			Ok(false)
		}

		fn describe(&self) -> String {
			"fake".to_string()
		}
	}

	fn tms() -> Arc<TileMatrixSet> {
		let levels = vec![
			TileMatrix::new("0", 10.0, 0.0, 0.0, 256, 256, 1, 1).unwrap(),
			TileMatrix::new("1", 5.0, 0.0, 0.0, 256, 256, 2, 2).unwrap(),
		];
		Arc::new(TileMatrixSet::new("test", Crs::new("EPSG:3857"), levels).unwrap())
	}

	fn level(tile_matrix_id: &str) -> Level {
		Level {
			tile_matrix_id: tile_matrix_id.to_string(),
			storage: Arc::new(FakeStorage),
			format: SampleFormat::UInt8,
			channels: 3,
			nodata: None,
		}
	}

	#[test]
	fn rejects_unknown_tile_matrix_id() {
		let result = Pyramid::new(tms(), vec![level("does-not-exist")]);
		assert!(result.is_err());
	}

	#[test]
	fn rejects_mismatched_channel_counts() {
		let mut bad = level("1");
		bad.channels = 4;
		let result = Pyramid::new(tms(), vec![level("0"), bad]);
		assert!(result.is_err());
	}

	#[test]
	fn accepts_consistent_levels() {
		let pyramid = Pyramid::new(tms(), vec![level("0"), level("1")]).unwrap();
		assert_eq!(pyramid.levels().len(), 2);
		assert!(pyramid.level("0").is_some());
		assert!(pyramid.level("2").is_none());
	}
}
