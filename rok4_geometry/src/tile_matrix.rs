//! `TileMatrix` and `TileMatrixSet`: the levels of resolution a pyramid is built on.

use crate::Crs;
use anyhow::{Result, bail, ensure};

/// One level of resolution in a tile matrix set.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
	pub id: String,
	/// Ground resolution, in CRS units per pixel.
	pub resolution: f64,
	/// Upper-left origin of the matrix, in CRS units.
	pub x0: f64,
	pub y0: f64,
	pub tile_width: u32,
	pub tile_height: u32,
	/// Matrix extent, in tiles.
	pub matrix_width: u64,
	pub matrix_height: u64,
}

impl TileMatrix {
	/// # Errors
	/// Returns an error if the tile size is zero or the matrix extent is empty.
	pub fn new(
		id: impl Into<String>,
		resolution: f64,
		x0: f64,
		y0: f64,
		tile_width: u32,
		tile_height: u32,
		matrix_width: u64,
		matrix_height: u64,
	) -> Result<Self> {
		ensure!(resolution > 0.0, "tile matrix resolution must be positive");
		ensure!(tile_width > 0 && tile_height > 0, "tile pixel size must be positive");
		ensure!(
			matrix_width >= 1 && matrix_height >= 1,
			"tile matrix extent must be at least 1x1"
		);
		Ok(Self {
			id: id.into(),
			resolution,
			x0,
			y0,
			tile_width,
			tile_height,
			matrix_width,
			matrix_height,
		})
	}

	/// Ground extent of a single tile, in CRS units.
	#[must_use]
	pub fn tile_span(&self) -> (f64, f64) {
		(
			self.resolution * f64::from(self.tile_width),
			self.resolution * f64::from(self.tile_height),
		)
	}
}

/// An ordered collection of [`TileMatrix`] levels sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrixSet {
	pub name: String,
	pub crs: Crs,
	levels: Vec<TileMatrix>,
}

impl TileMatrixSet {
	/// Builds a set from levels ordered from coarsest to finest resolution.
	///
	/// # Errors
	/// Returns an error if `levels` is empty, contains duplicate identifiers,
	/// or resolution does not strictly decrease from one level to the next.
	pub fn new(name: impl Into<String>, crs: Crs, levels: Vec<TileMatrix>) -> Result<Self> {
		ensure!(!levels.is_empty(), "tile matrix set must have at least one level");
		for pair in levels.windows(2) {
			if pair[1].resolution >= pair[0].resolution {
				bail!(
					"tile matrix resolution must strictly decrease: '{}' ({}) -> '{}' ({})",
					pair[0].id,
					pair[0].resolution,
					pair[1].id,
					pair[1].resolution
				);
			}
		}
		Ok(Self {
			name: name.into(),
			crs,
			levels,
		})
	}

	#[must_use]
	pub fn levels(&self) -> &[TileMatrix] {
		&self.levels
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<&TileMatrix> {
		self.levels.iter().find(|level| level.id == id)
	}

	/// The level whose resolution is closest to (but not coarser than)
	/// `target_resolution`.
	#[must_use]
	pub fn best_level_for_resolution(&self, target_resolution: f64) -> Option<&TileMatrix> {
		self
			.levels
			.iter()
			.filter(|level| level.resolution <= target_resolution)
			.min_by(|a, b| a.resolution.partial_cmp(&b.resolution).unwrap())
			.or_else(|| self.levels.last())
	}
}
