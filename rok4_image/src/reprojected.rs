//! Produces a target-CRS image by composing resampling semantics with a
//! warped source indexing derived from [`crate::grid::Grid`].

use crate::grid::Grid;
use crate::kernel::Kernel;
use crate::raster::ImageSource;
use anyhow::{Result, bail};

const TABLE_STEPS: usize = 1024;

pub struct ReprojectedImage<S: ImageSource> {
	channels: u8,
	nodata: Vec<f32>,
	width: usize,
	height: usize,
	grid: Grid,
	kernel: Kernel,
	/// `x_weight_table[bucket] = (x_offset, weights)`, indexed by `frac(source_x) * 1024`.
	x_weight_table: Vec<(i64, Vec<f64>)>,
	y_weight_table: Vec<(i64, Vec<f64>)>,
	/// The whole source raster, preloaded at init (see module docs).
	src_lines: Vec<Vec<f32>>,
	src_width: usize,
	src_height: usize,
}

impl<S: ImageSource> ReprojectedImage<S> {
	/// Preloads `source` in full and precomputes the 1024-bucket fractional
	/// weight tables used to resolve every target pixel's source footprint.
	///
	/// # Errors
	/// Returns an error if `source` is empty or reading any of its rows fails.
	pub fn new(mut source: S, grid: Grid, kernel: Kernel) -> Result<Self> {
		let src_width = source.width();
		let src_height = source.height();
		if src_width == 0 || src_height == 0 {
			bail!("cannot reproject an empty source");
		}
		let channels = source.channels();
		let nodata = source.nodata().to_vec();

		let mut src_lines = Vec::with_capacity(src_height);
		for y in 0..src_height {
			src_lines.push(source.get_line(y)?);
		}

		let x_weight_table = weight_table(kernel, src_width);
		let y_weight_table = weight_table(kernel, src_height);

		Ok(Self {
			channels,
			nodata,
			width: grid.width(),
			height: grid.height(),
			grid,
			kernel,
			x_weight_table,
			y_weight_table,
			src_lines,
			src_width,
			src_height,
		})
	}

	fn sample(&self, x: f64, y: f64) -> Vec<f32> {
		let channels = self.channels as usize;
		if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 || x >= self.src_width as f64 || y >= self.src_height as f64 {
			return self.nodata.clone();
		}

		let bucket_x = ((x.fract() * TABLE_STEPS as f64) as usize).min(TABLE_STEPS - 1);
		let bucket_y = ((y.fract() * TABLE_STEPS as f64) as usize).min(TABLE_STEPS - 1);
		let (x_off, wx) = &self.x_weight_table[bucket_x];
		let (y_off, wy) = &self.y_weight_table[bucket_y];

		let x_base = x as i64 + x_off;
		let y_base = y as i64 + y_off;

		let mut out = vec![0.0f64; channels];
		for (j, &wyv) in wy.iter().enumerate() {
			let sy = (y_base + j as i64).clamp(0, self.src_height as i64 - 1) as usize;
			let row = &self.src_lines[sy];
			for (i, &wxv) in wx.iter().enumerate() {
				let sx = (x_base + i as i64).clamp(0, self.src_width as i64 - 1) as usize;
				let weight = wxv * wyv;
				for c in 0..channels {
					out[c] += weight * f64::from(row[sx * channels + c]);
				}
			}
		}
		out.into_iter().map(|v| v as f32).collect()
	}
}

/// Builds the 1024-bucket table of `(x_offset, weights)` pairs for fractional
/// source positions `bucket / 1024`, sharing the base kernel across buckets
/// (this stage never up/downsamples, so `ratio` is always `1.0`).
fn weight_table(kernel: Kernel, max_index: usize) -> Vec<(i64, Vec<f64>)> {
	let capacity = (2.0 * kernel.radius()).ceil() as usize + 2;
	(0..TABLE_STEPS)
		.map(|bucket| {
			let frac = bucket as f64 / TABLE_STEPS as f64;
			let (x_first, weights) = kernel.weight(frac, 1.0, capacity, max_index.max(1));
			(x_first as i64, weights)
		})
		.collect()
}

impl<S: ImageSource> ImageSource for ReprojectedImage<S> {
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
			bail!("row {y} is out of range for a {}-row reprojected image", self.height);
		}
		let mut xs = vec![0.0; self.width];
		let mut ys = vec![0.0; self.width];
		self.grid.get_line(y, &mut xs, &mut ys);

		let mut out = Vec::with_capacity(self.width * self.channels as usize);
		for (&x, &yy) in xs.iter().zip(ys.iter()) {
			out.extend(self.sample(x, yy));
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::raster::Raster;
	use rok4_geometry::BoundingBox;

	fn ramp(width: usize, height: usize) -> Raster {
		let data: Vec<f32> = (0..width * height).map(|i| i as f32).collect();
		Raster::new(width, height, 1, vec![0.0], data).unwrap()
	}

	#[test]
	fn identity_grid_samples_near_the_source() {
		let source = ramp(16, 16);
		let bbox = BoundingBox::new(0.0, 0.0, 16.0, 16.0).unwrap();
		let grid = Grid::new(16, 16, 4, bbox).unwrap();
		let mut reprojected = ReprojectedImage::new(source, grid, Kernel::Linear).unwrap();
		let line = reprojected.get_line(8).unwrap();
		assert_eq!(line.len(), 16);
		for v in &line {
			assert!(*v >= 0.0 && *v < 256.0);
		}
	}

	#[test]
	fn rejects_an_empty_source() {
		let source = Raster::new(0, 0, 1, vec![0.0], vec![]).unwrap();
		let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
		let grid = Grid::new(1, 1, 1, bbox).unwrap();
		assert!(ReprojectedImage::new(source, grid, Kernel::Nearest).is_err());
	}
}
