//! Changes resolution within a single CRS via separable kernel convolution.

use crate::kernel::Kernel;
use crate::raster::ImageSource;
use anyhow::{Result, bail};
use std::collections::HashMap;

pub struct ResampledImage<S: ImageSource> {
	source: S,
	channels: u8,
	nodata: Vec<f32>,
	width: usize,
	height: usize,
	/// Per target column: `(x_min, weights)`.
	x_weights: Vec<(usize, Vec<f64>)>,
	/// Per target row: `(y_min, weights)`.
	y_weights: Vec<(usize, Vec<f64>)>,
	/// Horizontally-resampled source rows, memoised by source row index.
	row_cache: HashMap<usize, Vec<f32>>,
}

fn weight_capacity(kernel: Kernel, ratio: f64) -> usize {
	let r_eff = if ratio > 1.0 && !kernel.const_ratio() { kernel.radius() * ratio } else { kernel.radius() };
	(2.0 * r_eff).ceil() as usize + 2
}

impl<S: ImageSource> ResampledImage<S> {
	/// `left`/`top` is the source-pixel coordinate of the target image's pixel
	/// `(0, 0)` origin *before* the half-pixel centring offset; `ratio_x`/`ratio_y`
	/// is `source_resolution / target_resolution` (see module docs in
	/// [`crate::kernel`] for how a ratio above 1 widens the kernel).
	///
	/// # Errors
	/// Returns an error if `width`/`height` is zero or a ratio is not positive finite.
	pub fn new(source: S, kernel: Kernel, left: f64, top: f64, ratio_x: f64, ratio_y: f64, width: usize, height: usize) -> Result<Self> {
		if width == 0 || height == 0 {
			bail!("resampled image must be non-empty, got {width}x{height}");
		}
		if !(ratio_x.is_finite() && ratio_x > 0.0 && ratio_y.is_finite() && ratio_y > 0.0) {
			bail!("resampling ratios must be positive and finite, got ({ratio_x}, {ratio_y})");
		}
		let src_width = source.width();
		let src_height = source.height();
		if src_width == 0 || src_height == 0 {
			bail!("cannot resample from an empty source");
		}
		let channels = source.channels();
		let nodata = source.nodata().to_vec();

		let x_capacity = weight_capacity(kernel, ratio_x);
		let x_weights = (0..width)
			.map(|x| {
				let center = left + 0.5 * ratio_x - 0.5 + x as f64 * ratio_x;
				kernel.weight(center, ratio_x, x_capacity, src_width)
			})
			.collect();

		let y_capacity = weight_capacity(kernel, ratio_y);
		let y_weights = (0..height)
			.map(|y| {
				let center = top + 0.5 * ratio_y - 0.5 + y as f64 * ratio_y;
				kernel.weight(center, ratio_y, y_capacity, src_height)
			})
			.collect();

		Ok(Self { source, channels, nodata, width, height, x_weights, y_weights, row_cache: HashMap::new() })
	}

	fn horizontal_row(&mut self, source_row: usize) -> Result<Vec<f32>> {
		if let Some(row) = self.row_cache.get(&source_row) {
			return Ok(row.clone());
		}
		let channels = self.channels as usize;
		let source_line = self.source.get_line(source_row)?;
		let mut out = vec![0.0f32; self.width * channels];
		for (x, (x_min, weights)) in self.x_weights.iter().enumerate() {
			for c in 0..channels {
				let mut acc = 0.0f64;
				for (k, &w) in weights.iter().enumerate() {
					acc += w * f64::from(source_line[(x_min + k) * channels + c]);
				}
				out[x * channels + c] = acc as f32;
			}
		}
		self.row_cache.insert(source_row, out.clone());
		Ok(out)
	}
}

impl<S: ImageSource> ImageSource for ResampledImage<S> {
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
			bail!("row {y} is out of range for a {}-row resampled image", self.height);
		}
		let channels = self.channels as usize;
		let (y_min, weights) = self.y_weights[y].clone();

		let mut rows = Vec::with_capacity(weights.len());
		for i in 0..weights.len() {
			rows.push(self.horizontal_row(y_min + i)?);
		}
		self.row_cache.retain(|&row, _| row >= y_min);

		let mut out = vec![0.0f32; self.width * channels];
		for (i, &w) in weights.iter().enumerate() {
			for (sample_out, &sample_in) in out.iter_mut().zip(rows[i].iter()) {
				*sample_out += w as f32 * sample_in;
			}
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::raster::Raster;

	fn ramp(width: usize, height: usize) -> Raster {
		let data: Vec<f32> = (0..width * height).map(|i| i as f32).collect();
		Raster::new(width, height, 1, vec![0.0], data).unwrap()
	}

	#[test]
	fn identity_ratio_reproduces_the_source() {
		let source = ramp(6, 6);
		let mut resampled = ResampledImage::new(source, Kernel::Linear, 0.0, 0.0, 1.0, 1.0, 6, 6).unwrap();
		for y in 0..6 {
			let expected: Vec<f32> = (y * 6..y * 6 + 6).map(|v| v as f32).collect();
			let line = resampled.get_line(y).unwrap();
			for (a, b) in line.iter().zip(expected.iter()) {
				assert!((a - b).abs() < 1e-3, "row {y}: {line:?} != {expected:?}");
			}
		}
	}

	#[test]
	fn downsampling_halves_dimensions() {
		let source = ramp(8, 8);
		let mut resampled = ResampledImage::new(source, Kernel::Cubic, 0.0, 0.0, 2.0, 2.0, 4, 4).unwrap();
		assert_eq!(resampled.get_line(0).unwrap().len(), 4);
		assert_eq!(resampled.height(), 4);
	}

	#[test]
	fn rejects_empty_target() {
		let source = ramp(4, 4);
		assert!(ResampledImage::new(source, Kernel::Nearest, 0.0, 0.0, 1.0, 1.0, 0, 4).is_err());
	}
}
