//! The common pixel buffer and scanline-producer contract every pipeline
//! stage (tile source, mosaic, padding, resampler, reprojector, style) reads
//! from and produces.

use anyhow::{Result, bail};

/// A pull-based scanline producer.
///
/// Samples are carried as `f32` through the whole pipeline regardless of the
/// on-disk sample format (`u8` or `f32`): this keeps the resampling and
/// reprojection math in one code path instead of duplicating it per pixel
/// format, at the cost of widening 8-bit samples during the float stages.
/// Encoders narrow back down to the output format's native width.
pub trait ImageSource: Send {
	fn width(&self) -> usize;
	fn height(&self) -> usize;
	fn channels(&self) -> u8;

	/// Per-channel no-data value, used by stages that synthesise missing
	/// pixels (border padding, out-of-range tiles).
	fn nodata(&self) -> &[f32];

	/// Returns exactly `width() * channels()` samples for row `y`.
	///
	/// # Errors
	/// Returns an error if `y` is out of range or an upstream read fails.
	fn get_line(&mut self, y: usize) -> Result<Vec<f32>>;
}

/// An in-memory raster: owns its pixels and answers `get_line` by slicing them.
#[derive(Debug, Clone)]
pub struct Raster {
	width: usize,
	height: usize,
	channels: u8,
	nodata: Vec<f32>,
	/// Row-major samples, `width * channels` per row.
	data: Vec<f32>,
}

impl Raster {
	/// # Errors
	/// Returns an error if `data.len() != width * height * channels` or
	/// `nodata.len() != channels`.
	pub fn new(width: usize, height: usize, channels: u8, nodata: Vec<f32>, data: Vec<f32>) -> Result<Self> {
		let expected = width * height * channels as usize;
		if data.len() != expected {
			bail!("raster {width}x{height}x{channels} expects {expected} samples, got {}", data.len());
		}
		if nodata.len() != channels as usize {
			bail!("raster has {channels} channels but {} no-data values", nodata.len());
		}
		Ok(Self { width, height, channels, nodata, data })
	}

	/// A raster filled entirely with its no-data value.
	#[must_use]
	pub fn new_nodata(width: usize, height: usize, channels: u8, nodata: Vec<f32>) -> Self {
		let mut data = Vec::with_capacity(width * height * channels as usize);
		for _ in 0..width * height {
			data.extend_from_slice(&nodata);
		}
		Self { width, height, channels, nodata, data }
	}

	/// A raster filled with `0.0` in every channel (used for border padding,
	/// which the data model synthesises as zero rather than a declared
	/// no-data value when the level carries none).
	#[must_use]
	pub fn new_empty(width: usize, height: usize, channels: u8) -> Self {
		Self { width, height, channels, nodata: vec![0.0; channels as usize], data: vec![0.0; width * height * channels as usize] }
	}

	#[must_use]
	pub fn row(&self, y: usize) -> &[f32] {
		let stride = self.width * self.channels as usize;
		&self.data[y * stride..(y + 1) * stride]
	}

	pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
		let stride = self.width * self.channels as usize;
		&mut self.data[y * stride..(y + 1) * stride]
	}

	/// Builds a raster of 8-bit samples (as stored on disk) by widening each
	/// byte to `f32`.
	#[must_use]
	pub fn from_u8(width: usize, height: usize, channels: u8, nodata: Vec<f32>, bytes: &[u8]) -> Self {
		let data = bytes.iter().map(|&b| f32::from(b)).collect();
		Self { width, height, channels, nodata, data }
	}

	/// Narrows samples back to bytes, rounding to nearest and clamping to `[0, 255]`.
	#[must_use]
	pub fn to_u8(&self) -> Vec<u8> {
		self.data.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect()
	}

	#[must_use]
	pub fn data(&self) -> &[f32] {
		&self.data
	}
}

impl ImageSource for Raster {
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
			bail!("row {y} is out of range for a {}-row raster", self.height);
		}
		Ok(self.row(y).to_vec())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_mismatched_sample_count() {
		let result = Raster::new(2, 2, 3, vec![0.0; 3], vec![0.0; 10]);
		assert!(result.is_err());
	}

	#[test]
	fn get_line_returns_width_times_channels_samples() {
		let mut raster = Raster::new(2, 3, 2, vec![0.0; 2], (0..12).map(|v| v as f32).collect()).unwrap();
		let line = raster.get_line(1).unwrap();
		assert_eq!(line, vec![4.0, 5.0, 6.0, 7.0]);
	}

	#[test]
	fn to_u8_rounds_and_clamps() {
		let raster = Raster::new(1, 1, 3, vec![0.0; 3], vec![-1.0, 254.6, 300.0]).unwrap();
		assert_eq!(raster.to_u8(), vec![0, 255, 255]);
	}
}
