//! Extends an image by a fixed border on each side, needed so a resampling
//! kernel has a full footprint at the source image's edges.
//!
//! Border pixels are synthesised from the no-data value, never by mirroring
//! or replicating the edge row/column.

use crate::raster::{ImageSource, Raster};
use anyhow::{Result, bail};

pub struct ExtendedImage<S: ImageSource> {
	source: S,
	left: usize,
	top: usize,
	right: usize,
	bottom: usize,
	width: usize,
	height: usize,
}

impl<S: ImageSource> ExtendedImage<S> {
	/// # Errors
	/// Returns an error if the source has zero width or height.
	pub fn new(source: S, left: usize, top: usize, right: usize, bottom: usize) -> Result<Self> {
		if source.width() == 0 || source.height() == 0 {
			bail!("cannot pad an empty image");
		}
		let width = source.width() + left + right;
		let height = source.height() + top + bottom;
		Ok(Self { source, left, top, right, bottom, width, height })
	}
}

impl<S: ImageSource> ImageSource for ExtendedImage<S> {
	fn width(&self) -> usize {
		self.width
	}

	fn height(&self) -> usize {
		self.height
	}

	fn channels(&self) -> u8 {
		self.source.channels()
	}

	fn nodata(&self) -> &[f32] {
		self.source.nodata()
	}

	fn get_line(&mut self, y: usize) -> Result<Vec<f32>> {
		if y >= self.height {
			bail!("row {y} is out of range for a {}-row extended image", self.height);
		}
		let channels = self.channels() as usize;
		let nodata = self.source.nodata().to_vec();

		if y < self.top || y >= self.top + self.source.height() {
			return Ok(Raster::new_nodata(self.width, 1, channels as u8, nodata).row(0).to_vec());
		}

		let source_line = self.source.get_line(y - self.top)?;
		let mut out = Vec::with_capacity(self.width * channels);
		for _ in 0..self.left {
			out.extend_from_slice(&nodata);
		}
		out.extend_from_slice(&source_line);
		for _ in 0..self.right {
			out.extend_from_slice(&nodata);
		}
		Ok(out)
	}
}
