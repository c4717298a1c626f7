//! Applies a [`crate::style::Style`] on top of a single-channel data producer.

use crate::raster::ImageSource;
use crate::style::{self, AspectConvention, SlopeUnit, Style};
use anyhow::{Result, bail};

pub struct StyledImage<S: ImageSource> {
	source: S,
	style: Style,
	width: usize,
	height: usize,
	channels: u8,
	nodata: Vec<f32>,
	/// Rows `y-1, y, y+1` of the source, clamped at the image edges; refreshed
	/// as `get_line` is called in increasing `y`.
	window: Option<(usize, [Vec<f32>; 3])>,
}

impl<S: ImageSource> StyledImage<S> {
	/// # Errors
	/// Returns an error if `style` fails validation or `source` is not single-channel.
	pub fn new(source: S, style: Style) -> Result<Self> {
		style.validate()?;
		if source.channels() != 1 {
			bail!("styles apply to single-channel data producers, got {} channels", source.channels());
		}
		let width = source.width();
		let height = source.height();
		let channels = style.output_channels();
		let nodata = vec![0.0; channels as usize];
		Ok(Self { source, style, width, height, channels, nodata, window: None })
	}

	fn row_clamped(&mut self, y: i64) -> Result<Vec<f32>> {
		let y = y.clamp(0, self.height as i64 - 1) as usize;
		self.source.get_line(y)
	}

	fn window_for(&mut self, y: usize) -> Result<[Vec<f32>; 3]> {
		if let Some((cached_y, rows)) = &self.window {
			if *cached_y == y {
				return Ok(rows.clone());
			}
		}
		let rows = [self.row_clamped(y as i64 - 1)?, self.row_clamped(y as i64)?, self.row_clamped(y as i64 + 1)?];
		self.window = Some((y, rows.clone()));
		Ok(rows)
	}

	fn z_window(rows: &[Vec<f32>; 3], x: usize, width: usize) -> [[f64; 3]; 3] {
		let mut z = [[0.0; 3]; 3];
		for (row_idx, row) in rows.iter().enumerate() {
			for (col_offset, col) in [x.saturating_sub(1), x, (x + 1).min(width - 1)].into_iter().enumerate() {
				z[row_idx][col_offset] = f64::from(row[col]);
			}
		}
		z
	}
}

impl<S: ImageSource> ImageSource for StyledImage<S> {
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
			bail!("row {y} is out of range for a {}-row styled image", self.height);
		}
		let channels = self.channels as usize;
		let mut out = Vec::with_capacity(self.width * channels);

		match self.style.clone() {
			Style::Palette { stops, rgb_continuous, alpha_continuous, no_alpha } => {
				let row = self.source.get_line(y)?;
				for &sample in &row {
					let rgba = style::lookup(&stops, f64::from(sample), rgb_continuous, alpha_continuous);
					out.push(f32::from(rgba[0]));
					out.push(f32::from(rgba[1]));
					out.push(f32::from(rgba[2]));
					if !no_alpha {
						out.push(f32::from(rgba[3]));
					}
				}
			}
			Style::Slope { unit, pixel_size } => {
				let rows = self.window_for(y)?;
				for x in 0..self.width {
					let z = Self::z_window(&rows, x, self.width);
					let (dz_dx, dz_dy) = style::horn_gradient(&z, pixel_size);
					let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();
					out.push(match unit {
						SlopeUnit::Percent => (rise * 100.0) as f32,
						SlopeUnit::Degrees => rise.atan().to_degrees() as f32,
					});
				}
			}
			Style::Aspect { convention, pixel_size } => {
				let rows = self.window_for(y)?;
				for x in 0..self.width {
					let z = Self::z_window(&rows, x, self.width);
					let (dz_dx, dz_dy) = style::horn_gradient(&z, pixel_size);
					let angle = match convention {
						AspectConvention::Trigonometric => dz_dy.atan2(dz_dx).to_degrees(),
						AspectConvention::Compass => {
							let trig = dz_dy.atan2(dz_dx).to_degrees();
							(90.0 - trig).rem_euclid(360.0)
						}
					};
					out.push(angle as f32);
				}
			}
			Style::Hillshade { azimuth_deg, elevation_deg, z_exaggeration, center, pixel_size } => {
				let rows = self.window_for(y)?;
				for x in 0..self.width {
					let z = Self::z_window(&rows, x, self.width);
					let (dz_dx, dz_dy) = style::horn_gradient(&z, pixel_size);
					let value = style::hillshade_value(dz_dx, dz_dy, azimuth_deg, elevation_deg, z_exaggeration, center);
					out.push(f32::from(value));
				}
			}
		}

		Ok(out)
	}
}
