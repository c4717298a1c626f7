//! JPEG encoder/decoder bridging [`Raster`] and the [`image`] crate's JPEG codec.
//!
//! Only 8-bit Grey and RGB rasters are supported; JPEG has no alpha channel.
//! Decode failures must never abort the pipeline (a corrupt or truncated
//! tile is substituted with a white tile by the caller in
//! [`crate::tile_source`]) but this module itself just reports the error.

use crate::raster::{ImageSource, Raster};
use anyhow::{Context, Result, bail};
use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};
use rok4_core::Blob;

/// Encodes a raster as JPEG.
///
/// `quality` is `0..=99` (default 95); `quality >= 100` is rejected since
/// JPEG cannot produce true lossless output.
///
/// # Errors
/// Returns an error if the raster has an alpha channel, or `quality >= 100`.
pub fn encode(raster: &Raster, quality: Option<u8>) -> Result<Blob> {
	let quality = quality.unwrap_or(95);
	if quality >= 100 {
		bail!("JPEG does not support lossless compression, use a quality < 100");
	}

	let color = match raster.channels() {
		1 => ExtendedColorType::L8,
		3 => ExtendedColorType::Rgb8,
		other => bail!("JPEG only supports Grey or RGB rasters without alpha, got {other} channels"),
	};

	let bytes = raster.to_u8();
	let mut buffer = Vec::new();
	JpegEncoder::new_with_quality(&mut buffer, quality)
		.write_image(&bytes, raster.width() as u32, raster.height() as u32, color)
		.with_context(|| format!("encoding {}x{} raster as JPEG (q={quality})", raster.width(), raster.height()))?;

	Ok(Blob::from(buffer))
}

/// Decodes a JPEG blob into a raster.
///
/// # Errors
/// Returns an error if the blob is not a valid JPEG.
pub fn decode(blob: &Blob) -> Result<Raster> {
	let decoded = image::load_from_memory_with_format(blob.as_slice(), image::ImageFormat::Jpeg)
		.with_context(|| format!("decoding JPEG image ({} bytes)", blob.len()))?;
	let channels = u8::try_from(decoded.color().channel_count()).unwrap_or(0);
	let (width, height) = (decoded.width() as usize, decoded.height() as usize);
	let bytes = decoded.into_bytes();
	Ok(Raster::from_u8(width, height, channels, vec![0.0; channels as usize], &bytes))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gradient(width: usize, height: usize, channels: u8) -> Raster {
		let mut data = Vec::with_capacity(width * height * channels as usize);
		for y in 0..height {
			for x in 0..width {
				let v = ((x + y) * 255 / (width + height)) as f32;
				for _ in 0..channels {
					data.push(v);
				}
			}
		}
		Raster::new(width, height, channels, vec![0.0; channels as usize], data).unwrap()
	}

	#[test]
	fn round_trips_rgb_lossily() {
		let raster = gradient(16, 16, 3);
		let blob = encode(&raster, Some(90)).unwrap();
		let decoded = decode(&blob).unwrap();
		assert_eq!(decoded.width(), raster.width());
		assert_eq!(decoded.height(), raster.height());
		assert_eq!(decoded.channels(), 3);
	}

	#[test]
	fn rejects_lossless_quality() {
		let raster = gradient(4, 4, 1);
		assert!(encode(&raster, Some(100)).is_err());
	}

	#[test]
	fn rejects_alpha() {
		let raster = Raster::new(2, 2, 4, vec![0.0; 4], vec![0.0; 16]).unwrap();
		assert!(encode(&raster, None).is_err());
	}
}
