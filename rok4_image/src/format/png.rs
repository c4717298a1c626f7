//! PNG encoder/decoder bridging [`Raster`] and the [`image`] crate's PNG codec.
//!
//! PNG is treated as a lossless tile codec here, with an optional speed knob
//! trading compression time for file size. Supports 8-bit Grey, GreyAlpha,
//! RGB and RGBA layouts (1-4 channels); a fully opaque RGBA/GreyAlpha raster
//! has its alpha channel dropped before encoding to save bytes.

use crate::raster::{ImageSource, Raster};
use anyhow::{Context, Result, bail};
use image::{ExtendedColorType, ImageEncoder, codecs::png};
use rok4_core::Blob;

fn color_type(channels: u8) -> Result<ExtendedColorType> {
	match channels {
		1 => Ok(ExtendedColorType::L8),
		2 => Ok(ExtendedColorType::La8),
		3 => Ok(ExtendedColorType::Rgb8),
		4 => Ok(ExtendedColorType::Rgba8),
		other => bail!("png only supports 1-4 channels, got {other}"),
	}
}

fn is_opaque(bytes: &[u8], channels: u8) -> bool {
	if channels != 2 && channels != 4 {
		return true;
	}
	bytes.chunks_exact(channels as usize).all(|px| px[channels as usize - 1] == 255)
}

fn drop_alpha(bytes: &[u8], channels: u8) -> Vec<u8> {
	bytes.chunks_exact(channels as usize).flat_map(|px| px[..channels as usize - 1].to_vec()).collect()
}

/// Encodes a raster as PNG.
///
/// `speed` is an optional `0..=100` hint (default 10): lower means stronger
/// compression, higher means faster encoding. Internally mapped to a
/// `(CompressionType, FilterType)` bucket.
///
/// # Errors
/// Returns an error if the raster does not have 1-4 channels, or the encoder fails.
pub fn encode(raster: &Raster, speed: Option<u8>) -> Result<Blob> {
	let speed = speed.unwrap_or(10).clamp(0, 100);
	use png::{CompressionType, FilterType};
	let (compression_type, filter_type) = match speed {
		0..20 => (CompressionType::Best, FilterType::Adaptive),
		20..40 => (CompressionType::Default, FilterType::Adaptive),
		40..60 => (CompressionType::Default, FilterType::Paeth),
		60..80 => (CompressionType::Default, FilterType::Avg),
		80..90 => (CompressionType::Fast, FilterType::Avg),
		_ => (CompressionType::Fast, FilterType::NoFilter),
	};

	let channels = raster.channels();
	color_type(channels)?;
	let bytes = raster.to_u8();

	let (bytes, channels) = if is_opaque(&bytes, channels) && (channels == 2 || channels == 4) {
		(drop_alpha(&bytes, channels), channels - 1)
	} else {
		(bytes, channels)
	};

	let mut buffer = Vec::new();
	png::PngEncoder::new_with_quality(&mut buffer, compression_type, filter_type)
		.write_image(&bytes, raster.width() as u32, raster.height() as u32, color_type(channels)?)
		.with_context(|| format!("encoding {}x{} {channels}-channel raster as PNG", raster.width(), raster.height()))?;

	Ok(Blob::from(buffer))
}

/// Decodes a PNG blob into a raster.
///
/// # Errors
/// Returns an error if the blob is not valid 8-bit PNG, or its channel count
/// is outside 1-4.
pub fn decode(blob: &Blob) -> Result<Raster> {
	let decoded = image::load_from_memory_with_format(blob.as_slice(), image::ImageFormat::Png)
		.with_context(|| format!("decoding PNG image ({} bytes)", blob.len()))?;
	let channels = u8::try_from(decoded.color().channel_count()).unwrap_or(0);
	color_type(channels)?;
	if decoded.color().bits_per_pixel() / u16::from(decoded.color().channel_count()) != 8 {
		bail!("png decoder only supports 8-bit images");
	}
	let (width, height) = (decoded.width() as usize, decoded.height() as usize);
	let bytes = decoded.into_bytes();
	Ok(Raster::from_u8(width, height, channels, vec![0.0; channels as usize], &bytes))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn checkerboard(width: usize, height: usize, channels: u8) -> Raster {
		let mut data = Vec::with_capacity(width * height * channels as usize);
		for y in 0..height {
			for x in 0..width {
				let v = if (x + y) % 2 == 0 { 10.0 } else { 240.0 };
				for _ in 0..channels {
					data.push(v);
				}
			}
		}
		Raster::new(width, height, channels, vec![0.0; channels as usize], data).unwrap()
	}

	#[test]
	fn round_trips_rgb() {
		let raster = checkerboard(8, 8, 3);
		let blob = encode(&raster, None).unwrap();
		let decoded = decode(&blob).unwrap();
		assert_eq!(decoded.data(), raster.data());
	}

	#[test]
	fn opaque_rgba_is_saved_without_alpha() {
		let mut data = Vec::new();
		for _ in 0..16 {
			data.extend_from_slice(&[10.0, 20.0, 30.0, 255.0]);
		}
		let raster = Raster::new(4, 4, 4, vec![0.0; 4], data).unwrap();
		let blob = encode(&raster, Some(80)).unwrap();
		let decoded = decode(&blob).unwrap();
		assert_eq!(decoded.channels(), 3);
	}

	#[test]
	fn rejects_out_of_range_channel_count() {
		let raster = Raster::new(1, 1, 5, vec![0.0; 5], vec![0.0; 5]).unwrap();
		assert!(encode(&raster, None).is_err());
	}
}
