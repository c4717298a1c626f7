//! Wraps a producer as a byte stream in a chosen output container.
//!
//! The encoder pulls scanlines from the head of the pipeline in increasing
//! order. [`format::tiff`](crate::format::tiff)'s striped/tiled writer and
//! [`format::bil`](crate::format::bil)'s row-at-a-time text format could
//! stream directly; PNG and JPEG go through the `image` crate's own
//! encoders, which require the full raster up front, so this stage collects
//! scanlines into one buffer before handing off to the chosen format's
//! encode function rather than re-implementing streaming PNG/JPEG writers.

use crate::codec::Codec;
use crate::format::{bil, jpeg, png, tiff};
use crate::pipeline::PipelineTracker;
use crate::raster::{ImageSource, Raster};
use anyhow::Result;
use rok4_core::Blob;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoder {
	Tiff { codec: Codec, layout: tiff::Layout, sample_kind: tiff::SampleKindArg },
	Jpeg { quality: Option<u8> },
	Png { speed: Option<u8> },
	Bil { xllcorner: f64, yllcorner: f64, cellsize: f64 },
}

impl Encoder {
	/// Drains `source` entirely (in increasing row order) and encodes it.
	///
	/// # Errors
	/// Returns an error if a source read fails or the chosen format rejects
	/// the assembled raster (e.g. JPEG given an alpha channel).
	pub fn encode(self, source: &mut dyn ImageSource) -> Result<Blob> {
		let width = source.width();
		let height = source.height();
		let channels = source.channels();
		let nodata = source.nodata().to_vec();

		let mut tracker = PipelineTracker::new(height);
		tracker.ready();

		let mut data = Vec::with_capacity(width * height * channels as usize);
		for y in 0..height {
			if let Err(err) = tracker.begin_line(y) {
				return Err(err);
			}
			match source.get_line(y) {
				Ok(line) => data.extend(line),
				Err(err) => {
					tracker.fail(&err);
					return Err(err);
				}
			}
			tracker.complete_line(y);
		}

		let raster = Raster::new(width, height, channels, nodata, data)?;

		match self {
			Encoder::Tiff { codec, layout, sample_kind } => tiff::encode(&raster, codec, layout, sample_kind),
			Encoder::Jpeg { quality } => jpeg::encode(&raster, quality),
			Encoder::Png { speed } => png::encode(&raster, speed),
			Encoder::Bil { xllcorner, yllcorner, cellsize } => bil::encode(&raster, xllcorner, yllcorner, cellsize),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::raster::Raster;

	fn flat(width: usize, height: usize, value: f32) -> Raster {
		Raster::new(width, height, 1, vec![0.0], vec![value; width * height]).unwrap()
	}

	#[test]
	fn png_encoder_produces_a_valid_signature() {
		let mut source = flat(4, 4, 200.0);
		let blob = Encoder::Png { speed: None }.encode(&mut source).unwrap();
		assert_eq!(&blob.as_slice()[0..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
	}

	#[test]
	fn bil_encoder_round_trips_through_format_bil() {
		let mut source = flat(2, 2, 42.0);
		let blob = Encoder::Bil { xllcorner: 0.0, yllcorner: 0.0, cellsize: 1.0 }.encode(&mut source).unwrap();
		let decoded = bil::decode(&blob).unwrap();
		assert_eq!(decoded.data(), &[42.0; 4]);
	}

	#[test]
	fn tiff_encoder_wraps_format_tiff() {
		let mut source = flat(4, 4, 10.0);
		let blob = Encoder::Tiff {
			codec: Codec::Raw,
			layout: tiff::Layout::Striped { rows_per_strip: 2 },
			sample_kind: tiff::SampleKindArg::UInt8,
		}
		.encode(&mut source)
		.unwrap();
		assert_eq!(&blob.as_slice()[0..2], &[0x49, 0x49]);
	}
}
