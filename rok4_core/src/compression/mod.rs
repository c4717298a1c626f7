//! Byte-level compression helpers built on `flate2` and `brotli`.
//!
//! These wrap whole-buffer (de)compression of [`Blob`](crate::Blob) values; the tile
//! codecs in the image crate use the lower-level `flate2::write`/`read` streams directly
//! where they need scanline-by-scanline control.

use crate::Blob;
use anyhow::Result;
use std::io::{Read, Write};

/// Compresses a blob with DEFLATE (zlib-wrapped) at the given level (0-9).
pub fn compress_deflate(data: &Blob, level: u32) -> Result<Blob> {
	let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
	encoder.write_all(data.as_slice())?;
	Ok(Blob::from(encoder.finish()?))
}

/// Decompresses a zlib-wrapped DEFLATE stream.
pub fn decompress_deflate(data: &Blob) -> Result<Blob> {
	let mut decoder = flate2::read::ZlibDecoder::new(data.as_slice());
	let mut out = Vec::new();
	decoder.read_to_end(&mut out)?;
	Ok(Blob::from(out))
}

/// Compresses a blob with raw DEFLATE (no zlib header), as used by the PNG `IDAT` stream.
pub fn compress_deflate_raw(data: &Blob, level: u32) -> Result<Blob> {
	let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
	encoder.write_all(data.as_slice())?;
	Ok(Blob::from(encoder.finish()?))
}

/// Decompresses a raw DEFLATE stream (no zlib header).
pub fn decompress_deflate_raw(data: &Blob) -> Result<Blob> {
	let mut decoder = flate2::read::DeflateDecoder::new(data.as_slice());
	let mut out = Vec::new();
	decoder.read_to_end(&mut out)?;
	Ok(Blob::from(out))
}

/// Compresses a blob with Brotli at the given quality (0-11).
pub fn compress_brotli(data: &Blob, quality: u32) -> Result<Blob> {
	let mut out = Vec::new();
	let params = brotli::enc::BrotliEncoderParams {
		quality: quality as i32,
		..Default::default()
	};
	brotli::BrotliCompress(&mut data.as_slice(), &mut out, &params)?;
	Ok(Blob::from(out))
}

/// Decompresses a Brotli stream.
pub fn decompress_brotli(data: &Blob) -> Result<Blob> {
	let mut out = Vec::new();
	brotli::BrotliDecompress(&mut data.as_slice(), &mut out)?;
	Ok(Blob::from(out))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deflate_round_trip() {
		let data = Blob::from(b"the quick brown fox jumps over the lazy dog".to_vec());
		let compressed = compress_deflate(&data, 6).unwrap();
		let decompressed = decompress_deflate(&compressed).unwrap();
		assert_eq!(decompressed.as_slice(), data.as_slice());
	}

	#[test]
	fn deflate_raw_round_trip() {
		let data = Blob::from(vec![0u8; 4096]);
		let compressed = compress_deflate_raw(&data, 9).unwrap();
		assert!(compressed.len() < data.len());
		let decompressed = decompress_deflate_raw(&compressed).unwrap();
		assert_eq!(decompressed.as_slice(), data.as_slice());
	}

	#[test]
	fn brotli_round_trip() {
		let data = Blob::from(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec());
		let compressed = compress_brotli(&data, 5).unwrap();
		let decompressed = decompress_brotli(&compressed).unwrap();
		assert_eq!(decompressed.as_slice(), data.as_slice());
	}
}
