//! Classic (little-endian) TIFF writer for pyramid tile export.
//!
//! Lays tiles out striped (`ROWS_PER_STRIP`) or tiled (tags 322/323) per the
//! caller's declared [`Layout`], reusing [`crate::codec::Codec`] for the
//! sample-plane compression (RAW/LZW/PackBits/Zip).

use crate::codec::Codec;
use crate::raster::{ImageSource, Raster};
use anyhow::{Result, bail};
use byteorder::{LittleEndian, WriteBytesExt};
use rok4_core::Blob;
use std::io::Write;

/// How the encoded samples are chunked into byte runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
	Striped { rows_per_strip: u32 },
	Tiled { tile_width: u32, tile_height: u32 },
}

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_PLANAR_CONFIG: u16 = 284;
const TAG_SAMPLE_FORMAT: u16 = 339;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
	UInt8,
	Float32,
}

/// Encodes `raster` as a one-IFD classic TIFF.
///
/// # Errors
/// Returns an error if `layout` doesn't evenly divide the image, or the
/// underlying codec fails.
pub fn encode(raster: &Raster, codec: Codec, layout: Layout, sample_kind: SampleKindArg) -> Result<Blob> {
	let width = raster.width();
	let height = raster.height();
	let channels = raster.channels();
	let kind = match sample_kind {
		SampleKindArg::UInt8 => SampleKind::UInt8,
		SampleKindArg::Float32 => SampleKind::Float32,
	};
	let bytes_per_sample: u32 = match kind {
		SampleKind::UInt8 => 1,
		SampleKind::Float32 => 4,
	};

	let chunks = match layout {
		Layout::Striped { rows_per_strip } => {
			if rows_per_strip == 0 {
				bail!("rows_per_strip must be positive");
			}
			strip_chunks(raster, rows_per_strip, kind)
		}
		Layout::Tiled { tile_width, tile_height } => {
			if width as u32 % tile_width != 0 || height as u32 % tile_height != 0 {
				bail!("tiled TIFF layout {tile_width}x{tile_height} does not evenly divide {width}x{height}");
			}
			tile_chunks(raster, tile_width, tile_height, kind)
		}
	};

	let encoded: Result<Vec<Blob>> = chunks.iter().map(|bytes| codec.encode(bytes)).collect();
	let encoded = encoded?;

	let mut out = Vec::new();
	out.write_u16::<LittleEndian>(0x4949).unwrap(); // "II", little-endian
	out.write_u16::<LittleEndian>(42).unwrap();
	out.write_u32::<LittleEndian>(8).unwrap(); // IFD follows the 8-byte header

	let mut entries: Vec<(u16, u16, u32, Vec<u8>)> = Vec::new();
	entries.push(short_entry(TAG_IMAGE_WIDTH, width as u32));
	entries.push(short_entry(TAG_IMAGE_LENGTH, height as u32));
	entries.push(array_entry(TAG_BITS_PER_SAMPLE, TYPE_SHORT, vec![u32::from(bytes_per_sample) * 8; channels as usize]));
	entries.push(short_entry(TAG_COMPRESSION, compression_code(codec)));
	entries.push(short_entry(TAG_PHOTOMETRIC, if channels >= 3 { 2 } else { 1 }));
	entries.push(short_entry(TAG_SAMPLES_PER_PIXEL, u32::from(channels)));
	entries.push(short_entry(TAG_PLANAR_CONFIG, 1));
	entries.push(array_entry(TAG_SAMPLE_FORMAT, TYPE_SHORT, vec![sample_format_code(kind); channels as usize]));

	match layout {
		Layout::Striped { rows_per_strip } => entries.push(short_entry(TAG_ROWS_PER_STRIP, rows_per_strip)),
		Layout::Tiled { tile_width, tile_height } => {
			entries.push(short_entry(TAG_TILE_WIDTH, tile_width));
			entries.push(short_entry(TAG_TILE_LENGTH, tile_height));
		}
	}

	// Data immediately follows the IFD and its out-of-line value arrays; the
	// exact offset is only known once the IFD's own size is fixed, so we
	// reserve placeholder offset/length tags now and patch them after writing
	// everything else.
	let offsets_tag = match layout {
		Layout::Striped { .. } => TAG_STRIP_OFFSETS,
		Layout::Tiled { .. } => TAG_TILE_OFFSETS,
	};
	let counts_tag = match layout {
		Layout::Striped { .. } => TAG_STRIP_BYTE_COUNTS,
		Layout::Tiled { .. } => TAG_TILE_BYTE_COUNTS,
	};
	entries.push(array_entry(offsets_tag, TYPE_LONG, vec![0; encoded.len()]));
	entries.push(array_entry(counts_tag, TYPE_LONG, encoded.iter().map(|b| b.len() as u32).collect()));

	entries.sort_by_key(|(tag, ..)| *tag);

	let ifd_entry_count = entries.len();
	let ifd_size = 2 + ifd_entry_count * 12 + 4;
	let mut out_of_line = Vec::new();
	let ifd_start = out.len();
	let data_would_start_at = ifd_start + ifd_size;

	let mut out_of_line_base = data_would_start_at;
	let mut resolved_entries = Vec::with_capacity(ifd_entry_count);
	for (tag, ty, count, bytes) in entries {
		if bytes.len() <= 4 {
			let mut inline = bytes.clone();
			inline.resize(4, 0);
			resolved_entries.push((tag, ty, count, inline, None));
		} else {
			let offset = out_of_line_base;
			out_of_line_base += bytes.len();
			out_of_line.extend_from_slice(&bytes);
			resolved_entries.push((tag, ty, count, (offset as u32).to_le_bytes().to_vec(), Some(())));
		}
	}

	let data_start = out_of_line_base;

	out.write_u16::<LittleEndian>(ifd_entry_count as u16).unwrap();
	for (tag, ty, count, value_bytes, _) in &resolved_entries {
		out.write_u16::<LittleEndian>(*tag).unwrap();
		out.write_u16::<LittleEndian>(*ty).unwrap();
		out.write_u32::<LittleEndian>(*count).unwrap();
		out.write_all(value_bytes).unwrap();
	}
	out.write_u32::<LittleEndian>(0).unwrap(); // no further IFD

	out.extend_from_slice(&out_of_line);

	let mut chunk_offsets = Vec::with_capacity(encoded.len());
	let mut cursor = data_start as u32;
	for blob in &encoded {
		chunk_offsets.push(cursor);
		out.extend_from_slice(blob.as_slice());
		cursor += blob.len() as u32;
	}

	patch_offsets_tag(&mut out, ifd_start, offsets_tag, &chunk_offsets);

	Ok(Blob::from(out))
}

/// Which numeric representation the raster's samples carry, as distinct from
/// [`crate::raster::Raster`]'s internal `f32` widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKindArg {
	UInt8,
	Float32,
}

fn compression_code(codec: Codec) -> u32 {
	match codec {
		Codec::Raw => 1,
		Codec::Lzw => 5,
		Codec::PackBits => 32773,
		Codec::Zip => 8,
	}
}

fn sample_format_code(kind: SampleKind) -> u32 {
	match kind {
		SampleKind::UInt8 => 1,
		SampleKind::Float32 => 3,
	}
}

fn short_entry(tag: u16, value: u32) -> (u16, u16, u32, Vec<u8>) {
	(tag, TYPE_LONG, 1, value.to_le_bytes().to_vec())
}

fn array_entry(tag: u16, ty: u16, values: Vec<u32>) -> (u16, u16, u32, Vec<u8>) {
	let count = values.len() as u32;
	let mut bytes = Vec::new();
	for v in values {
		match ty {
			TYPE_SHORT => bytes.write_u16::<LittleEndian>(v as u16).unwrap(),
			TYPE_LONG => bytes.write_u32::<LittleEndian>(v).unwrap(),
			_ => unreachable!("only SHORT/LONG arrays are written"),
		}
	}
	(tag, ty, count, bytes)
}

fn patch_offsets_tag(out: &mut [u8], ifd_start: usize, tag: u16, offsets: &[u32]) {
	let entry_count = u16::from_le_bytes([out[ifd_start], out[ifd_start + 1]]) as usize;
	for i in 0..entry_count {
		let entry_start = ifd_start + 2 + i * 12;
		let entry_tag = u16::from_le_bytes([out[entry_start], out[entry_start + 1]]);
		if entry_tag != tag {
			continue;
		}
		let value_offset_field = entry_start + 8;
		if offsets.len() <= 1 {
			out[value_offset_field..value_offset_field + 4].copy_from_slice(&offsets.first().copied().unwrap_or(0).to_le_bytes());
		} else {
			let array_offset = u32::from_le_bytes([
				out[value_offset_field],
				out[value_offset_field + 1],
				out[value_offset_field + 2],
				out[value_offset_field + 3],
			]) as usize;
			for (i, &offset) in offsets.iter().enumerate() {
				let at = array_offset + i * 4;
				out[at..at + 4].copy_from_slice(&offset.to_le_bytes());
			}
		}
		return;
	}
}

fn strip_chunks(raster: &Raster, rows_per_strip: u32, kind: SampleKind) -> Vec<Vec<u8>> {
	let height = raster.height();
	let rows_per_strip = rows_per_strip as usize;
	let mut chunks = Vec::new();
	let mut y = 0;
	while y < height {
		let take = rows_per_strip.min(height - y);
		let mut bytes = Vec::new();
		for row in y..y + take {
			append_row(&mut bytes, raster.row(row), kind);
		}
		chunks.push(bytes);
		y += take;
	}
	chunks
}

fn tile_chunks(raster: &Raster, tile_width: u32, tile_height: u32, kind: SampleKind) -> Vec<Vec<u8>> {
	let width = raster.width();
	let height = raster.height();
	let channels = raster.channels() as usize;
	let tile_width = tile_width as usize;
	let tile_height = tile_height as usize;

	let mut chunks = Vec::new();
	let mut ty = 0;
	while ty < height {
		let mut tx = 0;
		while tx < width {
			let mut bytes = Vec::new();
			for row in ty..ty + tile_height {
				let source_row = raster.row(row.min(height - 1));
				let start = tx * channels;
				let end = ((tx + tile_width).min(width)) * channels;
				append_row(&mut bytes, &source_row[start..end], kind);
				let padding = (tile_width - (end - start) / channels) * channels;
				bytes.resize(bytes.len() + padding * bytes_per_sample(kind), 0);
			}
			chunks.push(bytes);
			tx += tile_width;
		}
		ty += tile_height;
	}
	chunks
}

fn bytes_per_sample(kind: SampleKind) -> usize {
	match kind {
		SampleKind::UInt8 => 1,
		SampleKind::Float32 => 4,
	}
}

fn append_row(out: &mut Vec<u8>, samples: &[f32], kind: SampleKind) {
	match kind {
		SampleKind::UInt8 => out.extend(samples.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8)),
		SampleKind::Float32 => {
			for &v in samples {
				out.write_f32::<LittleEndian>(v).unwrap();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ramp(width: usize, height: usize, channels: u8) -> Raster {
		let data: Vec<f32> = (0..width * height * channels as usize).map(|i| (i % 256) as f32).collect();
		Raster::new(width, height, channels, vec![0.0; channels as usize], data).unwrap()
	}

	#[test]
	fn striped_raw_has_a_valid_header() {
		let raster = ramp(8, 8, 1);
		let blob = encode(&raster, Codec::Raw, Layout::Striped { rows_per_strip: 4 }, SampleKindArg::UInt8).unwrap();
		let bytes = blob.as_slice();
		assert_eq!(&bytes[0..4], &[0x49, 0x49, 42, 0]);
	}

	#[test]
	fn tiled_layout_rejects_non_dividing_tile_size() {
		let raster = ramp(10, 10, 1);
		let result = encode(&raster, Codec::Raw, Layout::Tiled { tile_width: 3, tile_height: 3 }, SampleKindArg::UInt8);
		assert!(result.is_err());
	}

	#[test]
	fn tiled_layout_produces_one_chunk_per_tile() {
		let raster = ramp(8, 8, 1);
		let blob = encode(&raster, Codec::PackBits, Layout::Tiled { tile_width: 4, tile_height: 4 }, SampleKindArg::UInt8).unwrap();
		assert!(!blob.as_slice().is_empty());
	}
}
