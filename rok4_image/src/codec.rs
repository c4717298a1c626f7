//! Tile sample-plane codecs shared by tile decoding and the TIFF encoder.
//!
//! A pyramid level declares one of these as its storage codec; the raw
//! plane they decode to/from is always `width * height * channels` bytes,
//! row-major, uncompressed samples (the pixel-container codecs JPEG and PNG
//! live in [`crate::format`] instead, since they are not simple byte-stream
//! transforms).

use anyhow::{Result, bail};
use rok4_core::Blob;
use rok4_core::compression::{compress_deflate_raw, decompress_deflate_raw};

/// The raw-plane tile codecs (JPEG and PNG are handled separately in
/// [`crate::format`] as they are full image containers, not byte-stream codecs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
	Raw,
	Lzw,
	PackBits,
	Zip,
}

impl Codec {
	/// Decodes `data` into exactly `expected_len` raw sample bytes.
	///
	/// # Errors
	/// Returns an error if the decoded length does not match `expected_len`,
	/// or the stream is malformed.
	pub fn decode(self, data: &Blob, expected_len: usize) -> Result<Vec<u8>> {
		let out = match self {
			Codec::Raw => data.as_slice().to_vec(),
			Codec::Lzw => lzw_decode(data.as_slice())?,
			Codec::PackBits => packbits_decode(data.as_slice())?,
			Codec::Zip => decompress_deflate_raw(data)?.into_vec(),
		};
		if out.len() != expected_len {
			bail!("{self:?} decode produced {} bytes, expected {expected_len}", out.len());
		}
		Ok(out)
	}

	/// Encodes a raw sample plane.
	///
	/// # Errors
	/// Propagates encoder failures (DEFLATE only, in practice).
	pub fn encode(self, data: &[u8]) -> Result<Blob> {
		match self {
			Codec::Raw => Ok(Blob::from(data)),
			Codec::Lzw => Ok(Blob::from(lzw_encode(data))),
			Codec::PackBits => Ok(Blob::from(packbits_encode(data))),
			Codec::Zip => compress_deflate_raw(&Blob::from(data), 6),
		}
	}
}

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MAX_CODE_BITS: u8 = 12;

/// TIFF-style LZW: variable bit-length codes starting at 9 bits and growing
/// to 12, with `CLEAR` (256) and `EOD` (257) markers and dictionary reset on
/// overflow at the max code.
fn lzw_encode(data: &[u8]) -> Vec<u8> {
	let mut writer = BitWriter::new();
	let mut dict: std::collections::HashMap<Vec<u8>, u16> = HashMapInit::fresh();
	let mut code_width = 9u8;
	let mut next_code = FIRST_CODE;

	writer.write(CLEAR_CODE, code_width);

	let mut current: Vec<u8> = Vec::new();
	for &byte in data {
		let mut candidate = current.clone();
		candidate.push(byte);
		if dict.contains_key(&candidate) || candidate.len() == 1 {
			current = candidate;
			continue;
		}
		let code = if current.is_empty() { u16::from(byte) } else { dict[&current] };
		writer.write(code, code_width);

		dict.insert(candidate, next_code);
		next_code += 1;
		if next_code > (1u16 << code_width) - 1 && code_width < MAX_CODE_BITS {
			code_width += 1;
		}
		if next_code >= (1u16 << MAX_CODE_BITS) {
			writer.write(CLEAR_CODE, code_width);
			dict = HashMapInit::fresh();
			code_width = 9;
			next_code = FIRST_CODE;
		}
		current = vec![byte];
	}
	if !current.is_empty() {
		let code = if current.len() == 1 { u16::from(current[0]) } else { dict[&current] };
		writer.write(code, code_width);
	}
	writer.write(EOD_CODE, code_width);
	writer.finish()
}

fn lzw_decode(data: &[u8]) -> Result<Vec<u8>> {
	let mut reader = BitReader::new(data);
	let mut dict: Vec<Vec<u8>> = fresh_decode_table();
	let mut code_width = 9u8;
	let mut out = Vec::new();
	let mut previous: Option<Vec<u8>> = None;

	loop {
		let Some(code) = reader.read(code_width) else {
			bail!("LZW stream ended without an EOD marker");
		};
		if code == CLEAR_CODE {
			dict = fresh_decode_table();
			code_width = 9;
			previous = None;
			continue;
		}
		if code == EOD_CODE {
			break;
		}

		let entry = if (code as usize) < dict.len() {
			dict[code as usize].clone()
		} else if code as usize == dict.len() {
			let Some(prev) = &previous else {
				bail!("LZW stream referenced an undefined code before any data");
			};
			let mut e = prev.clone();
			e.push(prev[0]);
			e
		} else {
			bail!("LZW stream referenced an out-of-range code {code}");
		};

		out.extend_from_slice(&entry);

		if let Some(prev) = previous {
			let mut new_entry = prev;
			new_entry.push(entry[0]);
			dict.push(new_entry);
			if dict.len() + 1 > (1usize << code_width) && code_width < MAX_CODE_BITS {
				code_width += 1;
			}
		}
		previous = Some(entry);
	}
	Ok(out)
}

fn fresh_decode_table() -> Vec<Vec<u8>> {
	(0u16..256).map(|b| vec![b as u8]).chain([vec![], vec![]]).collect()
}

/// Small indirection so the encoder's dictionary reset reads as a named
/// operation rather than a bare `HashMap::new()` sprinkled three times.
struct HashMapInit;
impl HashMapInit {
	fn fresh() -> std::collections::HashMap<Vec<u8>, u16> {
		std::collections::HashMap::new()
	}
}

struct BitWriter {
	bytes: Vec<u8>,
	acc: u32,
	acc_bits: u8,
}

impl BitWriter {
	fn new() -> Self {
		Self { bytes: Vec::new(), acc: 0, acc_bits: 0 }
	}

	fn write(&mut self, code: u16, width: u8) {
		self.acc = (self.acc << width) | u32::from(code);
		self.acc_bits += width;
		while self.acc_bits >= 8 {
			let shift = self.acc_bits - 8;
			self.bytes.push((self.acc >> shift) as u8);
			self.acc_bits -= 8;
			self.acc &= (1 << self.acc_bits) - 1;
		}
	}

	fn finish(mut self) -> Vec<u8> {
		if self.acc_bits > 0 {
			let pad = 8 - self.acc_bits;
			self.bytes.push((self.acc << pad) as u8);
		}
		self.bytes
	}
}

struct BitReader<'a> {
	data: &'a [u8],
	byte_pos: usize,
	bit_pos: u8,
}

impl<'a> BitReader<'a> {
	fn new(data: &'a [u8]) -> Self {
		Self { data, byte_pos: 0, bit_pos: 0 }
	}

	fn read(&mut self, width: u8) -> Option<u16> {
		let mut value: u16 = 0;
		for _ in 0..width {
			if self.byte_pos >= self.data.len() {
				return None;
			}
			let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
			value = (value << 1) | u16::from(bit);
			self.bit_pos += 1;
			if self.bit_pos == 8 {
				self.bit_pos = 0;
				self.byte_pos += 1;
			}
		}
		Some(value)
	}
}

/// PackBits (TIFF/Apple variant): a stream of control bytes each followed by
/// either a run or a literal span. `n` (signed, `-127..=127`):
/// - `1..=127`: copy the next `n+1` literal bytes verbatim.
/// - `-1..=-127`: repeat the next single byte `1-n` times.
/// - `-128`: no-op, skipped.
fn packbits_encode(data: &[u8]) -> Vec<u8> {
	let mut out = Vec::new();
	let mut i = 0;
	while i < data.len() {
		let run_len = run_length(data, i);
		if run_len >= 2 {
			out.push((1i16 - run_len as i16) as u8);
			out.push(data[i]);
			i += run_len;
			continue;
		}

		let start = i;
		let mut j = i + 1;
		while j < data.len() && j - start < 128 {
			if run_length(data, j) >= 2 {
				break;
			}
			j += 1;
		}
		let literal = &data[start..j];
		out.push((literal.len() - 1) as u8);
		out.extend_from_slice(literal);
		i = j;
	}
	out
}

fn run_length(data: &[u8], start: usize) -> usize {
	let mut n = 1;
	while start + n < data.len() && data[start + n] == data[start] && n < 128 {
		n += 1;
	}
	n
}

fn packbits_decode(data: &[u8]) -> Result<Vec<u8>> {
	let mut out = Vec::new();
	let mut i = 0;
	while i < data.len() {
		let n = data[i] as i8;
		i += 1;
		if n >= 0 {
			let count = n as usize + 1;
			let end = i + count;
			if end > data.len() {
				bail!("PackBits literal run overruns the stream");
			}
			out.extend_from_slice(&data[i..end]);
			i = end;
		} else if n != -128 {
			if i >= data.len() {
				bail!("PackBits repeat run is missing its byte");
			}
			let count = (1 - n as i16) as usize;
			out.extend(std::iter::repeat_n(data[i], count));
			i += 1;
		}
	}
	Ok(out)
}
