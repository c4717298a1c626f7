//! Esri ASCII grid (Arc/Info) exporter for single-channel float DTM exports.

use crate::raster::Raster;
use anyhow::{Result, bail, ensure};
use rok4_core::Blob;
use std::fmt::Write as _;

const NODATA_VALUE: f64 = -99999.00;

/// Encodes `raster` as an ASCII grid: a six-line header (`ncols`, `nrows`,
/// `xllcorner`, `yllcorner`, `cellsize`, `NODATA_value`) followed by
/// `nrows` lines of `ncols` space-separated floats, each formatted `%.2f`.
///
/// # Errors
/// Returns an error if `raster` is not single-channel.
pub fn encode(raster: &Raster, xllcorner: f64, yllcorner: f64, cellsize: f64) -> Result<Blob> {
	ensure!(raster.channels() == 1, "ASCII grid export requires a single-channel raster, got {} channels", raster.channels());

	let mut text = String::new();
	writeln!(text, "ncols {}", raster.width()).unwrap();
	writeln!(text, "nrows {}", raster.height()).unwrap();
	writeln!(text, "xllcorner {xllcorner:.2}").unwrap();
	writeln!(text, "yllcorner {yllcorner:.2}").unwrap();
	writeln!(text, "cellsize {cellsize:.2}").unwrap();
	writeln!(text, "NODATA_value {NODATA_VALUE:.2}").unwrap();

	for y in 0..raster.height() {
		let row = raster.row(y);
		let mut line = String::with_capacity(row.len() * 8);
		for (i, &value) in row.iter().enumerate() {
			if i > 0 {
				line.push(' ');
			}
			let _ = write!(line, "{value:.2}");
		}
		text.push_str(&line);
		text.push('\n');
	}

	Ok(Blob::from(text))
}

/// Parses an ASCII grid back into a [`Raster`], widening each value to `f32`.
///
/// # Errors
/// Returns an error if the header is malformed or a row has the wrong
/// column count.
pub fn decode(blob: &Blob) -> Result<Raster> {
	let text = std::str::from_utf8(blob.as_slice())?;
	let mut lines = text.lines();

	let ncols = header_value(&mut lines, "ncols")? as usize;
	let nrows = header_value(&mut lines, "nrows")? as usize;
	let _xllcorner = header_value(&mut lines, "xllcorner")?;
	let _yllcorner = header_value(&mut lines, "yllcorner")?;
	let _cellsize = header_value(&mut lines, "cellsize")?;
	let nodata = header_value(&mut lines, "NODATA_value")?;

	let mut data = Vec::with_capacity(ncols * nrows);
	for (row_index, line) in lines.enumerate() {
		if row_index >= nrows {
			break;
		}
		let values: Result<Vec<f32>, _> = line.split_whitespace().map(str::parse::<f32>).collect();
		let values = values.map_err(|e| anyhow::anyhow!("invalid ASCII grid row {row_index}: {e}"))?;
		if values.len() != ncols {
			bail!("ASCII grid row {row_index} has {} values, expected {ncols}", values.len());
		}
		data.extend(values);
	}
	if data.len() != ncols * nrows {
		bail!("ASCII grid declared {nrows} rows but fewer were present");
	}

	Raster::new(ncols, nrows, 1, vec![nodata as f32], data)
}

fn header_value(lines: &mut std::str::Lines<'_>, expected_key: &str) -> Result<f64> {
	let line = lines.next().ok_or_else(|| anyhow::anyhow!("ASCII grid header truncated before '{expected_key}'"))?;
	let mut parts = line.split_whitespace();
	let key = parts.next().ok_or_else(|| anyhow::anyhow!("empty ASCII grid header line"))?;
	if !key.eq_ignore_ascii_case(expected_key) {
		bail!("expected ASCII grid header '{expected_key}', found '{key}'");
	}
	let value = parts.next().ok_or_else(|| anyhow::anyhow!("ASCII grid header '{expected_key}' has no value"))?;
	value.parse().map_err(|e| anyhow::anyhow!("invalid value for '{expected_key}': {e}"))
}
