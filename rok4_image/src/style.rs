//! Style definitions applied by [`crate::styled::StyledImage`] on top of a
//! (usually single-channel) elevation or classification producer.

use crate::color::parse_hex_color;
use anyhow::{Result, bail, ensure};

/// One value-to-colour mapping stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteStop {
	pub value: f64,
	pub rgba: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeUnit {
	Percent,
	Degrees,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectConvention {
	/// 0 = north, clockwise (compass bearing).
	Compass,
	/// Standard mathematical angle, 0 = east, counter-clockwise.
	Trigonometric,
}

#[derive(Debug, Clone)]
pub enum Style {
	/// Maps sample values to colours via a sorted list of stops.
	Palette {
		stops: Vec<PaletteStop>,
		rgb_continuous: bool,
		alpha_continuous: bool,
		no_alpha: bool,
	},
	/// Gradient magnitude over a local 3x3 window.
	Slope { unit: SlopeUnit, pixel_size: f64 },
	/// Gradient direction over a local 3x3 window.
	Aspect { convention: AspectConvention, pixel_size: f64 },
	/// Horn's formula shaded relief.
	Hillshade { azimuth_deg: f64, elevation_deg: f64, z_exaggeration: f64, center: bool, pixel_size: f64 },
}

impl Style {
	/// Number of output channels this style produces (1, 3 or 4).
	#[must_use]
	pub fn output_channels(&self) -> u8 {
		match self {
			Style::Palette { no_alpha: true, .. } => 3,
			Style::Palette { no_alpha: false, .. } => 4,
			Style::Slope { .. } | Style::Aspect { .. } | Style::Hillshade { .. } => 1,
		}
	}
}

impl PaletteStop {
	/// # Errors
	/// Returns an error if `hex` is not a valid colour (see [`parse_hex_color`]).
	pub fn new(value: f64, hex: &str) -> Result<Self> {
		let bytes = parse_hex_color(hex)?;
		let rgba = match bytes.len() {
			3 => [bytes[0], bytes[1], bytes[2], 255],
			4 => [bytes[0], bytes[1], bytes[2], bytes[3]],
			n => bail!("palette stop colour must expand to 3 or 4 bytes, got {n}"),
		};
		Ok(Self { value, rgba })
	}
}

/// Looks up `sample` in `stops` (which must be sorted by ascending value).
///
/// Below the first stop or above the last, the nearest edge stop's colour is
/// used unchanged. Between two stops, `rgb_continuous`/`alpha_continuous`
/// each independently choose interpolation or snapping to the lower stop.
#[must_use]
pub fn lookup(stops: &[PaletteStop], sample: f64, rgb_continuous: bool, alpha_continuous: bool) -> [u8; 4] {
	if stops.is_empty() {
		return [0, 0, 0, 0];
	}
	if sample <= stops[0].value {
		return stops[0].rgba;
	}
	if sample >= stops[stops.len() - 1].value {
		return stops[stops.len() - 1].rgba;
	}

	let upper = stops.partition_point(|stop| stop.value <= sample);
	let lo = &stops[upper - 1];
	let hi = &stops[upper];
	let span = hi.value - lo.value;
	let t = if span > 0.0 { (sample - lo.value) / span } else { 0.0 };

	let mut out = [0u8; 4];
	for c in 0..3 {
		out[c] = if rgb_continuous {
			(f64::from(lo.rgba[c]) + t * (f64::from(hi.rgba[c]) - f64::from(lo.rgba[c]))).round() as u8
		} else {
			lo.rgba[c]
		};
	}
	out[3] = if alpha_continuous {
		(f64::from(lo.rgba[3]) + t * (f64::from(hi.rgba[3]) - f64::from(lo.rgba[3]))).round() as u8
	} else {
		lo.rgba[3]
	};
	out
}

/// Horn's formula: partial derivatives of a 3x3 elevation window `z`
/// (row-major, `z[1][1]` the centre), scaled by `pixel_size`.
#[must_use]
pub fn horn_gradient(z: &[[f64; 3]; 3], pixel_size: f64) -> (f64, f64) {
	let dz_dx = ((z[0][2] + 2.0 * z[1][2] + z[2][2]) - (z[0][0] + 2.0 * z[1][0] + z[2][0])) / (8.0 * pixel_size);
	let dz_dy = ((z[2][0] + 2.0 * z[2][1] + z[2][2]) - (z[0][0] + 2.0 * z[0][1] + z[0][2])) / (8.0 * pixel_size);
	(dz_dx, dz_dy)
}

/// Shaded-relief value in `[0, 255]` from a gradient, per Horn's hillshade formula.
#[must_use]
pub fn hillshade_value(dz_dx: f64, dz_dy: f64, azimuth_deg: f64, elevation_deg: f64, z_exaggeration: f64, center: bool) -> u8 {
	let slope_rad = (z_exaggeration * (dz_dx * dz_dx + dz_dy * dz_dy).sqrt()).atan();
	let aspect_rad = dz_dy.atan2(-dz_dx);

	let zenith_rad = (90.0 - elevation_deg).to_radians();
	let azimuth_rad = azimuth_deg.to_radians();

	let shade = zenith_rad.cos() * slope_rad.cos() + zenith_rad.sin() * slope_rad.sin() * (azimuth_rad - aspect_rad).cos();
	let shade = shade.clamp(-1.0, 1.0);

	if center {
		(127.0 + shade * 127.0).round().clamp(0.0, 255.0) as u8
	} else {
		(shade * 255.0).round().clamp(0.0, 255.0) as u8
	}
}

impl Style {
	/// # Errors
	/// Returns an error if a `Palette` variant has no stops, or any numeric
	/// parameter is non-finite.
	pub fn validate(&self) -> Result<()> {
		match self {
			Style::Palette { stops, .. } => ensure!(!stops.is_empty(), "a palette style needs at least one stop"),
			Style::Slope { pixel_size, .. } | Style::Aspect { pixel_size, .. } => {
				ensure!(*pixel_size > 0.0, "pixel size must be positive")
			}
			Style::Hillshade { pixel_size, z_exaggeration, .. } => {
				ensure!(*pixel_size > 0.0, "pixel size must be positive");
				ensure!(*z_exaggeration > 0.0, "z exaggeration must be positive");
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stops() -> Vec<PaletteStop> {
		vec![PaletteStop::new(0.0, "000000").unwrap(), PaletteStop::new(100.0, "FFFFFF").unwrap()]
	}

	#[test]
	fn continuous_lookup_interpolates_midpoint() {
		let color = lookup(&stops(), 50.0, true, true);
		assert_eq!(color, [127, 127, 127, 255]);
	}

	#[test]
	fn discrete_lookup_snaps_to_lower_stop() {
		let color = lookup(&stops(), 50.0, false, false);
		assert_eq!(color, [0, 0, 0, 255]);
	}

	#[test]
	fn out_of_range_clamps_to_edge_stops() {
		assert_eq!(lookup(&stops(), -10.0, true, true), [0, 0, 0, 255]);
		assert_eq!(lookup(&stops(), 1000.0, true, true), [255, 255, 255, 255]);
	}

	#[test]
	fn flat_surface_has_no_shade_variation() {
		let flat = [[10.0; 3]; 3];
		let (dx, dy) = horn_gradient(&flat, 1.0);
		assert_eq!((dx, dy), (0.0, 0.0));
		let value = hillshade_value(dx, dy, 315.0, 45.0, 1.0, true);
		assert_eq!(value, 127);
	}

	#[test]
	fn palette_requires_at_least_one_stop() {
		let style = Style::Palette { stops: vec![], rgb_continuous: true, alpha_continuous: true, no_alpha: false };
		assert!(style.validate().is_err());
	}
}
