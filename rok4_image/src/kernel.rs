//! Separable 1-D interpolation kernels used by [`crate::resampled::ResampledImage`]
//! and [`crate::reprojected::ReprojectedImage`].

use std::f64::consts::PI;
use std::sync::OnceLock;

/// A separable interpolation function with a base half-radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
	Nearest,
	Linear,
	Cubic,
	Lanczos2,
	Lanczos3,
	Lanczos4,
}

const TABLE_STEPS: usize = 1024;

impl Kernel {
	/// Base half-radius `r` of the kernel, in source-pixel units.
	#[must_use]
	pub fn radius(self) -> f64 {
		match self {
			Kernel::Nearest => 0.5,
			Kernel::Linear => 1.0,
			Kernel::Cubic => 2.0,
			Kernel::Lanczos2 => 2.0,
			Kernel::Lanczos3 => 3.0,
			Kernel::Lanczos4 => 4.0,
		}
	}

	/// `true` for kernels that never widen their footprint when downsampling
	/// (only [`Kernel::Nearest`]).
	#[must_use]
	pub fn const_ratio(self) -> bool {
		matches!(self, Kernel::Nearest)
	}

	/// The kernel function `phi(x)`, evaluated directly (not via the table).
	#[must_use]
	pub fn phi(self, x: f64) -> f64 {
		let x = x.abs();
		match self {
			Kernel::Nearest => {
				if x < 0.5 {
					1.0
				} else {
					0.0
				}
			}
			Kernel::Linear => (1.0 - x).max(0.0),
			Kernel::Cubic => cubic_catmull_rom(x),
			Kernel::Lanczos2 => lanczos(x, 2.0),
			Kernel::Lanczos3 => lanczos(x, 3.0),
			Kernel::Lanczos4 => lanczos(x, 4.0),
		}
	}

	/// The precomputed table `coeff[0..=1024]`, sampling `phi` at `i * r / 1024`.
	fn table(self) -> &'static [f64; TABLE_STEPS + 1] {
		static NEAREST: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();
		static LINEAR: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();
		static CUBIC: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();
		static LANCZOS2: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();
		static LANCZOS3: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();
		static LANCZOS4: OnceLock<[f64; TABLE_STEPS + 1]> = OnceLock::new();

		let cell = match self {
			Kernel::Nearest => &NEAREST,
			Kernel::Linear => &LINEAR,
			Kernel::Cubic => &CUBIC,
			Kernel::Lanczos2 => &LANCZOS2,
			Kernel::Lanczos3 => &LANCZOS3,
			Kernel::Lanczos4 => &LANCZOS4,
		};
		cell.get_or_init(|| {
			let r = self.radius();
			let mut table = [0.0; TABLE_STEPS + 1];
			for (i, slot) in table.iter_mut().enumerate() {
				*slot = self.phi(i as f64 * r / TABLE_STEPS as f64);
			}
			table
		})
	}

	/// Samples the precomputed table at kernel-space distance `x` (`0 <= x <= r_eff`).
	fn sample_table(self, x: f64, r_eff: f64) -> f64 {
		let table = self.table();
		let step = TABLE_STEPS as f64 / r_eff;
		let pos = (x * step).clamp(0.0, TABLE_STEPS as f64);
		let lo = pos.floor() as usize;
		let hi = (lo + 1).min(TABLE_STEPS);
		let frac = pos - lo as f64;
		table[lo] * (1.0 - frac) + table[hi] * frac
	}

	/// Computes the weight vector covering target position `x_center` in
	/// source-pixel space.
	///
	/// `ratio` is `source_resolution / target_resolution`: `ratio <= 1` means
	/// upsampling (use the base radius), `ratio > 1` means downsampling (the
	/// radius widens to `r * ratio` unless the kernel is [`Kernel::const_ratio`]).
	/// `capacity` bounds how many weights may be emitted (the caller's
	/// preallocated `Kx`/`Ky`); `max_index` is the exclusive upper bound on
	/// source indices. Returns `(x_first, weights)` with `weights` summing to 1.
	#[must_use]
	pub fn weight(self, x_center: f64, ratio: f64, capacity: usize, max_index: usize) -> (usize, Vec<f64>) {
		debug_assert!(max_index > 0);
		let r = self.radius();
		let r_eff = if ratio > 1.0 && !self.const_ratio() { r * ratio } else { r };
		let eps = 1e-9;

		let mut x_first = ((x_center - r_eff - eps).ceil() as i64).max(0) as usize;
		x_first = x_first.min(max_index - 1);

		let mut count = ((2.0 * r_eff).ceil() as usize).clamp(1, capacity);
		if x_first + count > max_index {
			count = max_index - x_first;
		}
		count = count.max(1);

		if count == 1 {
			return (x_first, vec![1.0]);
		}

		let mut weights: Vec<f64> = (0..count)
			.map(|i| {
				let source_index = x_first as f64 + i as f64;
				self.sample_table((source_index - x_center).abs(), r_eff)
			})
			.collect();

		let sum: f64 = weights.iter().sum();
		if sum.abs() > f64::EPSILON {
			for w in &mut weights {
				*w /= sum;
			}
		} else {
			// Degenerate case (e.g. center falls exactly between two zero-crossings):
			// fall back to the nearest sample getting all the weight.
			let closest = weights
				.iter()
				.enumerate()
				.max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
				.map(|(i, _)| i)
				.unwrap_or(0);
			weights.iter_mut().enumerate().for_each(|(i, w)| *w = if i == closest { 1.0 } else { 0.0 });
		}

		(x_first, weights)
	}
}

fn cubic_catmull_rom(x: f64) -> f64 {
	const A: f64 = -0.5;
	if x < 1.0 {
		(A + 2.0) * x.powi(3) - (A + 3.0) * x.powi(2) + 1.0
	} else if x < 2.0 {
		A * x.powi(3) - 5.0 * A * x.powi(2) + 8.0 * A * x - 4.0 * A
	} else {
		0.0
	}
}

fn sinc(x: f64) -> f64 {
	if x.abs() < 1e-12 { 1.0 } else { (PI * x).sin() / (PI * x) }
}

fn lanczos(x: f64, n: f64) -> f64 {
	if x < n { sinc(x) * sinc(x / n) } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Kernel::Nearest)]
	#[case(Kernel::Linear)]
	#[case(Kernel::Cubic)]
	#[case(Kernel::Lanczos2)]
	#[case(Kernel::Lanczos3)]
	#[case(Kernel::Lanczos4)]
	fn weights_sum_to_one(#[case] kernel: Kernel) {
		for x_center in [0.0, 2.3, 10.0, 99.9] {
			let (x_first, weights) = kernel.weight(x_center, 1.0, 16, 100);
			let sum: f64 = weights.iter().sum();
			assert!((sum - 1.0).abs() < 1e-9, "{kernel:?} at {x_center}: sum={sum}");
			assert!(x_first + weights.len() <= 100);
		}
	}

	#[test]
	fn downsampling_widens_non_const_ratio_kernels() {
		let (_, narrow) = Kernel::Linear.weight(50.0, 1.0, 64, 1000);
		let (_, wide) = Kernel::Linear.weight(50.0, 4.0, 64, 1000);
		assert!(wide.len() > narrow.len());
	}

	#[test]
	fn nearest_never_widens_under_downsampling() {
		let (_, a) = Kernel::Nearest.weight(50.0, 1.0, 64, 1000);
		let (_, b) = Kernel::Nearest.weight(50.0, 4.0, 64, 1000);
		assert_eq!(a.len(), b.len());
	}

	#[test]
	fn clamps_near_the_left_edge() {
		let (x_first, weights) = Kernel::Cubic.weight(0.0, 1.0, 16, 50);
		assert_eq!(x_first, 0);
		assert!(x_first + weights.len() <= 50);
	}

	#[test]
	fn clamps_near_the_right_edge() {
		let (x_first, weights) = Kernel::Cubic.weight(49.0, 1.0, 16, 50);
		assert!(x_first + weights.len() <= 50);
	}

	#[test]
	fn single_weight_is_degenerate_bilinear() {
		let (_, weights) = Kernel::Cubic.weight(0.0, 1.0, 16, 1);
		assert_eq!(weights, vec![1.0]);
	}
}
