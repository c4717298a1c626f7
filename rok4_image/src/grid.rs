//! Warp grid: a coarse target-to-source coordinate sampling used by
//! [`crate::reprojected::ReprojectedImage`] to avoid reprojecting every pixel.

use anyhow::{Result, bail, ensure};
use rok4_geometry::{BoundingBox, CoordinateTransformer, Crs};

/// A `(nbx+1) x (nby+1)` grid of target-pixel -> source-CRS coordinate samples.
///
/// Node `(gx, gy)` corresponds to target pixel column/row `min(gx*step,
/// width-1)` / `min(gy*step, height-1)`; the `+1` trailing node pins the last
/// column/row exactly on the image edge even when that is not a multiple of
/// `step`.
#[derive(Debug, Clone)]
pub struct Grid {
	width: usize,
	height: usize,
	step: usize,
	nbx: usize,
	nby: usize,
	x: Vec<f64>,
	y: Vec<f64>,
	bbox: BoundingBox,
}

impl Grid {
	/// Builds a grid over a `width x height` target image, with nodes every
	/// `step` pixels, initialised to an affine mapping onto `bbox` (upper-left
	/// origin, y decreasing downward as is conventional for raster images).
	///
	/// # Errors
	/// Returns an error if `width`, `height` or `step` is zero.
	pub fn new(width: usize, height: usize, step: usize, bbox: BoundingBox) -> Result<Self> {
		ensure!(width > 0 && height > 0, "grid must cover a non-empty image");
		ensure!(step > 0, "grid step must be positive");

		let nbx = 1 + (width - 1) / step;
		let nby = 1 + (height - 1) / step;
		let res_x = bbox.width() / width as f64;
		let res_y = bbox.height() / height as f64;

		let mut x = vec![0.0; (nbx + 1) * (nby + 1)];
		let mut y = vec![0.0; (nbx + 1) * (nby + 1)];
		for gy in 0..=nby {
			let py = target_row(gy, nby, step, height) as f64;
			for gx in 0..=nbx {
				let px = target_col(gx, nbx, step, width) as f64;
				let idx = gy * (nbx + 1) + gx;
				x[idx] = bbox.xmin + (px + 0.5) * res_x;
				y[idx] = bbox.ymax - (py + 0.5) * res_y;
			}
		}

		Ok(Self { width, height, step, nbx, nby, x, y, bbox })
	}

	#[must_use]
	pub fn bbox(&self) -> BoundingBox {
		self.bbox
	}

	#[must_use]
	pub fn width(&self) -> usize {
		self.width
	}

	#[must_use]
	pub fn height(&self) -> usize {
		self.height
	}

	/// Applies `x <- Ax*x + Bx`, `y <- Ay*y + By` to every node, then
	/// refreshes the bounding box from the transformed nodes (so a sign
	/// inversion in `Ax`/`Ay` still yields `xmin < xmax`, `ymin < ymax`).
	pub fn affine_transform(&mut self, ax: f64, bx: f64, ay: f64, by: f64) {
		for v in &mut self.x {
			*v = ax * *v + bx;
		}
		for v in &mut self.y {
			*v = ay * *v + by;
		}
		self.refresh_bbox();
	}

	/// Reprojects every grid node from `from` to `to` through `transformer`,
	/// which callers must have acquired under the process-wide coordinate
	/// transform lock.
	///
	/// # Errors
	/// Returns an error if the transform fails, or any resulting coordinate
	/// is non-finite.
	pub fn reproject(&mut self, transformer: &CoordinateTransformer, from: &Crs, to: &Crs) -> Result<()> {
		if from.is_lon_lat() {
			for v in self.x.iter_mut().chain(self.y.iter_mut()) {
				*v = v.to_radians();
			}
		}

		transformer.transform(&mut self.x, &mut self.y)?;

		if to.is_lon_lat() {
			for v in self.x.iter_mut().chain(self.y.iter_mut()) {
				*v = v.to_degrees();
			}
		}

		if self.x.iter().chain(self.y.iter()).any(|v| !v.is_finite()) {
			bail!("grid reprojection from {from} to {to} produced a non-finite coordinate");
		}

		self.refresh_bbox();
		Ok(())
	}

	fn refresh_bbox(&mut self) {
		let xmin = self.x.iter().copied().fold(f64::INFINITY, f64::min);
		let xmax = self.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		let ymin = self.y.iter().copied().fold(f64::INFINITY, f64::min);
		let ymax = self.y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		// Degenerate (zero-area) boxes can legitimately arise from a pathological
		// reprojection; callers treat that as a fatal grid-degeneracy error, not
		// a panic here.
		self.bbox = BoundingBox { xmin, ymin, xmax, ymax };
	}

	/// Fills `x_out`/`y_out` (each `width()` long) with the source-CRS
	/// coordinate of every pixel centre on target row `line`.
	///
	/// # Panics
	/// Panics if `x_out`/`y_out` are not exactly `width()` long.
	pub fn get_line(&self, line: usize, x_out: &mut [f64], y_out: &mut [f64]) {
		assert_eq!(x_out.len(), self.width);
		assert_eq!(y_out.len(), self.width);

		let gy0 = (line / self.step).min(self.nby.saturating_sub(1));
		let gy1 = (gy0 + 1).min(self.nby);
		let row0 = target_row(gy0, self.nby, self.step, self.height) as f64;
		let row1 = target_row(gy1, self.nby, self.step, self.height) as f64;
		let ty = if row1 > row0 { (line as f64 - row0) / (row1 - row0) } else { 0.0 };

		for col in 0..self.width {
			let gx0 = (col / self.step).min(self.nbx.saturating_sub(1));
			let gx1 = (gx0 + 1).min(self.nbx);
			let col0 = target_col(gx0, self.nbx, self.step, self.width) as f64;
			let col1 = target_col(gx1, self.nbx, self.step, self.width) as f64;
			let tx = if col1 > col0 { (col as f64 - col0) / (col1 - col0) } else { 0.0 };

			let (x00, y00) = self.node(gx0, gy0);
			let (x10, y10) = self.node(gx1, gy0);
			let (x01, y01) = self.node(gx0, gy1);
			let (x11, y11) = self.node(gx1, gy1);

			let xt0 = x00 * (1.0 - tx) + x10 * tx;
			let xt1 = x01 * (1.0 - tx) + x11 * tx;
			x_out[col] = xt0 * (1.0 - ty) + xt1 * ty;

			let yt0 = y00 * (1.0 - tx) + y10 * tx;
			let yt1 = y01 * (1.0 - tx) + y11 * tx;
			y_out[col] = yt0 * (1.0 - ty) + yt1 * ty;
		}
	}

	fn node(&self, gx: usize, gy: usize) -> (f64, f64) {
		let idx = gy * (self.nbx + 1) + gx;
		(self.x[idx], self.y[idx])
	}
}

fn target_row(gy: usize, nby: usize, step: usize, height: usize) -> usize {
	if gy >= nby { height - 1 } else { gy * step }
}

fn target_col(gx: usize, nbx: usize, step: usize, width: usize) -> usize {
	if gx >= nbx { width - 1 } else { gx * step }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bbox() -> BoundingBox {
		BoundingBox::new(0.0, 0.0, 100.0, 100.0).unwrap()
	}

	#[test]
	fn last_node_pins_the_image_edge() {
		let grid = Grid::new(257, 257, 16, bbox()).unwrap();
		let mut xs = vec![0.0; 257];
		let mut ys = vec![0.0; 257];
		grid.get_line(256, &mut xs, &mut ys);
		// Last row's node is pinned to the image edge: the sampled coordinate for
		// the last pixel should be within half a pixel of the bbox's lower edge.
		let res_y = bbox().height() / 257.0;
		assert!((ys[0] - (bbox().ymin + res_y * 0.5)).abs() < res_y);
	}

	#[test]
	fn affine_transform_flips_bbox_consistently() {
		let mut grid = Grid::new(10, 10, 4, bbox()).unwrap();
		grid.affine_transform(-1.0, 0.0, 1.0, 0.0);
		assert!(grid.bbox().xmin < grid.bbox().xmax);
	}

	#[test]
	fn get_line_interpolates_monotonically_across_a_row() {
		let grid = Grid::new(33, 33, 8, bbox()).unwrap();
		let mut xs = vec![0.0; 33];
		let mut ys = vec![0.0; 33];
		grid.get_line(0, &mut xs, &mut ys);
		for pair in xs.windows(2) {
			assert!(pair[1] > pair[0]);
		}
	}
}
