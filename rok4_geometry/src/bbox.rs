//! Axis-aligned bounding boxes in a named CRS.

use crate::{CoordinateTransformer, Crs};
use anyhow::{Result, ensure};

/// A rectangular extent `[xmin, xmax] x [ymin, ymax]` in a given [`Crs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
	pub xmin: f64,
	pub ymin: f64,
	pub xmax: f64,
	pub ymax: f64,
}

impl BoundingBox {
	/// # Errors
	/// Returns an error if `xmin >= xmax` or `ymin >= ymax`.
	pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
		ensure!(xmin < xmax, "bounding box xmin ({xmin}) must be < xmax ({xmax})");
		ensure!(ymin < ymax, "bounding box ymin ({ymin}) must be < ymax ({ymax})");
		Ok(Self { xmin, ymin, xmax, ymax })
	}

	#[must_use]
	pub fn width(&self) -> f64 {
		self.xmax - self.xmin
	}

	#[must_use]
	pub fn height(&self) -> f64 {
		self.ymax - self.ymin
	}

	#[must_use]
	pub fn intersects(&self, other: &BoundingBox) -> bool {
		self.xmin < other.xmax && self.xmax > other.xmin && self.ymin < other.ymax && self.ymax > other.ymin
	}

	/// Reprojects the box's four corners through `transformer` and returns the
	/// axis-aligned envelope of the result.
	///
	/// The result may not tightly enclose the reprojected shape (a rectangle
	/// in `from` is not generally a rectangle in `to`); callers that need the
	/// true warped outline should sample via [`crate::Grid`] instead.
	///
	/// # Errors
	/// Propagates errors from the underlying coordinate transform.
	pub fn reproject(&self, transformer: &CoordinateTransformer) -> Result<BoundingBox> {
		let mut xs = [self.xmin, self.xmax, self.xmax, self.xmin];
		let mut ys = [self.ymin, self.ymin, self.ymax, self.ymax];
		transformer.transform(&mut xs, &mut ys)?;
		let xmin = xs.iter().copied().fold(f64::INFINITY, f64::min);
		let xmax = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		let ymin = ys.iter().copied().fold(f64::INFINITY, f64::min);
		let ymax = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		BoundingBox::new(xmin, ymin, xmax, ymax)
	}
}

/// A [`BoundingBox`] paired with the [`Crs`] it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBoundingBox {
	pub bbox: BoundingBox,
	pub crs: Crs,
}

impl GeoBoundingBox {
	#[must_use]
	pub fn new(bbox: BoundingBox, crs: Crs) -> Self {
		Self { bbox, crs }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_degenerate_box() {
		assert!(BoundingBox::new(0.0, 0.0, 0.0, 1.0).is_err());
		assert!(BoundingBox::new(0.0, 1.0, 1.0, 0.0).is_err());
	}

	#[test]
	fn width_and_height() {
		let bbox = BoundingBox::new(0.0, 0.0, 10.0, 5.0).unwrap();
		assert_eq!(bbox.width(), 10.0);
		assert_eq!(bbox.height(), 5.0);
	}

	#[test]
	fn intersects() {
		let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
		let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0).unwrap();
		let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0).unwrap();
		assert!(a.intersects(&b));
		assert!(!a.intersects(&c));
	}
}
