//! Coordinate reference systems and the process-wide coordinate transform facility.

use anyhow::{Context, Result, bail};
use std::sync::Mutex;

/// A coordinate reference system, identified by an authority code such as
/// `EPSG:3857`, `CRS:84` or `IGNF:LAMB93`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs {
	code: String,
}

impl Crs {
	#[must_use]
	pub fn new(code: impl Into<String>) -> Self {
		Self { code: code.into() }
	}

	#[must_use]
	pub fn code(&self) -> &str {
		&self.code
	}

	/// `true` for CRSs whose axes are expressed in longitude/latitude (degrees)
	/// rather than projected units (meters).
	#[must_use]
	pub fn is_lon_lat(&self) -> bool {
		matches!(self.code.as_str(), "CRS:84" | "EPSG:4326")
	}

	/// `true` if the code can be resolved by PROJ through GDAL's `SpatialRef`.
	///
	/// This is a syntactic check only (authority present and numeric code), not
	/// a verification that PROJ actually has the definition installed.
	#[must_use]
	pub fn proj4_compatible(&self) -> bool {
		let Some((authority, id)) = self.code.split_once(':') else {
			return false;
		};
		!authority.is_empty() && !id.is_empty()
	}
}

impl std::fmt::Display for Crs {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.code)
	}
}

/// Converts points between two [`Crs`] values.
///
/// Wraps a `gdal::spatial_ref::CoordTransform`, which is not `Sync`: every
/// call serializes through an internal mutex rather than requiring callers to
/// coordinate access themselves.
pub struct CoordinateTransformer {
	inner: Mutex<Backend>,
}

enum Backend {
	Gdal {
		transform: gdal::spatial_ref::CoordTransform,
	},
	#[cfg(feature = "affine")]
	Identity,
}

impl CoordinateTransformer {
	/// Builds a transformer from `from` to `to`.
	///
	/// # Errors
	/// Returns an error if either CRS code cannot be resolved by PROJ, or if
	/// GDAL cannot construct a transform between them.
	pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
		#[cfg(feature = "affine")]
		if from == to {
			return Ok(Self {
				inner: Mutex::new(Backend::Identity),
			});
		}

		let src = spatial_ref_from_crs(from)?;
		let dst = spatial_ref_from_crs(to)?;
		let transform = gdal::spatial_ref::CoordTransform::new(&src, &dst)
			.with_context(|| format!("building coordinate transform from {from} to {to}"))?;
		Ok(Self {
			inner: Mutex::new(Backend::Gdal { transform }),
		})
	}

	/// Transforms a batch of points in place.
	///
	/// # Errors
	/// Returns an error if the underlying PROJ transform fails (e.g. a point
	/// falls outside the domain of validity of either CRS).
	pub fn transform(&self, xs: &mut [f64], ys: &mut [f64]) -> Result<()> {
		let mut zs = vec![0.0_f64; xs.len()];
		let mut guard = self.inner.lock().unwrap();
		match &mut *guard {
			Backend::Gdal { transform } => {
				transform
					.transform_coords(xs, ys, &mut zs)
					.context("PROJ coordinate transform failed")?;
			}
			#[cfg(feature = "affine")]
			Backend::Identity => {}
		}
		Ok(())
	}

	/// Transforms a single point.
	///
	/// # Errors
	/// See [`CoordinateTransformer::transform`].
	pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
		let mut xs = [x];
		let mut ys = [y];
		self.transform(&mut xs, &mut ys)?;
		Ok((xs[0], ys[0]))
	}
}

fn spatial_ref_from_crs(crs: &Crs) -> Result<gdal::spatial_ref::SpatialRef> {
	if !crs.proj4_compatible() {
		bail!("CRS code '{crs}' is not an authority:code pair");
	}
	let (authority, id) = crs.code().split_once(':').unwrap();
	match authority {
		"EPSG" => {
			let code: u32 = id.parse().with_context(|| format!("parsing EPSG code in '{crs}'"))?;
			gdal::spatial_ref::SpatialRef::from_epsg(code).with_context(|| format!("resolving {crs} via PROJ"))
		}
		_ => gdal::spatial_ref::SpatialRef::from_definition(crs.code()).with_context(|| format!("resolving {crs} via PROJ")),
	}
}
