//! Parses WMS `GetMap`/`GetFeatureInfo` and WMTS `GetTile` query strings.
//!
//! OGC services treat query keys case-insensitively (`CRS`, `crs` and `Crs`
//! all name the same parameter); [`Params`] normalizes lookups accordingly.

use crate::error::{ErrorCode, ServiceError};
use rok4_geometry::BoundingBox;
use std::collections::HashMap;

/// A query string with case-insensitive key lookup.
pub struct Params(HashMap<String, String>);

impl Params {
	#[must_use]
	pub fn new(raw: HashMap<String, String>) -> Self {
		Params(raw.into_iter().map(|(k, v)| (k.to_ascii_uppercase(), v)).collect())
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(&key.to_ascii_uppercase()).map(String::as_str)
	}

	pub fn require(&self, key: &str) -> Result<&str, ServiceError> {
		self
			.get(key)
			.ok_or_else(|| ServiceError::new(ErrorCode::MissingParameter, format!("missing required parameter {key}")).with_locator(key))
	}

	fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<T, ServiceError> {
		self
			.require(key)?
			.parse()
			.map_err(|_| ServiceError::new(ErrorCode::InvalidParameter, format!("invalid value for {key}")).with_locator(key))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
	pub layers: Vec<String>,
	pub styles: Vec<String>,
	pub crs: String,
	pub bbox: BoundingBox,
	pub width: u32,
	pub height: u32,
	pub format: String,
	pub transparent: bool,
}

impl GetMapRequest {
	pub fn parse(params: &Params) -> Result<Self, ServiceError> {
		let layers = split_list(params.require("LAYERS")?);
		let styles = params.get("STYLES").map(split_list).unwrap_or_default();
		let crs = params
			.get("CRS")
			.or_else(|| params.get("SRS"))
			.ok_or_else(|| ServiceError::new(ErrorCode::MissingParameter, "missing required parameter CRS").with_locator("CRS"))?
			.to_string();
		let bbox = parse_bbox(params)?;
		let width: u32 = params.parse("WIDTH")?;
		let height: u32 = params.parse("HEIGHT")?;
		if width == 0 || height == 0 {
			return Err(ServiceError::new(ErrorCode::InvalidParameter, "WIDTH and HEIGHT must be positive").with_locator("WIDTH,HEIGHT"));
		}
		let format = params.require("FORMAT")?.to_string();
		let transparent = params.get("TRANSPARENT").is_some_and(|v| v.eq_ignore_ascii_case("true"));

		Ok(GetMapRequest { layers, styles, crs, bbox, width, height, format, transparent })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetFeatureInfoRequest {
	pub map: GetMapRequest,
	pub query_layers: Vec<String>,
	pub i: u32,
	pub j: u32,
	pub info_format: String,
}

impl GetFeatureInfoRequest {
	pub fn parse(params: &Params) -> Result<Self, ServiceError> {
		let map = GetMapRequest::parse(params)?;
		let query_layers = split_list(params.require("QUERY_LAYERS")?);
		let i: u32 = params.parse("I")?;
		let j: u32 = params.parse("J")?;
		if i >= map.width || j >= map.height {
			return Err(ServiceError::new(ErrorCode::InvalidPoint, "I/J outside the requested map window").with_locator("I,J"));
		}
		let info_format = params.get("INFO_FORMAT").unwrap_or("text/plain").to_string();
		Ok(GetFeatureInfoRequest { map, query_layers, i, j, info_format })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetTileRequest {
	pub layer: String,
	pub style: String,
	pub tile_matrix_set: String,
	pub tile_matrix: String,
	pub tile_row: u64,
	pub tile_col: u64,
	pub format: String,
}

impl GetTileRequest {
	pub fn parse(params: &Params) -> Result<Self, ServiceError> {
		Ok(GetTileRequest {
			layer: params.require("LAYER")?.to_string(),
			style: params.get("STYLE").unwrap_or("default").to_string(),
			tile_matrix_set: params.require("TILEMATRIXSET")?.to_string(),
			tile_matrix: params.require("TILEMATRIX")?.to_string(),
			tile_row: params.parse("TILEROW")?,
			tile_col: params.parse("TILECOL")?,
			format: params.require("FORMAT")?.to_string(),
		})
	}
}

fn split_list(raw: &str) -> Vec<String> {
	raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_bbox(params: &Params) -> Result<BoundingBox, ServiceError> {
	let raw = params.require("BBOX")?;
	let parts: Vec<&str> = raw.split(',').collect();
	if parts.len() != 4 {
		return Err(ServiceError::new(ErrorCode::InvalidParameter, "BBOX must have 4 comma-separated values").with_locator("BBOX"));
	}
	let mut values = [0.0_f64; 4];
	for (slot, part) in values.iter_mut().zip(parts.iter()) {
		*slot = part
			.trim()
			.parse()
			.map_err(|_| ServiceError::new(ErrorCode::InvalidParameter, "BBOX values must be numeric").with_locator("BBOX"))?;
	}
	let [xmin, ymin, xmax, ymax] = values;
	if xmin >= xmax || ymin >= ymax {
		return Err(ServiceError::new(ErrorCode::InvalidParameter, "BBOX min must be less than max").with_locator("BBOX"));
	}
	Ok(BoundingBox { xmin, ymin, xmax, ymax })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn params(pairs: &[(&str, &str)]) -> Params {
		Params::new(pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect())
	}

	#[test]
	fn lookup_is_case_insensitive() {
		let p = params(&[("crs", "EPSG:3857")]);
		assert_eq!(p.get("CRS"), Some("EPSG:3857"));
		assert_eq!(p.get("Crs"), Some("EPSG:3857"));
	}

	#[test]
	fn parses_a_well_formed_get_map_request() {
		let p = params(&[
			("LAYERS", "ortho"),
			("STYLES", ""),
			("CRS", "EPSG:3857"),
			("BBOX", "0,0,256,256"),
			("WIDTH", "256"),
			("HEIGHT", "256"),
			("FORMAT", "image/png"),
		]);
		let req = GetMapRequest::parse(&p).unwrap();
		assert_eq!(req.layers, vec!["ortho"]);
		assert_eq!(req.bbox, BoundingBox { xmin: 0.0, ymin: 0.0, xmax: 256.0, ymax: 256.0 });
		assert_eq!(req.width, 256);
		assert!(!req.transparent);
	}

	#[test]
	fn missing_layers_is_a_missing_parameter_error() {
		let p = params(&[("CRS", "EPSG:3857"), ("BBOX", "0,0,1,1"), ("WIDTH", "1"), ("HEIGHT", "1"), ("FORMAT", "image/png")]);
		let err = GetMapRequest::parse(&p).unwrap_err();
		assert_eq!(err.code, ErrorCode::MissingParameter);
	}

	#[test]
	fn malformed_bbox_is_an_invalid_parameter_error() {
		let p = params(&[
			("LAYERS", "ortho"),
			("CRS", "EPSG:3857"),
			("BBOX", "0,0,256"),
			("WIDTH", "256"),
			("HEIGHT", "256"),
			("FORMAT", "image/png"),
		]);
		let err = GetMapRequest::parse(&p).unwrap_err();
		assert_eq!(err.code, ErrorCode::InvalidParameter);
	}

	#[test]
	fn get_feature_info_rejects_out_of_window_point() {
		let p = params(&[
			("LAYERS", "ortho"),
			("CRS", "EPSG:3857"),
			("BBOX", "0,0,256,256"),
			("WIDTH", "256"),
			("HEIGHT", "256"),
			("FORMAT", "image/png"),
			("QUERY_LAYERS", "ortho"),
			("I", "300"),
			("J", "10"),
		]);
		let err = GetFeatureInfoRequest::parse(&p).unwrap_err();
		assert_eq!(err.code, ErrorCode::InvalidPoint);
	}

	#[test]
	fn get_tile_request_parses_numeric_fields() {
		let p = params(&[
			("LAYER", "ortho"),
			("TILEMATRIXSET", "WebMercator"),
			("TILEMATRIX", "10"),
			("TILEROW", "511"),
			("TILECOL", "511"),
			("FORMAT", "image/png"),
		]);
		let req = GetTileRequest::parse(&p).unwrap();
		assert_eq!(req.tile_row, 511);
		assert_eq!(req.style, "default");
	}
}
