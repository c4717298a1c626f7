//! Axum HTTP surface: routes WMS/WMTS query-string requests and the TMS
//! shorthand path onto `rok4_pipeline`'s request parsing and render
//! pipeline, and turns a `ServiceError` into an XML exception response.

use crate::config::Registry;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use rok4_pipeline::capabilities::{LayerCapabilities, wms_capabilities, wmts_capabilities};
use rok4_pipeline::error::{ErrorCode, Service, ServiceError};
use rok4_pipeline::render::{render_get_map, render_get_tile};
use rok4_pipeline::request::{GetFeatureInfoRequest, GetMapRequest, GetTileRequest, Params};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the router serving `registry`'s layers.
#[must_use]
pub fn router(registry: Arc<Registry>) -> Router {
	Router::new().route("/", get(ogc_handler)).route("/{layer}/{tms}/{z}/{x}/{y_ext}", get(tms_handler)).with_state(registry)
}

fn service_of(params: &Params) -> Service {
	match params.get("SERVICE").map(str::to_ascii_uppercase).as_deref() {
		Some("WMTS") => Service::Wmts,
		_ => Service::Wms,
	}
}

fn exception_response(err: ServiceError, service: Service) -> Response {
	let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	(status, [(header::CONTENT_TYPE, "text/xml")], err.to_xml(service)).into_response()
}

fn image_response(format: &str, body: Vec<u8>) -> Response {
	(StatusCode::OK, [(header::CONTENT_TYPE, format.to_string())], body).into_response()
}

async fn ogc_handler(State(registry): State<Arc<Registry>>, Query(raw): Query<HashMap<String, String>>) -> Response {
	let params = Params::new(raw);
	let service = service_of(&params);
	let request = params.get("REQUEST").map(str::to_ascii_uppercase);

	match request.as_deref() {
		Some("GETCAPABILITIES") => handle_get_capabilities(&registry, service),
		Some("GETMAP") => handle_get_map(&registry, &params).await,
		Some("GETFEATUREINFO") => handle_get_feature_info(&registry, &params).await,
		Some("GETTILE") => handle_get_tile(&registry, &params).await,
		_ => exception_response(ServiceError::new(ErrorCode::OperationNotSupported, "unknown or missing REQUEST").with_locator("REQUEST"), service),
	}
}

fn layer_extent(layer: &rok4_pipeline::render::LayerSource) -> rok4_geometry::BoundingBox {
	let tile_matrix = &layer.pyramid.tile_matrix_set.levels()[0];
	let width = tile_matrix.matrix_width as f64 * f64::from(tile_matrix.tile_width) * tile_matrix.resolution;
	let height = tile_matrix.matrix_height as f64 * f64::from(tile_matrix.tile_height) * tile_matrix.resolution;
	rok4_geometry::BoundingBox { xmin: tile_matrix.x0, ymin: tile_matrix.y0 - height, xmax: tile_matrix.x0 + width, ymax: tile_matrix.y0 }
}

fn handle_get_capabilities(registry: &Registry, service: Service) -> Response {
	let layers: Vec<LayerCapabilities> = registry
		.iter()
		.map(|(name, layer)| LayerCapabilities {
			name,
			title: &layer.title,
			crs: layer.source.pyramid.tile_matrix_set.crs.code(),
			bbox: layer_extent(&layer.source),
			formats: &["image/png", "image/jpeg", "image/tiff"],
		})
		.collect();

	let xml = match service {
		Service::Wms => wms_capabilities(&layers),
		Service::Wmts => wmts_capabilities(&layers, "default"),
	};
	(StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], xml).into_response()
}

async fn handle_get_map(registry: &Registry, params: &Params) -> Response {
	let req = match GetMapRequest::parse(params) {
		Ok(req) => req,
		Err(err) => return exception_response(err, Service::Wms),
	};
	let Some(layer_name) = req.layers.first() else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, "LAYERS must name at least one layer").with_locator("LAYERS"), Service::Wms);
	};
	let Some(layer) = registry.get(layer_name) else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, format!("unknown layer '{layer_name}'")).with_locator("LAYERS"), Service::Wms);
	};

	match render_get_map(&layer.source, &req, None).await {
		Ok(blob) => image_response(&req.format, blob.into_vec()),
		Err(err) => exception_response(err, Service::Wms),
	}
}

async fn handle_get_feature_info(registry: &Registry, params: &Params) -> Response {
	let req = match GetFeatureInfoRequest::parse(params) {
		Ok(req) => req,
		Err(err) => return exception_response(err, Service::Wms),
	};
	let Some(layer_name) = req.query_layers.first() else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, "QUERY_LAYERS must name at least one layer").with_locator("QUERY_LAYERS"), Service::Wms);
	};
	let Some(layer) = registry.get(layer_name) else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, format!("unknown layer '{layer_name}'")).with_locator("QUERY_LAYERS"), Service::Wms);
	};

	match rok4_pipeline::render::get_feature_info(&layer.source, &req, None).await {
		Ok(values) => {
			let body = values.iter().map(f32::to_string).collect::<Vec<_>>().join(",");
			(StatusCode::OK, [(header::CONTENT_TYPE, req.info_format.clone())], body).into_response()
		}
		Err(err) => exception_response(err, Service::Wms),
	}
}

async fn handle_get_tile(registry: &Registry, params: &Params) -> Response {
	let req = match GetTileRequest::parse(params) {
		Ok(req) => req,
		Err(err) => return exception_response(err, Service::Wmts),
	};
	let Some(layer) = registry.get(&req.layer) else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, format!("unknown layer '{}'", req.layer)).with_locator("LAYER"), Service::Wmts);
	};

	match render_get_tile(&layer.source, &req).await {
		Ok(blob) => image_response(&req.format, blob.into_vec()),
		Err(err) => exception_response(err, Service::Wmts),
	}
}

fn ext_to_format(ext: &str) -> &'static str {
	match ext.to_ascii_lowercase().as_str() {
		"jpg" | "jpeg" => "image/jpeg",
		"tif" | "tiff" => "image/tiff",
		_ => "image/png",
	}
}

/// `GET /{layer}/{tms}/{z}/{x}/{y}.{ext}`: the TMS shorthand, mapped onto
/// the same `render_get_tile` path as a WMTS `GetTile`.
async fn tms_handler(State(registry): State<Arc<Registry>>, Path((layer, tms, z, x, y_ext)): Path<(String, String, String, String, String)>) -> Response {
	let (y, ext) = match y_ext.rsplit_once('.') {
		Some((y, ext)) => (y, ext),
		None => (y_ext.as_str(), "png"),
	};
	let format = ext_to_format(ext);

	let Some(registered) = registry.get(&layer) else {
		return exception_response(ServiceError::new(ErrorCode::LayerNotDefined, format!("unknown layer '{layer}'")).with_locator("layer"), Service::Wmts);
	};
	let (Ok(tile_col), Ok(tile_row)) = (x.parse::<u64>(), y.parse::<u64>()) else {
		return exception_response(ServiceError::new(ErrorCode::InvalidParameter, "x/y must be integers").with_locator("x,y"), Service::Wmts);
	};

	let req = GetTileRequest { layer, style: "default".to_string(), tile_matrix_set: tms, tile_matrix: z, tile_row, tile_col, format: format.to_string() };

	match render_get_tile(&registered.source, &req).await {
		Ok(blob) => image_response(format, blob.into_vec()),
		Err(err) => exception_response(err, Service::Wmts),
	}
}
