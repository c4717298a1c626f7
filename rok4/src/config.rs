//! Server configuration: which layers are served, and where their pyramids
//! live on disk. Loaded from YAML, mirroring the reference crate's own
//! `Config::from_path`/`Config::from_string` pattern.

use anyhow::{Context, Result, bail};
use rok4_geometry::{Crs, Level, Pyramid, SampleFormat, TileMatrix, TileMatrixSet};
use rok4_image::tile_source::{SlabShape, TileFormat};
use rok4_pipeline::render::LayerSource;
use rok4_storage::FileBackend;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
	pub listen: SocketAddr,
	pub layers: Vec<LayerConfig>,
}

impl ServerConfig {
	/// # Errors
	/// Returns an error if `path` cannot be read or does not parse as the
	/// expected YAML shape.
	pub fn from_path(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).with_context(|| format!("reading server config {path:?}"))?;
		Self::from_str(&raw)
	}

	/// # Errors
	/// Returns an error if `raw` does not parse as the expected YAML shape.
	pub fn from_str(raw: &str) -> Result<Self> {
		serde_yaml_ng::from_str(raw).context("parsing server config")
	}
}

#[derive(Debug, Deserialize)]
pub struct LayerConfig {
	pub name: String,
	pub title: String,
	pub crs: String,
	pub tile_matrix_set: String,
	pub levels: Vec<LevelConfig>,
	pub channels: u8,
	pub sample_format: SampleFormatConfig,
	#[serde(default)]
	pub nodata: Option<Vec<f64>>,
	pub storage_root: PathBuf,
	#[serde(default)]
	pub slab_shape: SlabShapeConfig,
	pub tile_format: TileFormatConfig,
}

#[derive(Debug, Deserialize)]
pub struct LevelConfig {
	pub id: String,
	pub resolution: f64,
	pub x0: f64,
	pub y0: f64,
	pub tile_width: u32,
	pub tile_height: u32,
	pub matrix_width: u64,
	pub matrix_height: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormatConfig {
	UInt8,
	Float32,
}

impl From<SampleFormatConfig> for SampleFormat {
	fn from(value: SampleFormatConfig) -> Self {
		match value {
			SampleFormatConfig::UInt8 => SampleFormat::UInt8,
			SampleFormatConfig::Float32 => SampleFormat::Float32,
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormatConfig {
	Raw,
	Lzw,
	PackBits,
	Zip,
	Jpeg,
	Png,
}

impl From<TileFormatConfig> for TileFormat {
	fn from(value: TileFormatConfig) -> Self {
		match value {
			TileFormatConfig::Raw => TileFormat::Raw,
			TileFormatConfig::Lzw => TileFormat::Lzw,
			TileFormatConfig::PackBits => TileFormat::PackBits,
			TileFormatConfig::Zip => TileFormat::Zip,
			TileFormatConfig::Jpeg => TileFormat::Jpeg,
			TileFormatConfig::Png => TileFormat::Png,
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlabShapeConfig {
	pub width: u32,
	pub height: u32,
}

impl Default for SlabShapeConfig {
	fn default() -> Self {
		Self { width: 16, height: 16 }
	}
}

impl From<SlabShapeConfig> for SlabShape {
	fn from(value: SlabShapeConfig) -> Self {
		SlabShape { width: value.width, height: value.height }
	}
}

/// A served layer, bound to its pyramid and ready to answer requests.
pub struct RegisteredLayer {
	pub title: String,
	pub source: LayerSource,
}

/// The set of layers this server instance serves, keyed by `LAYER`/TMS path
/// name.
pub struct Registry(HashMap<String, RegisteredLayer>);

impl Registry {
	/// # Errors
	/// Returns an error if a layer's storage root is not an absolute,
	/// existing directory, or its tile matrix levels are malformed.
	pub fn build(config: &ServerConfig) -> Result<Self> {
		let mut layers = HashMap::new();
		for layer in &config.layers {
			if layers.contains_key(&layer.name) {
				bail!("duplicate layer name '{}'", layer.name);
			}
			layers.insert(layer.name.clone(), build_layer(layer)?);
		}
		Ok(Registry(layers))
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&RegisteredLayer> {
		self.0.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredLayer)> {
		self.0.iter()
	}
}

fn build_layer(layer: &LayerConfig) -> Result<RegisteredLayer> {
	let crs = Crs::new(layer.crs.clone());
	let tile_matrices: Result<Vec<TileMatrix>> = layer
		.levels
		.iter()
		.map(|level| {
			TileMatrix::new(level.id.clone(), level.resolution, level.x0, level.y0, level.tile_width, level.tile_height, level.matrix_width, level.matrix_height)
				.with_context(|| format!("tile matrix '{}' of layer '{}'", level.id, layer.name))
		})
		.collect();
	let tile_matrix_set = TileMatrixSet::new(layer.tile_matrix_set.clone(), crs, tile_matrices?).with_context(|| format!("tile matrix set of layer '{}'", layer.name))?;

	let storage = Arc::new(FileBackend::new(&layer.storage_root).with_context(|| format!("storage root of layer '{}'", layer.name))?);
	let levels = tile_matrix_set
		.levels()
		.iter()
		.map(|tile_matrix| Level {
			tile_matrix_id: tile_matrix.id.clone(),
			storage: storage.clone(),
			format: layer.sample_format.into(),
			channels: layer.channels,
			nodata: layer.nodata.clone(),
		})
		.collect();

	let pyramid = Pyramid::new(Arc::new(tile_matrix_set), levels).with_context(|| format!("pyramid of layer '{}'", layer.name))?;
	Ok(RegisteredLayer {
		title: layer.title.clone(),
		source: LayerSource { pyramid, slab_shape: layer.slab_shape.into(), tile_format: layer.tile_format.into() },
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_minimal_server_config() {
		let yaml = r#"
listen: "127.0.0.1:8080"
layers:
  - name: ortho
    title: Orthophoto
    crs: "EPSG:3857"
    tile_matrix_set: WebMercator
    channels: 3
    sample_format: uint8
    storage_root: /data/ortho
    tile_format: raw
    levels:
      - id: "0"
        resolution: 156543.03392804097
        x0: -20037508.342789244
        y0: 20037508.342789244
        tile_width: 256
        tile_height: 256
        matrix_width: 1
        matrix_height: 1
"#;
		let config = ServerConfig::from_str(yaml).unwrap();
		assert_eq!(config.listen.to_string(), "127.0.0.1:8080");
		assert_eq!(config.layers.len(), 1);
		assert_eq!(config.layers[0].name, "ortho");
	}

	#[test]
	fn rejects_duplicate_layer_names() {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path().to_str().unwrap();
		let yaml = format!(
			r#"
listen: "127.0.0.1:8080"
layers:
  - name: ortho
    title: A
    crs: "EPSG:3857"
    tile_matrix_set: WebMercator
    channels: 1
    sample_format: uint8
    storage_root: {root}
    tile_format: raw
    levels:
      - id: "0"
        resolution: 1.0
        x0: 0.0
        y0: 0.0
        tile_width: 256
        tile_height: 256
        matrix_width: 1
        matrix_height: 1
  - name: ortho
    title: B
    crs: "EPSG:3857"
    tile_matrix_set: WebMercator
    channels: 1
    sample_format: uint8
    storage_root: {root}
    tile_format: raw
    levels:
      - id: "0"
        resolution: 1.0
        x0: 0.0
        y0: 0.0
        tile_width: 256
        tile_height: 256
        matrix_width: 1
        matrix_height: 1
"#
		);
		let config = ServerConfig::from_str(&yaml).unwrap();
		assert!(Registry::build(&config).is_err());
	}
}
