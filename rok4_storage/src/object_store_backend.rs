//! S3-compatible object storage backend.
//!
//! Covers both plain S3 and Ceph RADOS pools exposed through Ceph's
//! S3-compatible RADOS gateway (RGW) — the same client, pointed at a
//! different endpoint. The original server talks to Ceph through `librados`
//! directly; no Rust binding for that native protocol is in use anywhere in
//! this codebase's dependency stack, and RGW is the standard way Ceph
//! clusters expose object pools to S3 clients, so it is the backend used
//! here for both `ROK4_S3_*` and `ROK4_CEPH_*` configuration.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, ObjectStore, PutPayload};
use rok4_core::Blob;
use rok4_geometry::LevelStorage;
use std::sync::Arc;

/// Configuration for an S3-compatible bucket.
pub struct ObjectStoreConfig {
	pub bucket: String,
	pub endpoint: Option<String>,
	pub region: Option<String>,
	pub access_key: String,
	pub secret_key: String,
}

/// Reads and writes tile objects in an S3-compatible bucket.
pub struct ObjectStoreBackend {
	store: Arc<dyn ObjectStore>,
	description: String,
}

impl std::fmt::Debug for ObjectStoreBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObjectStoreBackend").field("description", &self.description).finish()
	}
}

impl ObjectStoreBackend {
	/// # Errors
	/// Returns an error if the bucket client cannot be built from `config`.
	pub fn new(config: ObjectStoreConfig) -> Result<Self> {
		let mut builder = AmazonS3Builder::new()
			.with_bucket_name(&config.bucket)
			.with_access_key_id(&config.access_key)
			.with_secret_access_key(&config.secret_key);
		if let Some(endpoint) = &config.endpoint {
			builder = builder.with_endpoint(endpoint).with_allow_http(endpoint.starts_with("http://"));
		}
		if let Some(region) = &config.region {
			builder = builder.with_region(region);
		}
		let description = format!(
			"s3://{}{}",
			config.bucket,
			config.endpoint.as_deref().map(|e| format!(" ({e})")).unwrap_or_default()
		);
		let store = builder.build().with_context(|| format!("building S3 client for bucket {}", config.bucket))?;
		Ok(Self { store: Arc::new(store), description })
	}
}

#[async_trait]
impl LevelStorage for ObjectStoreBackend {
	async fn read(&self, object: &str, offset: u64, length: u64) -> Result<Blob> {
		log::trace!("read {length} bytes at offset {offset} from {object} in {}", self.description);
		let path = ObjectPath::from(object);
		let range = GetRange::Bounded(offset..offset + length);
		let options = GetOptions { range: Some(range), ..Default::default() };
		let result = self
			.store
			.get_opts(&path, options)
			.await
			.with_context(|| format!("reading object {object} from {}", self.description))?;
		let bytes = result.bytes().await?;
		Ok(Blob::from(bytes.to_vec()))
	}

	async fn write(&self, object: &str, offset: u64, data: &Blob) -> Result<()> {
		if offset != 0 {
			bail!("object storage backend {} only supports whole-object writes, got offset {offset}", self.description);
		}
		let path = ObjectPath::from(object);
		self
			.store
			.put(&path, PutPayload::from_bytes(data.as_slice().to_vec().into()))
			.await
			.with_context(|| format!("writing object {object} to {}", self.description))?;
		Ok(())
	}

	async fn exists(&self, object: &str) -> Result<bool> {
		let path = ObjectPath::from(object);
		match self.store.head(&path).await {
			Ok(_) => Ok(true),
			Err(object_store::Error::NotFound { .. }) => Ok(false),
			Err(err) => Err(err).with_context(|| format!("checking object {object} in {}", self.description)),
		}
	}

	fn describe(&self) -> String {
		self.description.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn describe_names_bucket_and_rgw_endpoint() {
		let backend = ObjectStoreBackend::new(ObjectStoreConfig {
			bucket: "pyramids".into(),
			endpoint: Some("https://ceph-rgw.example.com".into()),
			region: None,
			access_key: "key".into(),
			secret_key: "secret".into(),
		})
		.unwrap();
		let description = backend.describe();
		assert!(description.contains("pyramids"));
		assert!(description.contains("ceph-rgw.example.com"));
	}

	#[test]
	fn describe_plain_s3_has_no_endpoint_suffix() {
		let backend = ObjectStoreBackend::new(ObjectStoreConfig {
			bucket: "pyramids".into(),
			endpoint: None,
			region: Some("eu-west-1".into()),
			access_key: "key".into(),
			secret_key: "secret".into(),
		})
		.unwrap();
		assert_eq!(backend.describe(), "s3://pyramids");
	}
}
