//! OpenStack Swift storage backend.
//!
//! Swift exposes objects over plain HTTP with range-request support, so this
//! backend sends the same `Range: bytes=...` requests as
//! `rok4_core::io::DataReaderHttp`, generalized to PUT and HEAD and wired
//! through the TempAuth token dance (`X-Auth-User`/`X-Auth-Key` against
//! `ROK4_SWIFT_AUTHURL`, producing a storage URL and an `X-Auth-Token`).

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rok4_core::Blob;
use rok4_geometry::LevelStorage;
use std::time::Duration;
use tokio::sync::RwLock;

/// A cached TempAuth token and the storage URL it was issued for.
struct Session {
	storage_url: Url,
	token: String,
}

/// Reads and writes tile objects in an OpenStack Swift container.
pub struct SwiftBackend {
	client: Client,
	auth_url: Url,
	user: String,
	password: String,
	container: String,
	session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for SwiftBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SwiftBackend")
			.field("auth_url", &self.auth_url)
			.field("container", &self.container)
			.finish()
	}
}

impl SwiftBackend {
	/// # Errors
	/// Returns an error if `auth_url` does not have an `http`/`https` scheme.
	pub fn new(auth_url: Url, user: String, password: String, container: String) -> Result<Self> {
		match auth_url.scheme() {
			"http" | "https" => {}
			_ => bail!("swift auth url has wrong scheme {auth_url}"),
		}
		let client = Client::builder().tcp_keepalive(Duration::from_secs(600)).use_rustls_tls().build()?;
		Ok(Self { client, auth_url, user, password, container, session: RwLock::new(None) })
	}

	async fn authenticate(&self) -> Result<Session> {
		let response = self
			.client
			.get(self.auth_url.clone())
			.header("X-Auth-User", &self.user)
			.header("X-Auth-Key", &self.password)
			.send()
			.await
			.with_context(|| format!("authenticating against {}", self.auth_url))?;
		if !response.status().is_success() {
			bail!("swift auth against {} failed with status {}", self.auth_url, response.status());
		}
		let storage_url = response
			.headers()
			.get("X-Storage-Url")
			.ok_or_else(|| anyhow!("swift auth response is missing X-Storage-Url"))?
			.to_str()?
			.parse()
			.context("parsing X-Storage-Url")?;
		let token = response
			.headers()
			.get("X-Auth-Token")
			.ok_or_else(|| anyhow!("swift auth response is missing X-Auth-Token"))?
			.to_str()?
			.to_string();
		Ok(Session { storage_url, token })
	}

	/// Returns a cached token, re-authenticating once on first use.
	async fn token(&self) -> Result<(Url, String)> {
		if let Some(session) = self.session.read().await.as_ref() {
			return Ok((session.storage_url.clone(), session.token.clone()));
		}
		let session = self.authenticate().await?;
		let result = (session.storage_url.clone(), session.token.clone());
		*self.session.write().await = Some(session);
		Ok(result)
	}

	fn object_url(storage_url: &Url, container: &str, object: &str) -> Result<Url> {
		storage_url
			.join(&format!("{container}/{object}"))
			.with_context(|| format!("building object url for {object}"))
	}
}

#[async_trait]
impl LevelStorage for SwiftBackend {
	async fn read(&self, object: &str, offset: u64, length: u64) -> Result<Blob> {
		log::trace!("read {length} bytes at offset {offset} from {object} in container {}", self.container);
		let (storage_url, token) = self.token().await?;
		let url = Self::object_url(&storage_url, &self.container, object)?;
		let range = format!("bytes={offset}-{}", offset + length - 1);
		let response = self
			.client
			.get(url.clone())
			.header("X-Auth-Token", token)
			.header("Range", range)
			.send()
			.await
			.with_context(|| format!("reading object {object} from {url}"))?;
		if response.status() != StatusCode::PARTIAL_CONTENT {
			bail!("expected 206 reading {object}, got {}", response.status());
		}
		let bytes = response.bytes().await?;
		Ok(Blob::from(&*bytes))
	}

	async fn write(&self, object: &str, offset: u64, data: &Blob) -> Result<()> {
		if offset != 0 {
			bail!("swift backend only supports whole-object writes, got offset {offset}");
		}
		let (storage_url, token) = self.token().await?;
		let url = Self::object_url(&storage_url, &self.container, object)?;
		let response = self
			.client
			.put(url.clone())
			.header("X-Auth-Token", token)
			.body(data.as_slice().to_vec())
			.send()
			.await
			.with_context(|| format!("writing object {object} to {url}"))?;
		if !response.status().is_success() {
			bail!("writing object {object} to {url} failed with status {}", response.status());
		}
		Ok(())
	}

	async fn exists(&self, object: &str) -> Result<bool> {
		let (storage_url, token) = self.token().await?;
		let url = Self::object_url(&storage_url, &self.container, object)?;
		let response = self
			.client
			.head(url.clone())
			.header("X-Auth-Token", token)
			.send()
			.await
			.with_context(|| format!("checking object {object} at {url}"))?;
		Ok(response.status().is_success())
	}

	fn describe(&self) -> String {
		format!("swift://{}/{}", self.auth_url, self.container)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_non_http_auth_url() {
		let auth_url = Url::parse("ftp://swift.example.com/auth/v1.0").unwrap();
		let result = SwiftBackend::new(auth_url, "user".into(), "key".into(), "tiles".into());
		assert!(result.is_err());
	}

	#[test]
	fn describe_includes_container() {
		let auth_url = Url::parse("https://swift.example.com/auth/v1.0").unwrap();
		let backend = SwiftBackend::new(auth_url, "user".into(), "key".into(), "tiles".into()).unwrap();
		assert!(backend.describe().contains("tiles"));
	}
}
