//! Local file storage backend.
//!
//! Tiles live under a root directory as plain files, addressed by a
//! backend-relative object name (conventionally the ROK4 slab path, e.g.
//! `IMAGE/level_12/00/01/AB.tif`). Grounded on the directory-tree layout
//! idiom used to lay out tile files on disk, generalized from whole-file
//! reads to byte-range reads over a shared storage handle.

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use rok4_core::Blob;
use rok4_geometry::LevelStorage;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Reads and writes tile objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
	root: PathBuf,
}

impl FileBackend {
	/// # Errors
	/// Returns an error if `root` is not an absolute, existing directory.
	pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
		let root = root.into();
		ensure!(root.is_absolute(), "storage root {root:?} must be absolute");
		ensure!(root.is_dir(), "storage root {root:?} is not a directory");
		Ok(Self { root })
	}

	fn resolve(&self, object: &str) -> Result<PathBuf> {
		let relative = Path::new(object);
		for component in relative.components() {
			match component {
				Component::Normal(_) => {}
				other => bail!("object name {object:?} has an invalid path component {other:?}"),
			}
		}
		Ok(self.root.join(relative))
	}
}

#[async_trait]
impl LevelStorage for FileBackend {
	async fn read(&self, object: &str, offset: u64, length: u64) -> Result<Blob> {
		log::trace!("read {length} bytes at offset {offset} from {object}");
		let path = self.resolve(object)?;
		let mut file = fs::File::open(&path)
			.await
			.with_context(|| format!("opening {path:?} to read object {object}"))?;
		file.seek(SeekFrom::Start(offset)).await?;
		let mut buf = vec![0u8; usize::try_from(length)?];
		file.read_exact(&mut buf)
			.await
			.with_context(|| format!("reading {length} bytes at offset {offset} from {path:?}"))?;
		Ok(Blob::from(&buf))
	}

	async fn write(&self, object: &str, offset: u64, data: &Blob) -> Result<()> {
		log::trace!("write {} bytes at offset {offset} to {object}", data.len());
		let path = self.resolve(object)?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}
		let mut file = fs::OpenOptions::new()
			.create(true)
			.write(true)
			.open(&path)
			.await
			.with_context(|| format!("opening {path:?} to write object {object}"))?;
		file.seek(SeekFrom::Start(offset)).await?;
		file.write_all(data.as_slice()).await?;
		Ok(())
	}

	async fn exists(&self, object: &str) -> Result<bool> {
		let path = self.resolve(object)?;
		Ok(fs::try_exists(&path).await?)
	}

	fn describe(&self) -> String {
		format!("file://{}", self.root.display())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn writes_then_reads_back() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::new(dir.path()).unwrap();
		let data = Blob::from(b"hello pyramid".as_slice());
		backend.write("level_0/00/00/AA.tif", 0, &data).await.unwrap();
		assert!(backend.exists("level_0/00/00/AA.tif").await.unwrap());

		let read = backend.read("level_0/00/00/AA.tif", 0, data.len()).await.unwrap();
		assert_eq!(read.as_slice(), data.as_slice());
	}

	#[tokio::test]
	async fn rejects_path_traversal() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::new(dir.path()).unwrap();
		let result = backend.read("../secret", 0, 1).await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn missing_object_reports_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::new(dir.path()).unwrap();
		assert!(!backend.exists("does/not/exist.tif").await.unwrap());
	}
}
