//! An in-memory implementation of [`DataReaderTrait`] backed by a [`Blob`].

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;

/// Reads data from an in-memory byte buffer.
#[derive(Debug, Clone)]
pub struct DataReaderBlob {
	data: Vec<u8>,
}

impl From<Vec<u8>> for DataReaderBlob {
	fn from(data: Vec<u8>) -> Self {
		DataReaderBlob { data }
	}
}

impl From<super::DataWriterBlob> for DataReaderBlob {
	fn from(writer: super::DataWriterBlob) -> Self {
		DataReaderBlob {
			data: writer.into_blob().into_vec(),
		}
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderBlob {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let start = range.offset as usize;
		let end = start + range.length as usize;
		anyhow::ensure!(end <= self.data.len(), "range {:?} out of bounds ({})", range, self.data.len());
		Ok(Blob::from(self.data[start..end].to_vec()))
	}

	async fn read_all(&self) -> Result<Blob> {
		Ok(Blob::from(self.data.clone()))
	}

	fn get_name(&self) -> &str {
		"DataReaderBlob"
	}
}
