//! Defines the `DataWriterTrait` for writing data to various sinks.
//!
//! # Examples
//!
//! ```rust
//! use rok4_core::{io::{DataWriterBlob, DataWriterTrait}, Blob};
//!
//! let mut writer = DataWriterBlob::new().unwrap();
//! writer.append(&Blob::from(vec![1, 2, 3])).unwrap();
//! assert_eq!(writer.as_slice(), &[1, 2, 3]);
//! ```

use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;

/// A trait for writing data to a sink, tracking a cursor position.
#[async_trait]
pub trait DataWriterTrait: Send + Sync {
	/// Appends data at the current write position, returning the range it occupies.
	fn append(&mut self, blob: &Blob) -> Result<ByteRange>;

	/// Overwrites data at the start of the sink, preserving the current position.
	fn write_start(&mut self, blob: &Blob) -> Result<()>;

	/// Returns the current write position.
	fn get_position(&mut self) -> Result<u64>;

	/// Moves the write position.
	fn set_position(&mut self, position: u64) -> Result<()>;
}
