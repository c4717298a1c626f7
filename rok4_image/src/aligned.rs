//! A single 16-byte-aligned scratch allocation, sized once at producer init
//! time and released on drop. [`crate::resampled::ResampledImage`] and
//! [`crate::reprojected::ReprojectedImage`] use this instead of many small
//! allocations for their per-instance scratch (weight tables, row rings).

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;

const ALIGNMENT: usize = 16;

pub struct AlignedBuffer {
	ptr: NonNull<u8>,
	len: usize,
	layout: Layout,
}

// SAFETY: `AlignedBuffer` owns its allocation exclusively; no aliasing occurs
// unless the caller creates it, matching the `Send`/`Sync` bound of a `Vec<u8>`.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
	/// Allocates `len` zeroed bytes aligned to 16 bytes.
	///
	/// # Panics
	/// Panics if `len` is zero or the allocator is out of memory.
	#[must_use]
	pub fn new(len: usize) -> Self {
		assert!(len > 0, "AlignedBuffer cannot be zero-sized");
		let layout = Layout::from_size_align(len, ALIGNMENT).expect("valid layout");
		// SAFETY: layout has non-zero size.
		let raw = unsafe { alloc_zeroed(layout) };
		let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
		Self { ptr, len, layout }
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		// SAFETY: `ptr` is valid for `len` bytes for the lifetime of `self`.
		unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
	}

	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		// SAFETY: `ptr` is valid for `len` bytes, uniquely borrowed via `&mut self`.
		unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
	}
}

impl Drop for AlignedBuffer {
	fn drop(&mut self) {
		// SAFETY: `layout` is the exact layout used in `alloc_zeroed`.
		unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
	}
}
