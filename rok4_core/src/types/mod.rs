//! Low-level byte and range types shared across the crate.

mod blob;
pub use blob::*;

mod byte_range;
pub use byte_range::*;

mod constants;
pub use constants::*;
