//! Ambient primitives shared across the workspace: byte containers, binary-value
//! readers/writers, compression, concurrency tuning and progress reporting.

pub mod compression;
pub mod concurrency;
pub use concurrency::*;
pub mod io;
#[macro_use]
pub mod macros;
pub mod progress;
pub mod types;
pub use types::*;
pub mod utils;
