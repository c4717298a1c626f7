//! Storage backends and the on-disk/on-object tile index for rok4 pyramids.
//!
//! Each backend implements [`rok4_geometry::LevelStorage`] — read a byte
//! range out of a named object, write a byte range into one — so a
//! [`rok4_geometry::Pyramid`] level can hold any of them behind `Arc<dyn
//! LevelStorage>`: local files, S3 buckets (and Ceph's S3-compatible RADOS
//! gateway), and OpenStack Swift containers. [`TileIndex`] is the
//! fixed-layout lookup table every pyramid level keeps at the start of each
//! storage object.

mod file_backend;
mod object_store_backend;
mod swift_backend;
mod tile_index;

pub use file_backend::FileBackend;
pub use object_store_backend::{ObjectStoreBackend, ObjectStoreConfig};
pub use swift_backend::SwiftBackend;
pub use tile_index::{TILE_INDEX_OFFSET, TileIndex};

pub use rok4_geometry::LevelStorage;
