//! Pixel-container codecs (JPEG, PNG) bridging [`crate::raster::Raster`] and the
//! [`image`] crate's encoders/decoders. Byte-stream tile codecs (RAW, LZW,
//! PackBits, Zip) live in [`crate::codec`] instead.

pub mod bil;
pub mod jpeg;
pub mod png;
pub mod tiff;
