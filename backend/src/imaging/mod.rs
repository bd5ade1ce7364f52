//! Size-bounded image encoding for record photos.
//!
//! Uploaded photos are stored inline as data URLs inside a record document,
//! which has its own size ceiling. [`compress`] downsizes an image to fit a
//! bounding box and then lowers JPEG quality step by step until the encoded
//! bytes fit the configured budget.
//!
//! - [`codec`]: the [`ImageCodec`] trait and the production [`JpegCodec`]
//!   built on the `image` crate.
//! - [`compress`]: the resize and quality search, generic over the codec.

pub mod codec;
pub mod compress;

pub use codec::{ImageCodec, JpegCodec};
pub use compress::{compress_bytes, data_url_bytes, CompressConfig, CompressError};
