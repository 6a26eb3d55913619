//! Image codec: decode, color enhance, JPEG encode. Pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (JPEG, PNG, TIFF, WebP, BMP, PNM) |
//! | **Normalize** | `DynamicImage::to_rgb8` |
//! | **Color enhance** | luma blend, see [`rust_codec::enhance_color`] |
//! | **Encode** | `image::codecs::jpeg::JpegEncoder` at the step quality |
//!
//! The module is split into:
//! - **Backend**: [`Codec`] trait + [`CodecError`]
//! - **Rust codec**: [`RustCodec`], the production implementation

pub mod backend;
pub mod rust_codec;

pub use backend::{Codec, CodecError};
pub use rust_codec::{RustCodec, supported_input_extensions};
