//! Shared test utilities for the crusher unit tests.
//!
//! Provides synthetic images and small byte-level checks so codec tests
//! don't need fixture files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = encode_png(&gradient_image(64, 48));
//! let image = codec.decode(&png).unwrap();
//! codec.encode_jpeg(&image, 50, &mut out).unwrap();
//! assert!(is_jpeg(&out));
//! ```

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// =========================================================================
// Synthetic images
// =========================================================================

/// A colorful test image with smooth gradients and a fine checker.
///
/// The checker gives JPEG something to destroy, so re-encoding is
/// guaranteed to change pixels.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = if (x + y) % 2 == 0 { 220 } else { 30 };
        Rgb([r, g, b])
    })
}

/// Lossless PNG bytes for `image`.
pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

// =========================================================================
// Assertions
// =========================================================================

/// SOI at the start and EOI at the end.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes.starts_with(&[0xFF, 0xD8]) && bytes.ends_with(&[0xFF, 0xD9])
}

/// Whether two images have the same size and identical pixels.
pub fn same_pixels(a: &RgbImage, b: &RgbImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_image_has_requested_size() {
        assert_eq!(gradient_image(7, 3).dimensions(), (7, 3));
    }

    #[test]
    fn encode_png_roundtrips_losslessly() {
        let image = gradient_image(10, 10);
        let decoded = image::load_from_memory(&encode_png(&image))
            .unwrap()
            .to_rgb8();
        assert!(same_pixels(&image, &decoded));
    }

    #[test]
    fn is_jpeg_checks_markers() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]));
        assert!(!is_jpeg(&[0x89, b'P', b'N', b'G']));
        assert!(!is_jpeg(&[0xFF, 0xD8]));
    }
}
