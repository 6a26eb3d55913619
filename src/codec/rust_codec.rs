//! Pure Rust codec on top of the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP, PNM) | `image::load_from_memory` |
//! | Pixel format | `DynamicImage::to_rgb8` (alpha dropped, JPEG has none) |
//! | Color enhance | blend with the ITU-R 601 luma grey, see [`enhance_color`] |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |

use super::backend::{Codec, CodecError};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageFormat, RgbImage};
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
///
/// GIF and APNG are left out on purpose: only the first frame would survive.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
    ("pbm", ImageFormat::Pnm),
    ("pgm", ImageFormat::Pnm),
    ("ppm", ImageFormat::Pnm),
    ("pnm", ImageFormat::Pnm),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of input file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep I/O errors intact so retry classification still sees their kind.
fn codec_error(err: ImageError, wrap: fn(String) -> CodecError) -> CodecError {
    match err {
        ImageError::IoError(e) => CodecError::Io(e),
        other => wrap(other.to_string()),
    }
}

/// Scale saturation by blending every pixel with its own grey level.
///
/// `grey + factor * (channel - grey)`, with grey the rounded ITU-R 601 luma.
/// `0.0` gives greyscale, `1.0` is the identity, values above one push
/// colors away from grey until they clip.
pub fn enhance_color(mut image: RgbImage, factor: f32) -> RgbImage {
    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        let grey = (0.299 * r + 0.587 * g + 0.114 * b).round();
        pixel.0 = [r, g, b].map(|c| (grey + factor * (c - grey)).round().clamp(0.0, 255.0) as u8);
    }
    image
}

impl Codec for RustCodec {
    type Image = RgbImage;

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, CodecError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| codec_error(e, CodecError::Decode))?;
        Ok(image.to_rgb8())
    }

    fn enhance_color(&self, image: RgbImage, factor: f32) -> RgbImage {
        enhance_color(image, factor)
    }

    fn encode_jpeg(
        &self,
        image: &RgbImage,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        JpegEncoder::new_with_quality(out, quality)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| codec_error(e, CodecError::Encode))
    }
}
