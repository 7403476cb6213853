//! Final resize to exact target dimensions and JFIF DPI stamping.
//!
//! The remote passes overshoot the target (each multiplies by the full
//! per-call factor), so the last step resamples down/up to the exact
//! requested pixel size and encodes a JPEG carrying the requested
//! dots-per-inch density in its JFIF header.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, UpscaleError};

/// Resampling filter for the final resize.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest/best for photos.
    Lanczos3,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        Self::Lanczos3
    }
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Resample an image to exactly `target` pixels, ignoring aspect ratio.
#[must_use]
pub fn resize_to_target(
    image: &DynamicImage,
    target: Dimensions,
    filter: ResizeFilter,
) -> DynamicImage {
    image.resize_exact(target.width, target.height, filter.to_image_filter())
}

/// Encode an image as baseline JPEG at the given quality.
///
/// # Errors
///
/// Returns [`UpscaleError::Image`] if encoding fails.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, UpscaleError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    image::ImageEncoder::write_image(
        encoder,
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// JFIF APP0 identifier.
const JFIF_ID: [u8; 5] = *b"JFIF\0";

/// Total size of the APP0 segment we insert (marker + length + payload,
/// no thumbnail).
const APP0_SEGMENT_SIZE: usize = 18;

/// Stamp dots-per-inch density into a JPEG stream's JFIF header.
///
/// Pixel content is untouched. If the stream already carries a JFIF
/// APP0 segment its density fields are patched in place; otherwise a
/// fresh APP0 is inserted directly after the SOI marker.
///
/// # Errors
///
/// Returns [`UpscaleError::InvalidJpeg`] if the stream does not start
/// with a JPEG SOI marker or an existing APP0 segment is truncated.
pub fn stamp_jpeg_dpi(jpeg: Vec<u8>, dpi: u16) -> Result<Vec<u8>, UpscaleError> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(UpscaleError::InvalidJpeg("missing SOI marker"));
    }

    let has_jfif_app0 = jpeg[2] == 0xFF
        && jpeg[3] == 0xE0
        && jpeg.len() >= 11
        && jpeg[6..11] == JFIF_ID;

    if has_jfif_app0 {
        // Segment layout after the FF E0 marker: length (2), "JFIF\0"
        // (5), version (2), units (1), X density (2), Y density (2).
        let length = usize::from(u16::from_be_bytes([jpeg[4], jpeg[5]]));
        if length < 16 || jpeg.len() < 18 {
            return Err(UpscaleError::InvalidJpeg("truncated APP0 segment"));
        }
        let mut jpeg = jpeg;
        let [dpi_hi, dpi_lo] = dpi.to_be_bytes();
        jpeg[13] = 0x01; // density units: dots per inch
        jpeg[14] = dpi_hi;
        jpeg[15] = dpi_lo;
        jpeg[16] = dpi_hi;
        jpeg[17] = dpi_lo;
        return Ok(jpeg);
    }

    let [dpi_hi, dpi_lo] = dpi.to_be_bytes();
    let segment: [u8; APP0_SEGMENT_SIZE] = [
        0xFF, 0xE0, // APP0 marker
        0x00, 0x10, // segment length (16, excluding the marker)
        JFIF_ID[0], JFIF_ID[1], JFIF_ID[2], JFIF_ID[3], JFIF_ID[4],
        0x01, 0x02, // JFIF version 1.02
        0x01, // density units: dots per inch
        dpi_hi, dpi_lo, // X density
        dpi_hi, dpi_lo, // Y density
        0x00, 0x00, // no thumbnail
    ];
    let mut out = Vec::with_capacity(jpeg.len() + APP0_SEGMENT_SIZE);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([128, 64, 32, 255]),
        ))
    }

    /// Read back (units, x density, y density) from the APP0 segment
    /// directly after SOI, if present.
    fn jfif_density(jpeg: &[u8]) -> Option<(u8, u16, u16)> {
        if jpeg.len() < 18 || jpeg[..2] != [0xFF, 0xD8] || jpeg[2..4] != [0xFF, 0xE0] {
            return None;
        }
        if jpeg[6..11] != JFIF_ID {
            return None;
        }
        Some((
            jpeg[13],
            u16::from_be_bytes([jpeg[14], jpeg[15]]),
            u16::from_be_bytes([jpeg[16], jpeg[17]]),
        ))
    }

    #[test]
    fn default_filter_is_lanczos3() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::Lanczos3);
    }

    #[test]
    fn filter_display_names() {
        assert_eq!(ResizeFilter::Lanczos3.to_string(), "Lanczos3");
        assert_eq!(ResizeFilter::CatmullRom.to_string(), "CatmullRom");
    }

    #[test]
    fn resize_hits_exact_target_ignoring_aspect() {
        let img = test_image(100, 50);
        let resized = resize_to_target(&img, Dimensions::new(80, 80), ResizeFilter::Triangle);
        assert_eq!(resized.width(), 80);
        assert_eq!(resized.height(), 80);
    }

    #[test]
    fn resize_can_upscale() {
        let img = test_image(10, 10);
        let resized = resize_to_target(&img, Dimensions::new(38, 38), ResizeFilter::Lanczos3);
        assert_eq!(resized.width(), 38);
        assert_eq!(resized.height(), 38);
    }

    #[test]
    fn encode_jpeg_starts_with_soi() {
        let bytes = encode_jpeg(&test_image(8, 8), 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn stamp_on_encoder_output_sets_density() {
        let bytes = encode_jpeg(&test_image(8, 8), 90).unwrap();
        let stamped = stamp_jpeg_dpi(bytes, 300).unwrap();
        assert_eq!(jfif_density(&stamped), Some((0x01, 300, 300)));
        // Still decodable after stamping.
        let decoded = image::load_from_memory(&stamped).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn stamp_inserts_app0_when_absent() {
        // Bare SOI + EOI, no APP0.
        let minimal = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let stamped = stamp_jpeg_dpi(minimal, 72).unwrap();
        assert_eq!(stamped.len(), 4 + APP0_SEGMENT_SIZE);
        assert_eq!(jfif_density(&stamped), Some((0x01, 72, 72)));
        assert_eq!(&stamped[stamped.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn stamp_patches_existing_app0_in_place() {
        // Insert once, then stamp again with a different density.
        let minimal = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let once = stamp_jpeg_dpi(minimal, 72).unwrap();
        let twice = stamp_jpeg_dpi(once.clone(), 300).unwrap();
        assert_eq!(twice.len(), once.len(), "patching must not grow the stream");
        assert_eq!(jfif_density(&twice), Some((0x01, 300, 300)));
    }

    #[test]
    fn stamp_rejects_non_jpeg_data() {
        let result = stamp_jpeg_dpi(b"\x89PNG\r\n\x1a\n".to_vec(), 300);
        assert!(matches!(result, Err(UpscaleError::InvalidJpeg(_))));
    }

    #[test]
    fn stamp_rejects_empty_data() {
        let result = stamp_jpeg_dpi(Vec::new(), 300);
        assert!(matches!(result, Err(UpscaleError::InvalidJpeg(_))));
    }

    #[test]
    fn filter_serde_round_trip() {
        let json = serde_json::to_string(&ResizeFilter::Gaussian).unwrap();
        let back: ResizeFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResizeFilter::Gaussian);
    }
}
