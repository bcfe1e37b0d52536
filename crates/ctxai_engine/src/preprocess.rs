//! Scan image preprocessing.
//!
//! Decodes raw PNG/JPEG bytes to a single-channel luminance image, resizes
//! to the configured square input size, and normalizes pixel values with
//! mean 0.5 / std 0.5 into `[-1, 1]`. The decoded original is retained for
//! the heatmap overlay. Pure: same bytes and size always produce the same
//! tensor.

use burn::prelude::*;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

use ctxai_core::ScanShape;

/// Inputs larger than this are rejected before decoding.
const MAX_IMAGE_BYTES: usize = 32 * 1024 * 1024;

/// Preprocessing errors.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Input bytes are not a valid image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The image's color layout cannot be converted to single-channel.
    #[error("Unsupported channel layout: {0}")]
    UnsupportedChannelLayout(String),

    /// Empty input payload.
    #[error("Empty image payload")]
    EmptyInput,

    /// Input payload exceeds the decode size limit.
    #[error("Image payload of {len} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Payload size in bytes.
        len: usize,
        /// Maximum accepted size in bytes.
        max: usize,
    },
}

/// A preprocessed scan: the normalized input tensor plus the retained
/// original image. Created per inference call and dropped with it.
#[derive(Debug, Clone)]
pub struct PreprocessedScan<B: Backend> {
    /// Normalized input tensor, shape `(1, 1, size, size)`, values in
    /// `[-1, 1]`.
    pub tensor: Tensor<B, 4>,
    /// The decoded original, kept at its native resolution for the overlay.
    pub original: DynamicImage,
    /// Shape metadata of `tensor`.
    pub shape: ScanShape,
}

/// Decode, resize and normalize a scan image.
pub fn preprocess_scan<B: Backend>(
    bytes: &[u8],
    size: usize,
    device: &B::Device,
) -> Result<PreprocessedScan<B>, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::EmptyInput);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PreprocessError::TooLarge {
            len: bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }

    let original = image::load_from_memory(bytes).map_err(classify_decode_error)?;
    debug!(
        width = original.width(),
        height = original.height(),
        target = size,
        "decoded scan"
    );

    let gray = original.to_luma8();
    let resized = image::imageops::resize(&gray, size as u32, size as u32, FilterType::Triangle);

    // Scale to [0, 1], then normalize with mean 0.5 / std 0.5 -> [-1, 1].
    let values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|p| (p as f32 / 255.0 - 0.5) / 0.5)
        .collect();

    let shape = ScanShape::single_gray(size);
    let tensor = Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape(shape.dims());

    Ok(PreprocessedScan {
        tensor,
        original,
        shape,
    })
}

fn classify_decode_error(err: image::ImageError) -> PreprocessError {
    match &err {
        image::ImageError::Unsupported(unsupported) => match unsupported.kind() {
            image::error::UnsupportedErrorKind::Color(_) => {
                PreprocessError::UnsupportedChannelLayout(err.to_string())
            }
            _ => PreprocessError::Decode(err.to_string()),
        },
        _ => PreprocessError::Decode(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    use crate::device::InnerBackend;

    fn gray_png(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_rejects_empty_input() {
        let device = Default::default();
        let err = preprocess_scan::<InnerBackend>(&[], 224, &device).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyInput));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let device = Default::default();
        let err =
            preprocess_scan::<InnerBackend>(b"definitely not an image", 224, &device).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_normalizes_to_unit_interval() {
        let device = Default::default();
        // Mid-gray maps close to 0, black to -1, white to +1.
        let scan = preprocess_scan::<InnerBackend>(&gray_png(32, 32, 128), 16, &device).unwrap();
        assert_eq!(scan.tensor.dims(), [1, 1, 16, 16]);

        let values: Vec<f32> = scan.tensor.into_data().to_vec().unwrap();
        for v in values {
            assert!((v - 0.0039).abs() < 1e-3);
        }

        let black = preprocess_scan::<InnerBackend>(&gray_png(8, 8, 0), 8, &device).unwrap();
        let values: Vec<f32> = black.tensor.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_rgb_input_converts_to_luminance() {
        let device = Default::default();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([200, 100, 50])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();

        let scan = preprocess_scan::<InnerBackend>(&buf.into_inner(), 16, &device).unwrap();
        assert_eq!(scan.shape.dims(), [1, 1, 16, 16]);
    }

    #[test]
    fn test_original_keeps_native_resolution() {
        let device = Default::default();
        let scan = preprocess_scan::<InnerBackend>(&gray_png(50, 30, 77), 16, &device).unwrap();
        assert_eq!(scan.original.width(), 50);
        assert_eq!(scan.original.height(), 30);
        assert_eq!(scan.tensor.dims(), [1, 1, 16, 16]);
    }
}
