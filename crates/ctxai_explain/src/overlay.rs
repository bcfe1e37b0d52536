//! Heatmap overlay rendering.
//!
//! Turns a normalized saliency map into a human-viewable image: the map is
//! upsampled to the original scan's resolution, pushed through a fixed
//! blue→red color ramp, and alpha-blended onto the original.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use thiserror::Error;

use crate::gradcam::SaliencyMap;

/// Default heatmap weight in the blend.
pub const DEFAULT_ALPHA: f32 = 0.4;

/// Errors raised while rendering an overlay.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Blend factor outside `[0, 1]`.
    #[error("Blend factor {0} outside [0, 1]")]
    InvalidBlendFactor(f32),

    /// Internal rendering failure.
    #[error("Failed to render overlay: {0}")]
    Render(String),
}

/// Blend a colorized saliency map onto the original scan.
///
/// The saliency map is resized to the original's pixel dimensions, each
/// value is mapped through a blue→red ramp, and the result is blended
/// per-pixel as `alpha * heat + (1 - alpha) * original`. `alpha` must lie in
/// `[0, 1]`; anything else (including NaN) is a caller contract violation.
pub fn overlay_heatmap(
    original: &DynamicImage,
    saliency: &SaliencyMap,
    alpha: f32,
) -> Result<RgbImage, OverlayError> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(OverlayError::InvalidBlendFactor(alpha));
    }

    let quantized: Vec<u8> = saliency
        .values()
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let map = GrayImage::from_raw(saliency.width() as u32, saliency.height() as u32, quantized)
        .ok_or_else(|| {
            OverlayError::Render(format!(
                "saliency buffer does not match {}x{}",
                saliency.width(),
                saliency.height()
            ))
        })?;

    let base = original.to_rgb8();
    let (width, height) = base.dimensions();
    let heat = image::imageops::resize(&map, width, height, FilterType::Triangle);

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let color = ramp_color(heat.get_pixel(x, y)[0]);
        let orig = base.get_pixel(x, y);
        for c in 0..3 {
            let blended = alpha * color[c] as f32 + (1.0 - alpha) * orig[c] as f32;
            pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

/// Jet-style blue→red ramp over a quantized saliency value.
fn ramp_color(value: u8) -> [u8; 3] {
    let t = value as f32 / 255.0;
    let r = (1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0);
    let g = (1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0);
    let b = (1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0);
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gray_scan(size: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(size, size, Luma([value])))
    }

    fn flat_map(height: usize, width: usize, value: f32) -> SaliencyMap {
        SaliencyMap::new(vec![value; height * width], height, width, 0)
    }

    #[test]
    fn test_rejects_out_of_range_alpha() {
        let scan = gray_scan(8, 100);
        let map = flat_map(2, 2, 0.5);

        for alpha in [-0.1, 1.5, f32::NAN] {
            let err = overlay_heatmap(&scan, &map, alpha).unwrap_err();
            assert!(matches!(err, OverlayError::InvalidBlendFactor(_)));
        }
    }

    #[test]
    fn test_output_matches_original_resolution() {
        let scan = gray_scan(16, 100);
        let map = flat_map(4, 4, 0.5);

        let out = overlay_heatmap(&scan, &map, DEFAULT_ALPHA).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn test_alpha_zero_reproduces_original() {
        let scan = gray_scan(8, 100);
        let map = flat_map(2, 2, 1.0);

        let out = overlay_heatmap(&scan, &map, 0.0).unwrap();
        for pixel in out.pixels() {
            assert_eq!(pixel.0, [100, 100, 100]);
        }
    }

    #[test]
    fn test_alpha_one_is_pure_heatmap() {
        let scan = gray_scan(8, 100);
        let map = flat_map(2, 2, 0.0);

        let out = overlay_heatmap(&scan, &map, 1.0).unwrap();
        let expected = ramp_color(0);
        for pixel in out.pixels() {
            assert_eq!(pixel.0, expected);
        }
    }

    #[test]
    fn test_ramp_is_blue_to_red() {
        let cold = ramp_color(0);
        let hot = ramp_color(255);
        assert!(cold[2] > cold[0], "low saliency should be blue-dominant");
        assert!(hot[0] > hot[2], "high saliency should be red-dominant");
    }
}
