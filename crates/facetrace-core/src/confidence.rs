//! Geometry-only detection confidence.
//!
//! This is a stand-in heuristic, not a calibrated probability: faces that
//! cover more of the frame are assumed to be more reliably detected. Pixel
//! content is never consulted.

use crate::types::FaceRegion;

const AREA_RATIO_GAIN: f32 = 10.0;
pub const MIN_CONFIDENCE: f32 = 0.3;
pub const MAX_CONFIDENCE: f32 = 0.9;

/// Estimate detection confidence for `region` in an image of the given size.
///
/// `clamp(area(region) / area(image) * 10, 0.3, 0.9)`. A zero-area image
/// scores the minimum.
pub fn score(region: &FaceRegion, image_width: u32, image_height: u32) -> f32 {
    let image_area = image_width as f64 * image_height as f64;
    if image_area <= 0.0 {
        return MIN_CONFIDENCE;
    }
    let face_area = region.width().max(0) as f64 * region.height().max(0) as f64;
    let ratio = (face_area / image_area) as f32;
    (ratio * AREA_RATIO_GAIN).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_face_clamps_to_floor() {
        let r = FaceRegion::new(0, 10, 10, 0);
        assert_eq!(score(&r, 1000, 1000), MIN_CONFIDENCE);
    }

    #[test]
    fn test_large_face_clamps_to_ceiling() {
        let r = FaceRegion::new(0, 100, 100, 0);
        assert_eq!(score(&r, 100, 100), MAX_CONFIDENCE);
    }

    #[test]
    fn test_mid_range_is_linear() {
        // 50×50 of 200×200 = 1/16 → 0.625
        let r = FaceRegion::new(10, 60, 60, 10);
        assert!((score(&r, 200, 200) - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_zero_area_image() {
        let r = FaceRegion::new(0, 1, 1, 0);
        assert_eq!(score(&r, 0, 100), MIN_CONFIDENCE);
    }
}
