//! Face redaction: blur every located face and write the result.

use crate::detector::{DetectorError, FaceLocator};
use crate::types::FaceRegion;
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use thiserror::Error;

const BLUR_KERNEL_SIZE: usize = 99;
const BLUR_SIGMA: f64 = 30.0;

#[derive(Error, Debug)]
pub enum AnonymizeError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("face detection failed: {0}")]
    Detect(#[from] DetectorError),
}

/// Normalized 1-D Gaussian kernel.
fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f32> {
    let center = (size as f64 - 1.0) / 2.0;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Gaussian-blur one region of `image` in place.
///
/// The region is cropped and filtered as an isolated patch, so samples past
/// its edges repeat the patch's own border instead of reading the
/// surrounding image.
pub fn blur_region(image: &mut RgbaImage, region: &FaceRegion, kernel: &[f32]) {
    let (x, y, w, h) = region.to_crop_rect();
    if w == 0 || h == 0 {
        return;
    }

    // Filter in f32 so the 8-bit conversion rounds instead of truncating.
    let patch = image::imageops::crop_imm(&*image, x, y, w, h).to_image();
    let patch = DynamicImage::ImageRgba8(patch).into_rgba32f();
    let blurred = imageproc::filter::separable_filter_equal(&patch, kernel);
    let blurred = DynamicImage::ImageRgba32F(blurred).into_rgba8();

    image::imageops::replace(image, &blurred, i64::from(x), i64::from(y));
}

/// Face redactor with its own locator.
pub struct Anonymizer {
    locator: FaceLocator,
    kernel: Vec<f32>,
}

impl Anonymizer {
    pub fn new(locator: FaceLocator) -> Self {
        Self {
            locator,
            kernel: gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA),
        }
    }

    /// Blur every face found in `input_path` and write the image to `output_path`.
    ///
    /// Returns `false` on any failure; an image with no faces is copied as-is
    /// and counts as success.
    pub fn redact(&mut self, input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> bool {
        match self.try_redact(input_path.as_ref(), output_path.as_ref()) {
            Ok(count) => {
                tracing::info!(
                    faces = count,
                    output = %output_path.as_ref().display(),
                    "faces anonymized"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    input = %input_path.as_ref().display(),
                    "face anonymization failed"
                );
                false
            }
        }
    }

    fn try_redact(
        &mut self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<usize, AnonymizeError> {
        let image = image::open(input_path)?;
        let regions = self.locator.locate(&image)?;
        let (width, height) = (image.width(), image.height());

        let had_alpha = image.color().has_alpha();
        let mut rgba = image.to_rgba8();
        let mut count = 0;
        for region in regions.iter().filter_map(|r| r.clip(width, height)) {
            blur_region(&mut rgba, &region, &self.kernel);
            count += 1;
        }

        let output = if had_alpha {
            DynamicImage::ImageRgba8(rgba)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
        };
        output.save(output_path)?;
        Ok(count)
    }
}
