//! Texture descriptors over grayscale patches: gradient-orientation
//! histograms (HOG, via `imageproc`) and local binary pattern (LBP)
//! histograms.

use image::GrayImage;
use imageproc::hog::{hog, HogOptions};
use std::f64::consts::PI;
use thiserror::Error;

// --- HOG geometry ---
pub const HOG_WINDOW: u32 = 128;
const HOG_CELL: usize = 8;
/// Block side in cells (16×16 pixels).
const HOG_BLOCK_CELLS: usize = 2;
/// Block stride in cells (8 pixels).
const HOG_BLOCK_STRIDE_CELLS: usize = 1;
const HOG_BINS: usize = 9;

const HOG_BLOCKS_PER_SIDE: usize =
    (HOG_WINDOW as usize / HOG_CELL - HOG_BLOCK_CELLS) / HOG_BLOCK_STRIDE_CELLS + 1;

/// Descriptor length for the 128×128 / 16×16 / 8×8 / 8×8 / 9-bin layout (8100).
pub const HOG_DESCRIPTOR_LEN: usize =
    HOG_BLOCKS_PER_SIDE * HOG_BLOCKS_PER_SIDE * HOG_BLOCK_CELLS * HOG_BLOCK_CELLS * HOG_BINS;

const HOG_OPTIONS: HogOptions = HogOptions {
    orientations: HOG_BINS,
    signed: false,
    cell_side: HOG_CELL,
    block_side: HOG_BLOCK_CELLS,
    block_stride: HOG_BLOCK_STRIDE_CELLS,
};

// --- LBP ---
pub const LBP_BINS: usize = 256;
const LBP_NEIGHBORS: usize = 8;
const LBP_RADIUS: f64 = 1.0;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("expected a {expected}×{expected} patch, got {width}×{height}")]
    WrongSize { expected: u32, width: u32, height: u32 },
    #[error("patch too small for descriptor: {width}×{height}")]
    TooSmall { width: u32, height: u32 },
    #[error("hog: {0}")]
    Hog(String),
}

/// Dense HOG descriptor of a 128×128 grayscale window.
///
/// Unsigned orientations in 9 bins, 8×8 cells, 2×2-cell blocks at a one-cell
/// stride, each block L2 normalized.
pub fn hog_descriptor(gray: &GrayImage) -> Result<Vec<f32>, DescriptorError> {
    let (width, height) = gray.dimensions();
    if width != HOG_WINDOW || height != HOG_WINDOW {
        return Err(DescriptorError::WrongSize {
            expected: HOG_WINDOW,
            width,
            height,
        });
    }
    hog(gray, HOG_OPTIONS).map_err(DescriptorError::Hog)
}

/// Local binary pattern map of a grayscale patch.
///
/// Border pixels keep pattern 0. For each interior pixel `(i, j)` (row, column)
/// the neighbour `k` sits at `(i + cos θ, j + sin θ)` with `θ = 2πk/8`,
/// truncated to integer coordinates, and contributes bit `k` when it is
/// brighter than the centre.
pub fn lbp_map(gray: &GrayImage) -> Result<Vec<u8>, DescriptorError> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return Err(DescriptorError::TooSmall { width, height });
    }

    let w = width as usize;
    let h = height as usize;
    let data = gray.as_raw();
    let mut map = vec![0u8; w * h];

    for i in 1..h - 1 {
        for j in 1..w - 1 {
            let center = data[i * w + j];
            let mut pattern = 0u8;
            for k in 0..LBP_NEIGHBORS {
                let angle = 2.0 * PI * k as f64 / LBP_NEIGHBORS as f64;
                let row = (i as f64 + LBP_RADIUS * angle.cos()) as usize;
                let col = (j as f64 + LBP_RADIUS * angle.sin()) as usize;
                if data[row * w + col] > center {
                    pattern |= 1 << k;
                }
            }
            map[i * w + j] = pattern;
        }
    }

    Ok(map)
}

/// 256-bin histogram of the LBP map over `[0, 256)`, border pixels included.
pub fn lbp_histogram(gray: &GrayImage) -> Result<Vec<f32>, DescriptorError> {
    let map = lbp_map(gray)?;
    let mut hist = vec![0.0f32; LBP_BINS];
    for &p in &map {
        hist[p as usize] += 1.0;
    }
    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_hog_descriptor_len() {
        assert_eq!(HOG_DESCRIPTOR_LEN, 8100);
        let gray = GrayImage::from_fn(128, 128, |x, y| Luma([((x * 3 + y * 5) % 256) as u8]));
        let d = hog_descriptor(&gray).unwrap();
        assert_eq!(d.len(), HOG_DESCRIPTOR_LEN);
        assert!(d.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_hog_blocks_are_unit_normalized() {
        let gray = GrayImage::from_fn(128, 128, |x, y| Luma([((x * x + y * 7) % 256) as u8]));
        let d = hog_descriptor(&gray).unwrap();
        let block_len = HOG_BLOCK_CELLS * HOG_BLOCK_CELLS * HOG_BINS;
        for block in d.chunks_exact(block_len) {
            let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-3, "norm {norm}");
        }
    }

    #[test]
    fn test_hog_rejects_wrong_size() {
        let gray = GrayImage::new(64, 64);
        assert!(matches!(
            hog_descriptor(&gray),
            Err(DescriptorError::WrongSize { width: 64, height: 64, .. })
        ));
    }

    #[test]
    fn test_hog_flat_patch_is_zero() {
        let gray = GrayImage::from_pixel(128, 128, Luma([90]));
        let d = hog_descriptor(&gray).unwrap();
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_hog_vertical_edge_uses_horizontal_gradient_bins() {
        // Left half dark, right half bright: the gradient points along +x (0°),
        // so all energy lands in bin 0.
        let gray = GrayImage::from_fn(128, 128, |x, _| Luma([if x < 64 { 0 } else { 255 }]));
        let d = hog_descriptor(&gray).unwrap();
        let mut per_bin = [0.0f32; HOG_BINS];
        for (i, v) in d.iter().enumerate() {
            per_bin[i % HOG_BINS] += v;
        }
        assert!(per_bin[0] > 0.0);
        for (bin, &v) in per_bin.iter().enumerate().skip(1) {
            assert_eq!(v, 0.0, "bin {bin} should be empty");
        }
    }

    #[test]
    fn test_lbp_flat_patch_is_all_zero_pattern() {
        let gray = GrayImage::from_pixel(64, 64, Luma([100]));
        let hist = lbp_histogram(&gray).unwrap();
        assert_eq!(hist.len(), LBP_BINS);
        assert_eq!(hist[0], (64 * 64) as f32);
    }

    #[test]
    fn test_lbp_histogram_counts_every_pixel() {
        let gray = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        let hist = lbp_histogram(&gray).unwrap();
        assert_eq!(hist.iter().sum::<f32>(), (64 * 64) as f32);
    }

    #[test]
    fn test_lbp_bright_pixel_below_sets_bit_zero() {
        // Neighbour k=0 sits at (i + 1, j): the pixel directly below the centre.
        let mut gray = GrayImage::from_pixel(3, 3, Luma([10]));
        gray.put_pixel(1, 2, Luma([200]));
        let map = lbp_map(&gray).unwrap();
        assert_eq!(map[4], 1);
    }

    #[test]
    fn test_lbp_rejects_tiny_patch() {
        let gray = GrayImage::new(2, 5);
        assert!(matches!(lbp_map(&gray), Err(DescriptorError::TooSmall { .. })));
    }
}
