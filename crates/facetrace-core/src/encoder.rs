//! Face feature encoder.
//!
//! Converts a cropped face patch into a numeric signature by trying a fixed
//! list of extraction tiers in order; the first tier that yields a non-empty
//! vector wins.

use crate::descriptor::{self, DescriptorError, HOG_WINDOW};
use crate::types::{Encoding, EncodingTier};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use thiserror::Error;

const LBP_SIZE: u32 = 64;
pub const RAW_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("face patch is empty ({0}×{1})")]
    EmptyPatch(u32, u32),
    #[error("descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("{0} tier returned no values")]
    NoValues(&'static str),
    #[error("all encoding tiers failed: {0}")]
    AllTiersFailed(String),
}

/// One extraction tier of the encoder cascade.
pub trait EncodingStrategy: Send + Sync {
    fn tier(&self) -> EncodingTier;
    fn extract(&self, patch: &DynamicImage) -> Result<Vec<f32>, EncodeError>;
}

/// Grayscale-convert and resize to `size × size`.
fn grayscale_resized(patch: &DynamicImage, size: u32) -> Result<GrayImage, EncodeError> {
    if patch.width() == 0 || patch.height() == 0 {
        return Err(EncodeError::EmptyPatch(patch.width(), patch.height()));
    }
    let gray = patch.to_luma8();
    Ok(image::imageops::resize(&gray, size, size, FilterType::Triangle))
}

/// Dense gradient-orientation histogram over a 128×128 window.
pub struct GradientHistogramTier;

impl EncodingStrategy for GradientHistogramTier {
    fn tier(&self) -> EncodingTier {
        EncodingTier::GradientHistogram
    }

    fn extract(&self, patch: &DynamicImage) -> Result<Vec<f32>, EncodeError> {
        let gray = grayscale_resized(patch, HOG_WINDOW)?;
        Ok(descriptor::hog_descriptor(&gray)?)
    }
}

/// 256-bin local binary pattern histogram of a 64×64 patch.
pub struct LocalTextureTier;

impl EncodingStrategy for LocalTextureTier {
    fn tier(&self) -> EncodingTier {
        EncodingTier::LocalTexture
    }

    fn extract(&self, patch: &DynamicImage) -> Result<Vec<f32>, EncodeError> {
        let gray = grayscale_resized(patch, LBP_SIZE)?;
        Ok(descriptor::lbp_histogram(&gray)?)
    }
}

/// 50×50 grayscale intensities scaled to [0, 1].
pub struct RawIntensityTier;

impl EncodingStrategy for RawIntensityTier {
    fn tier(&self) -> EncodingTier {
        EncodingTier::RawIntensity
    }

    fn extract(&self, patch: &DynamicImage) -> Result<Vec<f32>, EncodeError> {
        let gray = grayscale_resized(patch, RAW_SIZE as u32)?;
        Ok(gray.as_raw().iter().map(|&p| p as f32 / 255.0).collect())
    }
}

/// Tiered face encoder.
pub struct FeatureEncoder {
    tiers: Vec<Box<dyn EncodingStrategy>>,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    /// Encoder with the standard cascade: gradient histogram → local texture → raw intensity.
    pub fn new() -> Self {
        Self::with_tiers(vec![
            Box::new(GradientHistogramTier),
            Box::new(LocalTextureTier),
            Box::new(RawIntensityTier),
        ])
    }

    pub fn with_tiers(tiers: Vec<Box<dyn EncodingStrategy>>) -> Self {
        Self { tiers }
    }

    /// Try each tier in order; the first non-empty vector wins.
    pub fn try_encode(&self, patch: &DynamicImage) -> Result<Encoding, EncodeError> {
        let mut failures = Vec::new();

        for strategy in &self.tiers {
            let tier = strategy.tier();
            let attempt = strategy
                .extract(patch)
                .and_then(|values| {
                    if values.is_empty() {
                        Err(EncodeError::NoValues(tier.name()))
                    } else {
                        Ok(values)
                    }
                });

            match attempt {
                Ok(values) => {
                    tracing::debug!(tier = tier.name(), len = values.len(), "face encoded");
                    return Ok(Encoding {
                        values,
                        tier: Some(tier),
                    });
                }
                Err(e) => {
                    tracing::debug!(tier = tier.name(), error = %e, "encoding tier failed");
                    failures.push(format!("{}: {e}", tier.name()));
                }
            }
        }

        Err(EncodeError::AllTiersFailed(failures.join("; ")))
    }

    /// Encode a patch; an empty encoding when every tier fails.
    pub fn encode(&self, patch: &DynamicImage) -> Encoding {
        match self.try_encode(patch) {
            Ok(encoding) => encoding,
            Err(e) => {
                tracing::warn!(error = %e, "face encoding failed");
                Encoding::empty()
            }
        }
    }
}
