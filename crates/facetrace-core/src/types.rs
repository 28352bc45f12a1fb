use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Face bounding box in image pixel space, `(top, right, bottom, left)`.
///
/// Detectors may report boxes that spill over the image edge, so raw
/// coordinates are signed. Use [`FaceRegion::clip`] before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceRegion {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    /// Build a region from an `(x, y, w, h)` box.
    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(y, x + w, y + h, x)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Clip to `[0, width] × [0, height]`.
    ///
    /// Returns `None` when the clipped region has no area.
    pub fn clip(&self, width: u32, height: u32) -> Option<FaceRegion> {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);

        let clipped = FaceRegion {
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
            left: self.left.clamp(0, w),
        };

        (clipped.top < clipped.bottom && clipped.left < clipped.right).then_some(clipped)
    }

    /// `(x, y, width, height)` of a clipped region, for cropping.
    pub fn to_crop_rect(&self) -> (u32, u32, u32, u32) {
        (
            self.left.max(0) as u32,
            self.top.max(0) as u32,
            self.width().max(0) as u32,
            self.height().max(0) as u32,
        )
    }
}

/// Which extraction tier produced an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingTier {
    GradientHistogram,
    LocalTexture,
    RawIntensity,
}

impl EncodingTier {
    /// Vector length every encoding of this tier has.
    pub fn output_len(&self) -> usize {
        match self {
            EncodingTier::GradientHistogram => crate::descriptor::HOG_DESCRIPTOR_LEN,
            EncodingTier::LocalTexture => crate::descriptor::LBP_BINS,
            EncodingTier::RawIntensity => crate::encoder::RAW_SIZE * crate::encoder::RAW_SIZE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EncodingTier::GradientHistogram => "gradient-histogram",
            EncodingTier::LocalTexture => "local-texture",
            EncodingTier::RawIntensity => "raw-intensity",
        }
    }
}

/// Face signature vector. Empty when every extraction tier failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub values: Vec<f32>,
    /// Tier that produced `values` (`None` for an empty encoding).
    pub tier: Option<EncodingTier>,
}

impl Encoding {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Demographic and emotion attributes returned by the external analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub age: Option<serde_json::Value>,
    pub gender: Option<serde_json::Value>,
    pub emotion: Option<BTreeMap<String, f64>>,
}

/// One analyzed face as it appears in the analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub bounding_box: FaceRegion,
    pub confidence: f32,
    pub age_estimate: Option<serde_json::Value>,
    pub gender_estimate: Option<serde_json::Value>,
    pub emotion_analysis: Option<BTreeMap<String, f64>>,
    #[serde(with = "encoding_values")]
    pub face_encoding: Encoding,
    pub similar_faces_found: Vec<String>,
}

/// Result of analyzing one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_faces: usize,
    pub faces_detected: Vec<FaceRecord>,
    pub consent_verified: bool,
    pub processing_notes: Vec<String>,
}

impl AnalysisResult {
    /// Result for a call that could not get past image loading or detection.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            total_faces: 0,
            faces_detected: Vec::new(),
            consent_verified: false,
            processing_notes: vec![format!("Analysis failed: {reason}")],
        }
    }
}

/// Encodings go over the wire as a bare float array.
mod encoding_values {
    use super::Encoding;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(encoding: &Encoding, s: S) -> Result<S::Ok, S::Error> {
        encoding.values.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Encoding, D::Error> {
        let values = Vec::<f32>::deserialize(d)?;
        let tier = [
            super::EncodingTier::GradientHistogram,
            super::EncodingTier::LocalTexture,
            super::EncodingTier::RawIntensity,
        ]
        .into_iter()
        .find(|t| !values.is_empty() && t.output_len() == values.len());
        Ok(Encoding { values, tier })
    }
}
