//! Whole-image face analysis.
//!
//! One call loads the image, locates faces once, then enriches each clipped
//! region in detector order. A failure for one face only degrades that face's
//! record; only load and detection failures abort the call.

use crate::attributes::{AttributeAnalyzer, AttributeError};
use crate::confidence;
use crate::detector::{DetectorError, FaceLocator};
use crate::encoder::{EncodeError, FeatureEncoder};
use crate::types::{AnalysisResult, Encoding, FaceAttributes, FaceRecord, FaceRegion};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// Confidence assigned when attributes failed but the face still encoded.
pub const ENCODING_ONLY_CONFIDENCE: f32 = 0.6;
/// Confidence assigned when nothing but the region survived.
pub const MINIMAL_CONFIDENCE: f32 = 0.3;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("face detection failed: {0}")]
    Detect(#[from] DetectorError),
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("attribute analysis failed: {0}")]
    Attributes(#[from] AttributeError),
}

/// How far enrichment of one face got.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceOutcome {
    Full {
        encoding: Encoding,
        confidence: f32,
        attributes: FaceAttributes,
    },
    EncodingOnly {
        encoding: Encoding,
        reason: String,
    },
    Minimal {
        reason: String,
    },
}

impl FaceOutcome {
    pub fn confidence(&self) -> f32 {
        match self {
            FaceOutcome::Full { confidence, .. } => *confidence,
            FaceOutcome::EncodingOnly { .. } => ENCODING_ONLY_CONFIDENCE,
            FaceOutcome::Minimal { .. } => MINIMAL_CONFIDENCE,
        }
    }

    /// Assemble the face record and its processing note.
    pub fn into_record(self, face_id: String, region: FaceRegion) -> (FaceRecord, String) {
        let confidence = self.confidence();
        let (encoding, attributes, note) = match self {
            FaceOutcome::Full {
                encoding,
                attributes,
                ..
            } => (
                encoding,
                Some(attributes),
                format!("Successfully analyzed face {face_id}"),
            ),
            FaceOutcome::EncodingOnly { encoding, reason } => (
                encoding,
                None,
                format!("Partial analysis for face {face_id}: {reason}"),
            ),
            FaceOutcome::Minimal { reason } => (
                Encoding::empty(),
                None,
                format!("Minimal analysis for face {face_id}: {reason}"),
            ),
        };

        let attributes = attributes.unwrap_or_default();
        let record = FaceRecord {
            face_id,
            bounding_box: region,
            confidence,
            age_estimate: attributes.age,
            gender_estimate: attributes.gender,
            emotion_analysis: attributes.emotion,
            face_encoding: encoding,
            similar_faces_found: Vec::new(),
        };
        (record, note)
    }
}

/// Enrich one face patch: full → encoding-only → minimal.
pub async fn analyze_face<A: AttributeAnalyzer>(
    encoder: &FeatureEncoder,
    attributes: &A,
    patch: &DynamicImage,
    region: &FaceRegion,
    image_width: u32,
    image_height: u32,
) -> FaceOutcome {
    let encoding = match encoder.try_encode(patch) {
        Ok(encoding) => encoding,
        Err(e) => {
            let reason = PipelineError::from(e).to_string();
            return match encoder.try_encode(patch) {
                Ok(encoding) => FaceOutcome::EncodingOnly { encoding, reason },
                Err(_) => FaceOutcome::Minimal { reason },
            };
        }
    };

    let confidence = confidence::score(region, image_width, image_height);
    match attributes.analyze(patch).await {
        Ok(attributes) => FaceOutcome::Full {
            encoding,
            confidence,
            attributes,
        },
        // The encoding from the full attempt carries over unchanged.
        Err(e) => FaceOutcome::EncodingOnly {
            encoding,
            reason: PipelineError::from(e).to_string(),
        },
    }
}

/// Face analysis orchestrator.
pub struct FaceAnalyzer<A> {
    locator: FaceLocator,
    encoder: FeatureEncoder,
    attributes: A,
}

impl<A: AttributeAnalyzer> FaceAnalyzer<A> {
    pub fn new(locator: FaceLocator, attributes: A) -> Self {
        Self {
            locator,
            encoder: FeatureEncoder::new(),
            attributes,
        }
    }

    pub fn with_encoder(mut self, encoder: FeatureEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn locator(&self) -> &FaceLocator {
        &self.locator
    }

    /// Analyze an image file.
    pub async fn analyze(&mut self, image_path: impl AsRef<Path>) -> AnalysisResult {
        let image = image::open(image_path.as_ref());
        self.analyze_loaded(image).await
    }

    /// Analyze an encoded image held in memory.
    pub async fn analyze_bytes(&mut self, bytes: &[u8]) -> AnalysisResult {
        let image = image::load_from_memory(bytes);
        self.analyze_loaded(image).await
    }

    fn locate(
        &mut self,
        image: image::ImageResult<DynamicImage>,
    ) -> Result<(DynamicImage, Vec<FaceRegion>), PipelineError> {
        let image = image?;
        let regions = self.locator.locate(&image)?;
        Ok((image, regions))
    }

    async fn analyze_loaded(&mut self, image: image::ImageResult<DynamicImage>) -> AnalysisResult {
        let (image, regions) = match self.locate(image) {
            Ok(located) => located,
            Err(e) => {
                tracing::error!(error = %e, "face analysis failed");
                return AnalysisResult::failed(e);
            }
        };

        let (width, height) = (image.width(), image.height());
        let mut faces = Vec::new();
        let mut notes = Vec::new();

        for region in regions.iter().filter_map(|r| r.clip(width, height)) {
            let face_id = uuid::Uuid::new_v4().to_string();
            let (x, y, w, h) = region.to_crop_rect();
            let patch = image.crop_imm(x, y, w, h);

            let outcome =
                analyze_face(&self.encoder, &self.attributes, &patch, &region, width, height).await;
            match &outcome {
                FaceOutcome::Full { .. } => {
                    tracing::debug!(face_id = %face_id, "face fully analyzed")
                }
                FaceOutcome::EncodingOnly { reason, .. } | FaceOutcome::Minimal { reason } => {
                    tracing::warn!(face_id = %face_id, reason = %reason, "face analysis degraded")
                }
            }

            let (record, note) = outcome.into_record(face_id, region);
            faces.push(record);
            notes.push(note);
        }

        tracing::info!(
            detected = regions.len(),
            analyzed = faces.len(),
            strategy = self.locator.strategy_name(),
            "face analysis complete"
        );

        AnalysisResult {
            total_faces: faces.len(),
            faces_detected: faces,
            consent_verified: true,
            processing_notes: notes,
        }
    }
}
