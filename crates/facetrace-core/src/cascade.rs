//! Cascade face detector backed by the `rustface` crate (SeetaFace funnel cascade).

use crate::detector::{DetectionStrategy, DetectorError};
use crate::types::FaceRegion;
use image::DynamicImage;
use std::io::BufReader;

/// Image pyramid grows by this factor between scales.
const CASCADE_SCALE_FACTOR: f32 = 1.1;
const CASCADE_MIN_FACE_SIZE: u32 = 30;
const CASCADE_WINDOW_STEP: u32 = 4;
const CASCADE_SCORE_THRESHOLD: f64 = 2.0;

/// Multi-scale sliding-window detector over a grayscale image.
pub struct CascadeDetector {
    model: rustface::Model,
}

impl CascadeDetector {
    /// Load a SeetaFace model file.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        let file = std::fs::File::open(model_path)?;
        let model = rustface::read_model(BufReader::new(file))?;
        tracing::info!(path = model_path, "loaded cascade model");
        Ok(Self { model })
    }
}

impl DetectionStrategy for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(CASCADE_MIN_FACE_SIZE);
        detector.set_score_thresh(CASCADE_SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(1.0 / CASCADE_SCALE_FACTOR);
        detector.set_slide_window_step(CASCADE_WINDOW_STEP, CASCADE_WINDOW_STEP);

        let faces = detector.detect(&rustface::ImageData::new(&gray, width, height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion::from_xywh(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .collect())
    }
}
