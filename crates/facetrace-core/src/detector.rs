//! Face location.
//!
//! [`FaceLocator`] wraps one [`DetectionStrategy`] chosen at construction:
//! the SSD model when its ONNX asset loads, otherwise the rustface cascade.
//! The choice never changes for the locator's lifetime.

use crate::cascade::CascadeDetector;
use crate::types::FaceRegion;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const SSD_INPUT_SIZE: usize = 300;
/// Per-channel means in BGR order.
const SSD_MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];
const SSD_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// `[image_id, label, confidence, x1, y1, x2, y2]`
const SSD_DETECTION_STRIDE: usize = 7;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("failed to load cascade model: {0}")]
    CascadeModel(#[from] std::io::Error),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A face detection backend.
pub trait DetectionStrategy: Send {
    fn name(&self) -> &'static str;
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Res10 SSD face detector via ONNX Runtime.
pub struct SsdDetector {
    session: Session,
}

impl SsdDetector {
    /// Load the SSD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded SSD model"
        );

        Ok(Self { session })
    }

    /// Resize to 300×300 and build a mean-subtracted BGR NCHW tensor.
    fn preprocess(image: &DynamicImage) -> Array4<f32> {
        let size = SSD_INPUT_SIZE as u32;
        let resized = image::imageops::resize(&image.to_rgb8(), size, size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, SSD_INPUT_SIZE, SSD_INPUT_SIZE));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = b as f32 - SSD_MEAN_BGR[0];
            tensor[[0, 1, y, x]] = g as f32 - SSD_MEAN_BGR[1];
            tensor[[0, 2, y, x]] = r as f32 - SSD_MEAN_BGR[2];
        }
        tensor
    }
}

impl DetectionStrategy for SsdDetector {
    fn name(&self) -> &'static str {
        "ssd"
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let input = Self::preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, detections) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("detections: {e}")))?;

        Ok(decode_detections(
            detections,
            image.width(),
            image.height(),
            SSD_CONFIDENCE_THRESHOLD,
        ))
    }
}

/// Convert raw SSD rows into absolute regions, keeping rows above `threshold`.
fn decode_detections(raw: &[f32], width: u32, height: u32, threshold: f32) -> Vec<FaceRegion> {
    let (w, h) = (width as f32, height as f32);

    raw.chunks_exact(SSD_DETECTION_STRIDE)
        .filter(|row| row[2] > threshold)
        .map(|row| {
            let left = (row[3] * w) as i32;
            let top = (row[4] * h) as i32;
            let right = (row[5] * w) as i32;
            let bottom = (row[6] * h) as i32;
            FaceRegion::new(top, right, bottom, left)
        })
        .collect()
}

/// Face locator bound to a single detection strategy.
pub struct FaceLocator {
    strategy: Box<dyn DetectionStrategy>,
    fallback_reason: Option<String>,
}

impl FaceLocator {
    /// Use `strategy` for every call.
    pub fn new(strategy: Box<dyn DetectionStrategy>) -> Self {
        Self {
            strategy,
            fallback_reason: None,
        }
    }

    /// Load the SSD model, falling back to the cascade detector for the
    /// locator's whole lifetime if the model cannot be loaded.
    pub fn load(ssd_model_path: &str, cascade_model_path: &str) -> Result<Self, DetectorError> {
        let ssd = SsdDetector::load(ssd_model_path);
        Self::with_fallback(
            ssd.map(|ssd| Box::new(ssd) as Box<dyn DetectionStrategy>),
            || {
                tracing::info!(cascade = cascade_model_path, "loading cascade detector");
                let cascade = CascadeDetector::load(cascade_model_path)?;
                Ok(Box::new(cascade))
            },
        )
    }

    /// Use `primary` if it loaded, otherwise whatever `fallback` loads.
    fn with_fallback<F>(
        primary: Result<Box<dyn DetectionStrategy>, DetectorError>,
        fallback: F,
    ) -> Result<Self, DetectorError>
    where
        F: FnOnce() -> Result<Box<dyn DetectionStrategy>, DetectorError>,
    {
        match primary {
            Ok(strategy) => Ok(Self::new(strategy)),
            Err(e) => {
                tracing::warn!(error = %e, "primary detector unavailable; using fallback");
                Ok(Self {
                    strategy: fallback()?,
                    fallback_reason: Some(e.to_string()),
                })
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Why the primary strategy was not used, if it wasn't.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Detect face regions, in detector order, unclipped.
    pub fn locate(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let regions = self.strategy.detect(image)?;
        tracing::debug!(
            strategy = self.strategy.name(),
            count = regions.len(),
            "faces located"
        );
        Ok(regions)
    }
}

/// Strategy returning a fixed list of regions, for tests.
#[cfg(test)]
pub(crate) struct FixedRegions(pub Vec<FaceRegion>);

#[cfg(test)]
impl DetectionStrategy for FixedRegions {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError> {
        Ok(self.0.clone())
    }
}

/// Strategy that always fails, for tests.
#[cfg(test)]
pub(crate) struct BrokenDetector;

#[cfg(test)]
impl DetectionStrategy for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<FaceRegion>, DetectorError> {
        Err(DetectorError::InferenceFailed("detector crashed".into()))
    }
}
