//! facetrace-core — face location, encoding, comparison and redaction.
//!
//! Faces are located with an SSD model via ONNX Runtime (or a rustface
//! cascade when the model is unavailable), encoded with texture
//! descriptors, and compared pairwise.

pub mod anonymize;
pub mod attributes;
pub mod cascade;
pub mod comparator;
pub mod confidence;
pub mod descriptor;
pub mod detector;
pub mod encoder;
pub mod pipeline;
pub mod types;

pub use anonymize::Anonymizer;
pub use attributes::{AttributeAnalyzer, CommandAnalyzer, UnavailableAnalyzer};
pub use comparator::{same_person, FaceComparator, DEFAULT_MATCH_THRESHOLD};
pub use detector::{DetectionStrategy, FaceLocator};
pub use encoder::FeatureEncoder;
pub use pipeline::{FaceAnalyzer, FaceOutcome};
pub use types::{AnalysisResult, Encoding, EncodingTier, FaceAttributes, FaceRecord, FaceRegion};

use std::path::PathBuf;

/// Default directory for model files: `$XDG_DATA_HOME/facetrace/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facetrace/models")
}
