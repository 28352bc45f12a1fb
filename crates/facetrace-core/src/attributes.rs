//! Demographic and emotion attributes from an external analyzer.
//!
//! The analyzer is a collaborator, not part of this crate's pipeline: it may
//! fail or return partial data for any face without affecting the others.

use crate::types::FaceAttributes;
use image::{DynamicImage, ImageFormat};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("no attribute analyzer configured")]
    Unavailable,
    #[error("analyzer returned {0}, expected a JSON object")]
    NotAMapping(&'static str),
    #[error("analyzer exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Demographic/emotion analysis of a cropped face.
pub trait AttributeAnalyzer: Send + Sync {
    fn analyze(
        &self,
        patch: &DynamicImage,
    ) -> impl Future<Output = Result<FaceAttributes, AttributeError>> + Send;
}

impl FaceAttributes {
    /// Pick `age`, `gender` and `emotion` out of an unstructured analyzer reply.
    ///
    /// A top-level array is unwrapped to its first element. Non-numeric
    /// emotion scores are dropped; other keys are ignored.
    pub fn from_mapping(value: serde_json::Value) -> Result<Self, AttributeError> {
        let value = match value {
            serde_json::Value::Array(items) => items.into_iter().next().unwrap_or_default(),
            other => other,
        };

        let mut map = match value {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => return Err(AttributeError::NotAMapping("null")),
            serde_json::Value::Bool(_) => return Err(AttributeError::NotAMapping("a boolean")),
            serde_json::Value::Number(_) => return Err(AttributeError::NotAMapping("a number")),
            serde_json::Value::String(_) => return Err(AttributeError::NotAMapping("a string")),
            serde_json::Value::Array(_) => {
                return Err(AttributeError::NotAMapping("a nested array"))
            }
        };

        let emotion = match map.remove("emotion") {
            Some(serde_json::Value::Object(scores)) => Some(
                scores
                    .into_iter()
                    .filter_map(|(k, v)| v.as_f64().map(|score| (k, score)))
                    .collect::<BTreeMap<_, _>>(),
            ),
            _ => None,
        };

        Ok(Self {
            age: map.remove("age").filter(|v| !v.is_null()),
            gender: map.remove("gender").filter(|v| !v.is_null()),
            emotion,
        })
    }
}

/// Analyzer that always fails; faces degrade to encoding-only records.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableAnalyzer;

impl AttributeAnalyzer for UnavailableAnalyzer {
    async fn analyze(&self, _patch: &DynamicImage) -> Result<FaceAttributes, AttributeError> {
        Err(AttributeError::Unavailable)
    }
}

/// Runs an external program on each face.
///
/// The face is written to a scoped temporary JPEG whose path is appended to
/// the program's arguments; stdout must be a JSON object. The file is removed
/// when the call returns, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a command line; `None` when it is empty.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl AttributeAnalyzer for CommandAnalyzer {
    async fn analyze(&self, patch: &DynamicImage) -> Result<FaceAttributes, AttributeError> {
        let mut face_file = tempfile::Builder::new()
            .prefix("facetrace-face-")
            .suffix(".jpg")
            .tempfile()?;
        DynamicImage::ImageRgb8(patch.to_rgb8())
            .write_to(face_file.as_file_mut(), ImageFormat::Jpeg)?;
        face_file.flush()?;

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(face_file.path())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(AttributeError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let reply: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        FaceAttributes::from_mapping(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_mapping_extracts_known_keys() {
        let attrs = FaceAttributes::from_mapping(json!({
            "age": {"estimated_age": 31, "confidence": 0.8},
            "gender": {"predicted_gender": "Woman", "confidence": 97.5},
            "emotion": {"happy": 80.5, "sad": 2, "note": "x"},
            "region": {"x": 1}
        }))
        .unwrap();
        assert_eq!(attrs.age, Some(json!({"estimated_age": 31, "confidence": 0.8})));
        assert_eq!(attrs.gender.unwrap()["predicted_gender"], "Woman");
        let emotion = attrs.emotion.unwrap();
        assert_eq!(emotion.len(), 2);
        assert_eq!(emotion["happy"], 80.5);
        assert_eq!(emotion["sad"], 2.0);
    }

    #[test]
    fn test_from_mapping_partial() {
        let attrs = FaceAttributes::from_mapping(json!([{"age": 40, "gender": null}])).unwrap();
        assert_eq!(attrs.age, Some(json!(40)));
        assert_eq!(attrs.gender, None);
        assert_eq!(attrs.emotion, None);
    }

    #[test]
    fn test_from_mapping_rejects_scalars() {
        assert!(matches!(
            FaceAttributes::from_mapping(json!("nope")),
            Err(AttributeError::NotAMapping("a string"))
        ));
        assert!(FaceAttributes::from_mapping(json!([])).is_err());
    }

    #[test]
    fn test_from_command_line() {
        assert!(CommandAnalyzer::from_command_line(&[]).is_none());
        let analyzer =
            CommandAnalyzer::from_command_line(&["deepface-cli".into(), "--json".into()]).unwrap();
        assert_eq!(analyzer.program, "deepface-cli");
        assert_eq!(analyzer.args, vec!["--json".to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable_analyzer_fails() {
        let patch = DynamicImage::new_rgb8(4, 4);
        assert!(matches!(
            UnavailableAnalyzer.analyze(&patch).await,
            Err(AttributeError::Unavailable)
        ));
    }

    fn shell_analyzer(script: String) -> CommandAnalyzer {
        CommandAnalyzer::new("sh", vec!["-c".into(), script, "sh".into()])
    }

    #[tokio::test]
    async fn test_command_analyzer_reads_reply_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let seen = dir.path().join("seen");
        let analyzer = shell_analyzer(format!(
            concat!(
                r#"test -s "$1" && echo "$1" > {} && "#,
                r#"echo '{{"age": 30, "emotion": {{"neutral": 91.0}}}}'"#
            ),
            seen.display()
        ));

        let attrs = analyzer.analyze(&DynamicImage::new_rgb8(16, 16)).await.unwrap();
        assert_eq!(attrs.age, Some(json!(30)));
        assert_eq!(attrs.emotion.unwrap()["neutral"], 91.0);

        let face_path = std::fs::read_to_string(&seen).unwrap();
        assert!(face_path.trim().ends_with(".jpg"));
        assert!(!std::path::Path::new(face_path.trim()).exists());
    }

    #[tokio::test]
    async fn test_command_analyzer_failure_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let seen = dir.path().join("seen");
        let analyzer = shell_analyzer(format!(
            r#"echo "$1" > {}; echo boom >&2; exit 3"#,
            seen.display()
        ));

        let err = analyzer.analyze(&DynamicImage::new_rgb8(8, 8)).await.unwrap_err();
        match err {
            AttributeError::CommandFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }

        let face_path = std::fs::read_to_string(&seen).unwrap();
        assert!(!std::path::Path::new(face_path.trim()).exists());
    }

    #[tokio::test]
    async fn test_command_analyzer_rejects_non_json() {
        let analyzer = shell_analyzer("echo not-json".into());
        assert!(matches!(
            analyzer.analyze(&DynamicImage::new_rgb8(8, 8)).await,
            Err(AttributeError::Json(_))
        ));
    }
}
