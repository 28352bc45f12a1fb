use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file, then `FACETRACE_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing model files.
    pub model_dir: PathBuf,
    /// SSD detector ONNX file name, relative to `model_dir`.
    pub ssd_model: String,
    /// SeetaFace cascade model file name, relative to `model_dir`.
    pub cascade_model: String,
    /// Default threshold for `compare`.
    pub match_threshold: f32,
    /// External demographic/emotion analyzer: program followed by its arguments.
    pub attribute_command: Vec<String>,
}

/// On-disk form; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    model_dir: Option<PathBuf>,
    ssd_model: Option<String>,
    cascade_model: Option<String>,
    match_threshold: Option<f32>,
    attribute_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: facetrace_core::default_model_dir(),
            ssd_model: "res10_300x300_ssd.onnx".to_string(),
            cascade_model: "seeta_fd_frontal_v1.0.bin".to_string(),
            match_threshold: facetrace_core::DEFAULT_MATCH_THRESHOLD,
            attribute_command: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration. `path` (or `FACETRACE_CONFIG`) names an optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACETRACE_CONFIG").ok().map(PathBuf::from));

        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            config
                .apply_toml(&text)
                .with_context(|| format!("parsing config {}", path.display()))?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.ssd_model {
            self.ssd_model = v;
        }
        if let Some(v) = file.cascade_model {
            self.cascade_model = v;
        }
        if let Some(v) = file.match_threshold {
            self.match_threshold = v;
        }
        if let Some(v) = file.attribute_command {
            self.attribute_command = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("FACETRACE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FACETRACE_SSD_MODEL") {
            self.ssd_model = v;
        }
        if let Some(v) = var("FACETRACE_CASCADE_MODEL") {
            self.cascade_model = v;
        }
        if let Some(v) = var("FACETRACE_MATCH_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.match_threshold = v;
        }
        if let Some(v) = var("FACETRACE_ATTRIBUTE_COMMAND") {
            self.attribute_command = v.split_whitespace().map(str::to_string).collect();
        }
    }

    /// Path to the SSD detection model.
    pub fn ssd_model_path(&self) -> String {
        self.model_dir
            .join(&self.ssd_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the cascade detection model.
    pub fn cascade_model_path(&self) -> String {
        self.model_dir
            .join(&self.cascade_model)
            .to_string_lossy()
            .into_owned()
    }
}
