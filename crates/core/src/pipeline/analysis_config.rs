use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_locator::FaceSelection;
use crate::detection::domain::detector_params::DetectorParams;
use crate::insight::domain::insight_scorer::InsightThresholds;
use crate::pipeline::analysis_session::FaceAnalyzer;
use crate::preprocessing::normalized_tensor::TensorLayout;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to assemble an analysis, loadable from JSON.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub detector: DetectorParams,
    pub selection: FaceSelection,
    pub require_inference: bool,
    pub tensor_layout: TensorLayout,
    pub thresholds: InsightThresholds,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub cascade_path: Option<PathBuf>,
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded analysis config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.thresholds.validate().map_err(ConfigError::Invalid)
    }

    /// Applies selection, thresholds and the inference requirement.
    pub fn configure(&self, analyzer: FaceAnalyzer) -> FaceAnalyzer {
        analyzer
            .with_selection(self.selection)
            .with_thresholds(self.thresholds)
            .with_require_inference(self.require_inference)
    }
}
