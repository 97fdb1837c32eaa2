use serde::Serialize;
use thiserror::Error;

use crate::classification::domain::emotion::EmotionScores;
use crate::preprocessing::normalized_tensor::NormalizedFaceTensor;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("failed to load emotion model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced invalid output: {0}")]
    InvalidOutput(String),
    #[error("classifier session lock poisoned")]
    LockPoisoned,
}

/// Where a set of scores came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by a real model.
    Inferred,
    /// Fixed stand-in values; no model was consulted.
    Placeholder,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub scores: EmotionScores,
    pub provenance: Provenance,
}

/// Domain interface for emotion classification of a single face tensor.
///
/// Output scores are always a full distribution over the seven emotions,
/// tagged with their [`Provenance`].
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, tensor: NormalizedFaceTensor) -> Result<Classification, ClassificationError>;
}
