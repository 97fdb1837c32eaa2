use crate::classification::domain::emotion::EmotionScores;
use crate::classification::domain::emotion_classifier::{
    Classification, ClassificationError, EmotionClassifier, Provenance,
};
use crate::preprocessing::normalized_tensor::NormalizedFaceTensor;

/// Stand-in used when no emotion model is available.
///
/// Always returns the uniform distribution tagged [`Provenance::Placeholder`]
/// so callers can tell it apart from real inference. Every call logs a
/// warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderClassifier;

impl PlaceholderClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl EmotionClassifier for PlaceholderClassifier {
    fn classify(
        &self,
        _tensor: NormalizedFaceTensor,
    ) -> Result<Classification, ClassificationError> {
        log::warn!("No emotion model loaded; returning placeholder scores");
        Ok(Classification {
            scores: EmotionScores::uniform(),
            provenance: Provenance::Placeholder,
        })
    }
}
