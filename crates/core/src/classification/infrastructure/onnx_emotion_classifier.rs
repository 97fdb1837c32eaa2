/// FER-style emotion classifier backed by ONNX Runtime.
///
/// Expects a single-output model producing seven scores in canonical
/// emotion order, either as logits or as a probability distribution.
use std::path::Path;
use std::sync::Mutex;

use crate::classification::domain::emotion::{Emotion, EmotionScores};
use crate::classification::domain::emotion_classifier::{
    Classification, ClassificationError, EmotionClassifier, Provenance,
};
use crate::classification::infrastructure::execution_provider::{
    intra_threads, preferred_execution_providers,
};
use crate::preprocessing::normalized_tensor::{NormalizedFaceTensor, TensorLayout};

/// Outputs already summing to 1 within this are treated as probabilities.
const DISTRIBUTION_TOLERANCE: f64 = 1e-3;

pub struct OnnxEmotionClassifier {
    session: Mutex<ort::session::Session>,
    layout: TensorLayout,
}

impl OnnxEmotionClassifier {
    pub fn new(model_path: &Path, layout: TensorLayout) -> Result<Self, ClassificationError> {
        let session = build_session(model_path).map_err(|e| ClassificationError::ModelLoad {
            path: model_path.display().to_string(),
            reason: e.to_string(),
        })?;
        log::info!(
            "Loaded emotion model {} ({layout:?} input)",
            model_path.display()
        );
        Ok(Self {
            session: Mutex::new(session),
            layout,
        })
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads())?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, tensor: NormalizedFaceTensor) -> Result<Classification, ClassificationError> {
        let start = std::time::Instant::now();
        let input = tensor.into_layout(self.layout);
        let input_value = ort::value::Tensor::from_array(input)
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        let raw: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| ClassificationError::LockPoisoned)?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(|e| ClassificationError::Inference(e.to_string()))?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| ClassificationError::InvalidOutput(e.to_string()))?;
            output.iter().copied().collect()
        };

        let scores = scores_from_output(&raw)?;
        log::debug!(
            "Emotion inference took {:.1}ms, dominant {}",
            start.elapsed().as_secs_f64() * 1000.0,
            scores.dominant()
        );
        Ok(Classification {
            scores,
            provenance: Provenance::Inferred,
        })
    }
}

/// Converts raw model output into a probability distribution.
///
/// Non-negative outputs summing to ~1 are renormalized; anything else is
/// treated as logits and passed through a softmax.
fn scores_from_output(raw: &[f32]) -> Result<EmotionScores, ClassificationError> {
    if raw.len() != Emotion::COUNT {
        return Err(ClassificationError::InvalidOutput(format!(
            "expected {} scores, got {}",
            Emotion::COUNT,
            raw.len()
        )));
    }
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(ClassificationError::InvalidOutput(
            "non-finite score in model output".into(),
        ));
    }

    let mut values = [0.0f64; Emotion::COUNT];
    for (dst, src) in values.iter_mut().zip(raw) {
        *dst = *src as f64;
    }

    let total: f64 = values.iter().sum();
    let is_distribution =
        values.iter().all(|v| *v >= 0.0) && (total - 1.0).abs() <= DISTRIBUTION_TOLERANCE;
    if is_distribution {
        values.iter_mut().for_each(|v| *v /= total);
    } else {
        softmax(&mut values);
    }

    EmotionScores::from_probabilities(values)
        .map_err(|e| ClassificationError::InvalidOutput(e.to_string()))
}

fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    values.iter_mut().for_each(|v| *v /= sum);
}
