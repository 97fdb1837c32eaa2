use std::sync::Arc;
use std::time::Instant;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::capture::domain::capture_guard::CaptureGuard;
use crate::capture::domain::frame_source::{CaptureError, FrameSource, VideoSource};
use crate::classification::domain::emotion::{Emotion, EmotionScores};
use crate::classification::domain::emotion_classifier::{
    ClassificationError, EmotionClassifier, Provenance,
};
use crate::detection::domain::face_locator::{DetectionError, FaceLocator, FaceSelection};
use crate::insight::domain::insight_scorer::{
    InsightLabels, InsightScorer, InsightScores, InsightThresholds,
};
use crate::preprocessing::frame_preprocessor::{FramePreprocessor, PreprocessError};
use crate::preprocessing::normalized_tensor::NormalizedFaceTensor;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("video source unavailable: {0}")]
    DeviceUnavailable(#[source] CaptureError),
    #[error("failed to read a frame: {0}")]
    FrameReadFailure(#[source] CaptureError),
    #[error("no face detected")]
    NoFaceDetected { confidence: f64 },
    #[error("real inference required but only placeholder scores are available")]
    InferenceUnavailable,
    #[error("face detection failed: {0}")]
    Detection(#[from] DetectionError),
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("classification failed: {0}")]
    Classification(#[from] ClassificationError),
}

impl AnalysisError {
    pub fn no_face() -> Self {
        AnalysisError::NoFaceDetected { confidence: 0.0 }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::DeviceUnavailable(_) => "device_unavailable",
            AnalysisError::FrameReadFailure(_) => "frame_read_failure",
            AnalysisError::NoFaceDetected { .. } => "no_face_detected",
            AnalysisError::InferenceUnavailable => "inference_unavailable",
            AnalysisError::Detection(_) => "detection",
            AnalysisError::Preprocess(_) => "preprocess",
            AnalysisError::Classification(_) => "classification",
        }
    }

    /// Read failures may succeed on a later attempt; nothing else will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::FrameReadFailure(_))
    }
}

impl Serialize for AnalysisError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("error", self.kind())?;
        map.serialize_entry("message", &self.to_string())?;
        if let AnalysisError::NoFaceDetected { confidence } = self {
            map.serialize_entry("confidence", confidence)?;
        }
        map.end()
    }
}

/// Outcome of analyzing one face in one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub frame_index: usize,
    pub region: FaceRegion,
    pub faces_found: usize,
    pub scores: EmotionScores,
    pub dominant: Emotion,
    pub provenance: Provenance,
    pub insights: InsightLabels,
    pub indicator_sums: InsightScores,
}

/// Device-free analysis of already-captured frames.
///
/// Cheap to clone; the locator and classifier are shared.
#[derive(Clone)]
pub struct FaceAnalyzer {
    locator: Arc<dyn FaceLocator>,
    classifier: Arc<dyn EmotionClassifier>,
    preprocessor: FramePreprocessor,
    scorer: InsightScorer,
    selection: FaceSelection,
    require_inference: bool,
}

impl FaceAnalyzer {
    pub fn new(locator: Arc<dyn FaceLocator>, classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self {
            locator,
            classifier,
            preprocessor: FramePreprocessor::new(),
            scorer: InsightScorer::default(),
            selection: FaceSelection::default(),
            require_inference: false,
        }
    }

    pub fn with_selection(mut self, selection: FaceSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_thresholds(mut self, thresholds: InsightThresholds) -> Self {
        self.scorer = InsightScorer::new(thresholds);
        self
    }

    /// Turn placeholder output into [`AnalysisError::InferenceUnavailable`].
    pub fn with_require_inference(mut self, require: bool) -> Self {
        self.require_inference = require;
        self
    }

    /// Locates, selects and normalizes the face in `frame`.
    pub fn preprocess(&self, frame: &Frame) -> Result<NormalizedFaceTensor, AnalysisError> {
        let (region, _) = self.select_face(frame)?;
        Ok(self.preprocessor.preprocess(frame, region)?)
    }

    pub fn analyze_frame(&self, frame: &Frame) -> Result<Analysis, AnalysisError> {
        let start = Instant::now();
        let (region, faces_found) = self.select_face(frame)?;
        let tensor = self.preprocessor.preprocess(frame, region)?;
        let classification = self.classifier.classify(tensor)?;

        if classification.provenance == Provenance::Placeholder && self.require_inference {
            return Err(AnalysisError::InferenceUnavailable);
        }

        let scores = classification.scores;
        let analysis = Analysis {
            frame_index: frame.index(),
            region,
            faces_found,
            scores,
            dominant: scores.dominant(),
            provenance: classification.provenance,
            insights: self.scorer.score(&scores),
            indicator_sums: self.scorer.sums(&scores),
        };
        log::debug!(
            "Analyzed frame {} in {:.1}ms: {} ({:?})",
            frame.index(),
            start.elapsed().as_secs_f64() * 1000.0,
            analysis.dominant,
            analysis.provenance
        );
        Ok(analysis)
    }

    fn select_face(&self, frame: &Frame) -> Result<(FaceRegion, usize), AnalysisError> {
        let gray = frame.to_grayscale();
        let start = Instant::now();
        let regions = self.locator.locate(&gray)?;
        log::debug!(
            "Located {} face(s) in {:.1}ms",
            regions.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        let region = self
            .selection
            .select(&regions, frame.width(), frame.height())
            .ok_or_else(AnalysisError::no_face)?;
        Ok((region, regions.len()))
    }
}

/// One capture → insight cycle over a live or stored source.
pub struct AnalysisSession {
    source: Arc<dyn FrameSource>,
    analyzer: FaceAnalyzer,
}

impl AnalysisSession {
    pub fn new(source: Arc<dyn FrameSource>, analyzer: FaceAnalyzer) -> Self {
        Self { source, analyzer }
    }

    /// Opens `video`, grabs a single frame, and analyzes it.
    ///
    /// The capture is released as soon as the frame is read, and on every
    /// early return or unwind before that.
    pub fn analyze(&self, video: &VideoSource) -> Result<Analysis, AnalysisError> {
        let handle = self
            .source
            .open(video)
            .map_err(AnalysisError::DeviceUnavailable)?;
        let mut guard = CaptureGuard::new(handle);

        let frame = guard
            .read_frame()
            .and_then(|frame| {
                frame.ok_or_else(|| CaptureError::Read(format!("{video} produced no frame")))
            })
            .map_err(AnalysisError::FrameReadFailure)?;
        guard.release();

        self.analyzer.analyze_frame(&frame)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::domain::frame_source::CaptureHandle;
    use crate::classification::domain::emotion_classifier::Classification;
    use crate::classification::infrastructure::placeholder_classifier::PlaceholderClassifier;
    use crate::insight::domain::insight_scorer::Level;
    use crate::shared::frame::PixelLayout;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // --- Stubs ---

    #[derive(Clone, Copy)]
    pub(crate) enum ReadBehavior {
        Frame,
        Empty,
        Fail,
    }

    pub(crate) struct StubSource {
        pub(crate) releases: Arc<AtomicUsize>,
        pub(crate) opens: Arc<AtomicUsize>,
        pub(crate) behavior: ReadBehavior,
        pub(crate) open_fails: bool,
    }

    impl StubSource {
        pub(crate) fn new(behavior: ReadBehavior) -> Self {
            Self {
                releases: Arc::new(AtomicUsize::new(0)),
                opens: Arc::new(AtomicUsize::new(0)),
                behavior,
                open_fails: false,
            }
        }
    }

    struct StubHandle {
        releases: Arc<AtomicUsize>,
        behavior: ReadBehavior,
    }

    impl CaptureHandle for StubHandle {
        fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            match self.behavior {
                ReadBehavior::Frame => Ok(Some(test_frame())),
                ReadBehavior::Empty => Ok(None),
                ReadBehavior::Fail => Err(CaptureError::Read("device unplugged".into())),
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FrameSource for StubSource {
        fn open(&self, source: &VideoSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.open_fails {
                return Err(CaptureError::Open {
                    source_name: source.to_string(),
                    reason: "busy".into(),
                });
            }
            Ok(Box::new(StubHandle {
                releases: self.releases.clone(),
                behavior: self.behavior,
            }))
        }
    }

    pub(crate) struct StubLocator {
        pub(crate) regions: Vec<FaceRegion>,
        pub(crate) calls: AtomicUsize,
        pub(crate) fails: bool,
    }

    impl StubLocator {
        pub(crate) fn new(regions: Vec<FaceRegion>) -> Self {
            Self {
                regions,
                calls: AtomicUsize::new(0),
                fails: false,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fails: true,
                ..Self::new(vec![])
            }
        }
    }

    impl FaceLocator for StubLocator {
        fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
            assert!(gray.is_grayscale());
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                return Err(DetectionError::Backend("cascade evaluation failed".into()));
            }
            Ok(self.regions.clone())
        }
    }

    #[derive(Clone, Copy)]
    pub(crate) enum ClassifyBehavior {
        Fixed,
        Fail,
        Panic,
    }

    pub(crate) struct StubClassifier {
        pub(crate) behavior: ClassifyBehavior,
        pub(crate) seen: Mutex<Vec<f32>>,
    }

    impl StubClassifier {
        pub(crate) fn new(behavior: ClassifyBehavior) -> Self {
            Self {
                behavior,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    pub(crate) fn fixed_scores() -> EmotionScores {
        EmotionScores::from_probabilities([0.05, 0.05, 0.05, 0.6, 0.05, 0.05, 0.15]).unwrap()
    }

    impl EmotionClassifier for StubClassifier {
        fn classify(
            &self,
            tensor: NormalizedFaceTensor,
        ) -> Result<Classification, ClassificationError> {
            self.seen.lock().unwrap().push(tensor.view()[[0, 0, 0, 0]]);
            match self.behavior {
                ClassifyBehavior::Fixed => Ok(Classification {
                    scores: fixed_scores(),
                    provenance: Provenance::Inferred,
                }),
                ClassifyBehavior::Fail => Err(ClassificationError::Inference("boom".into())),
                ClassifyBehavior::Panic => panic!("classifier crashed"),
            }
        }
    }

    pub(crate) fn test_frame() -> Frame {
        let (w, h) = (64u32, 64u32);
        let data = (0..(w * h * 3) as usize).map(|i| (i % 251) as u8).collect();
        Frame::new(data, w, h, PixelLayout::Rgb, 3)
    }

    fn face() -> FaceRegion {
        FaceRegion::new(8, 8, 40, 40)
    }

    fn session(
        source: StubSource,
        regions: Vec<FaceRegion>,
        behavior: ClassifyBehavior,
    ) -> (AnalysisSession, Arc<AtomicUsize>) {
        let releases = source.releases.clone();
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(regions)),
            Arc::new(StubClassifier::new(behavior)),
        );
        (AnalysisSession::new(Arc::new(source), analyzer), releases)
    }

    // --- Release-exactly-once ---

    #[test]
    fn test_success_releases_once() {
        let (s, releases) = session(
            StubSource::new(ReadBehavior::Frame),
            vec![face()],
            ClassifyBehavior::Fixed,
        );
        let analysis = s.analyze(&VideoSource::Device(0)).unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.region, face());
        assert_eq!(analysis.frame_index, 3);
        assert_eq!(analysis.dominant, Emotion::Happy);
        assert_eq!(analysis.provenance, Provenance::Inferred);
        assert_eq!(analysis.insights.confidence, Level::High);
    }

    #[test]
    fn test_no_face_releases_once_and_skips_classifier() {
        let classifier = Arc::new(StubClassifier::new(ClassifyBehavior::Fixed));
        let source = StubSource::new(ReadBehavior::Frame);
        let releases = source.releases.clone();
        let s = AnalysisSession::new(
            Arc::new(source),
            FaceAnalyzer::new(Arc::new(StubLocator::new(vec![])), classifier.clone()),
        );

        let err = s.analyze(&VideoSource::Device(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFaceDetected { confidence } if confidence == 0.0));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_read_error_releases_once() {
        let (s, releases) = session(
            StubSource::new(ReadBehavior::Fail),
            vec![face()],
            ClassifyBehavior::Fixed,
        );
        let err = s.analyze(&VideoSource::Device(1)).unwrap_err();
        assert!(matches!(err, AnalysisError::FrameReadFailure(CaptureError::Read(_))));
        assert!(err.is_retryable());
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.to_string().contains("device unplugged"));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_read_releases_once() {
        let (s, releases) = session(
            StubSource::new(ReadBehavior::Empty),
            vec![face()],
            ClassifyBehavior::Fixed,
        );
        let err = s.analyze(&VideoSource::Device(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::FrameReadFailure(_)));
        assert!(err.to_string().contains("produced no frame"));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detection_error_releases_once_and_skips_classifier() {
        let classifier = Arc::new(StubClassifier::new(ClassifyBehavior::Fixed));
        let source = StubSource::new(ReadBehavior::Frame);
        let releases = source.releases.clone();
        let s = AnalysisSession::new(
            Arc::new(source),
            FaceAnalyzer::new(Arc::new(StubLocator::failing()), classifier.clone()),
        );

        let err = s.analyze(&VideoSource::Device(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::Detection(DetectionError::Backend(_))));
        assert_eq!(err.kind(), "detection");
        assert!(!err.is_retryable());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_preprocess_error_releases_once_and_skips_classifier() {
        let classifier = Arc::new(StubClassifier::new(ClassifyBehavior::Fixed));
        let source = StubSource::new(ReadBehavior::Frame);
        let releases = source.releases.clone();
        let overhanging = FaceRegion::new(40, 40, 40, 40);
        let s = AnalysisSession::new(
            Arc::new(source),
            FaceAnalyzer::new(Arc::new(StubLocator::new(vec![overhanging])), classifier.clone()),
        );

        let err = s.analyze(&VideoSource::Device(0)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Preprocess(PreprocessError::RegionOutOfBounds { .. })
        ));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_classifier_error_releases_once() {
        let (s, releases) = session(
            StubSource::new(ReadBehavior::Frame),
            vec![face()],
            ClassifyBehavior::Fail,
        );
        let err = s.analyze(&VideoSource::Device(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::Classification(_)));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classifier_panic_releases_once() {
        let (s, releases) = session(
            StubSource::new(ReadBehavior::Frame),
            vec![face()],
            ClassifyBehavior::Panic,
        );
        let result = catch_unwind(AssertUnwindSafe(|| s.analyze(&VideoSource::Device(0))));
        assert!(result.is_err());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_is_device_unavailable() {
        let mut source = StubSource::new(ReadBehavior::Frame);
        source.open_fails = true;
        let (s, releases) = session(source, vec![face()], ClassifyBehavior::Fixed);
        let err = s.analyze(&VideoSource::Device(7)).unwrap_err();
        assert!(matches!(err, AnalysisError::DeviceUnavailable(_)));
        assert!(!err.is_retryable());
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    // --- Analyzer ---

    #[test]
    fn test_deterministic_classifier_is_stable() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![face()])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        let frame = test_frame();
        let a = analyzer.analyze_frame(&frame).unwrap();
        let b = analyzer.analyze_frame(&frame).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_policy_applied() {
        let small = FaceRegion::new(0, 0, 10, 10);
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![small, face()])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        let frame = test_frame();
        assert_eq!(analyzer.analyze_frame(&frame).unwrap().region, small);

        let largest = analyzer.with_selection(FaceSelection::Largest);
        let analysis = largest.analyze_frame(&frame).unwrap();
        assert_eq!(analysis.region, face());
        assert_eq!(analysis.faces_found, 2);
    }

    #[test]
    fn test_preprocess_without_face_is_no_face() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        assert!(matches!(
            analyzer.preprocess(&test_frame()),
            Err(AnalysisError::NoFaceDetected { .. })
        ));
    }

    #[test]
    fn test_preprocess_yields_model_input() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![face()])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        let tensor = analyzer.preprocess(&test_frame()).unwrap();
        assert_eq!(tensor.shape(), &NormalizedFaceTensor::SHAPE);
    }

    #[test]
    fn test_region_outside_frame_is_preprocess_error() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![FaceRegion::new(40, 40, 40, 40)])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        assert!(matches!(
            analyzer.analyze_frame(&test_frame()),
            Err(AnalysisError::Preprocess(_))
        ));
    }

    #[test]
    fn test_placeholder_is_tagged() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![face()])),
            Arc::new(PlaceholderClassifier::new()),
        );
        let analysis = analyzer.analyze_frame(&test_frame()).unwrap();
        assert_eq!(analysis.provenance, Provenance::Placeholder);
    }

    #[test]
    fn test_placeholder_rejected_when_inference_required() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![face()])),
            Arc::new(PlaceholderClassifier::new()),
        )
        .with_require_inference(true);
        assert!(matches!(
            analyzer.analyze_frame(&test_frame()),
            Err(AnalysisError::InferenceUnavailable)
        ));
    }

    #[test]
    fn test_no_face_serializes_with_zero_confidence() {
        let json = serde_json::to_value(AnalysisError::no_face()).unwrap();
        assert_eq!(json["error"], "no_face_detected");
        assert_eq!(json["confidence"], 0.0);
    }

    #[test]
    fn test_analysis_serializes_scores_and_labels() {
        let analyzer = FaceAnalyzer::new(
            Arc::new(StubLocator::new(vec![face()])),
            Arc::new(StubClassifier::new(ClassifyBehavior::Fixed)),
        );
        let json = serde_json::to_value(analyzer.analyze_frame(&test_frame()).unwrap()).unwrap();
        assert_eq!(json["dominant"], "happy");
        assert_eq!(json["provenance"], "inferred");
        assert_eq!(json["insights"]["confidence"], "high");
        assert_eq!(json["region"]["width"], 40);
    }
}
