use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;

use crate::detection::domain::detector_params::DetectorParams;
use crate::detection::domain::face_locator::{DetectionError, FaceLocator};
use crate::shared::constants::{CASCADE_NAME, SYSTEM_CASCADE_DIRS};
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

/// Viola–Jones face locator backed by OpenCV's `CascadeClassifier`.
///
/// Loads the standard XML cascades (e.g. `haarcascade_frontalface_default.xml`)
/// and runs `detectMultiScale` with the configured [`DetectorParams`].
/// OpenCV's detector needs `&mut`, so the classifier sits behind a `Mutex`.
pub struct OpenCvFaceLocator {
    classifier: Mutex<CascadeClassifier>,
    params: DetectorParams,
}

impl OpenCvFaceLocator {
    pub fn new(cascade_path: &Path, params: DetectorParams) -> Result<Self, DetectionError> {
        params.validate()?;

        let path_str = cascade_path.to_string_lossy().to_string();
        let load_err = |reason: String| DetectionError::Load {
            path: path_str.clone(),
            reason,
        };
        if !cascade_path.is_file() {
            return Err(load_err("file not found".into()));
        }

        let classifier = CascadeClassifier::new(&path_str).map_err(|e| load_err(e.to_string()))?;
        if classifier.empty().map_err(|e| load_err(e.to_string()))? {
            return Err(load_err("not a usable cascade".into()));
        }

        log::info!("Loaded face cascade from {}", cascade_path.display());
        Ok(Self {
            classifier: Mutex::new(classifier),
            params,
        })
    }
}

impl FaceLocator for OpenCvFaceLocator {
    fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
        if !gray.is_grayscale() {
            return Err(DetectionError::NotGrayscale(gray.layout()));
        }
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Vec::new());
        }

        let backend = |e: opencv::Error| DetectionError::Backend(e.to_string());
        let rows = i32::try_from(gray.height())
            .map_err(|_| DetectionError::Backend(format!("frame height {} too large", gray.height())))?;
        let mat = Mat::from_slice(gray.data()).map_err(backend)?;
        let mat = mat.reshape(1, rows).map_err(backend)?;

        let start = Instant::now();
        let mut rects = Vector::<Rect>::new();
        {
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| DetectionError::Backend("cascade lock poisoned".into()))?;
            classifier
                .detect_multi_scale(
                    &mat,
                    &mut rects,
                    self.params.scale_factor,
                    self.params.min_neighbors as i32,
                    0,
                    square(Some(self.params.min_size)),
                    square(self.params.max_size),
                )
                .map_err(backend)?;
        }

        let faces: Vec<FaceRegion> = rects
            .iter()
            .filter_map(|r| to_region(r, gray.width(), gray.height()))
            .collect();
        log::debug!(
            "Cascade found {} of {} candidate rects in {:.1}ms",
            faces.len(),
            rects.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(faces)
    }
}

/// Looks for the stock frontal-face cascade in the usual OpenCV install dirs.
pub fn system_cascade() -> Option<PathBuf> {
    SYSTEM_CASCADE_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(CASCADE_NAME))
        .find(|p| p.is_file())
}

/// `Size(0, 0)` means "no bound" to OpenCV. Sizes are validated to fit `i32`.
fn square(side: Option<u32>) -> Size {
    let side = side.map_or(0, |s| s as i32);
    Size::new(side, side)
}

/// Rects are used as-is when they lie inside the frame and dropped otherwise.
fn to_region(rect: Rect, frame_w: u32, frame_h: u32) -> Option<FaceRegion> {
    let region = FaceRegion::new(
        u32::try_from(rect.x).ok()?,
        u32::try_from(rect.y).ok()?,
        u32::try_from(rect.width).ok()?,
        u32::try_from(rect.height).ok()?,
    );
    if region.fits_within(frame_w, frame_h) {
        Some(region)
    } else {
        log::debug!("Dropping cascade rect {region} outside {frame_w}x{frame_h} frame");
        None
    }
}
