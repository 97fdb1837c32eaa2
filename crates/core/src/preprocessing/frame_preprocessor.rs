use std::borrow::Cow;

use thiserror::Error;

use crate::preprocessing::normalized_tensor::NormalizedFaceTensor;
use crate::shared::constants::FACE_INPUT_SIZE;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;
use crate::shared::resize::resize_area;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("face region {region} lies outside the {frame_width}x{frame_height} frame")]
    RegionOutOfBounds {
        region: FaceRegion,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Turns a located face into the classifier's fixed input.
///
/// Grayscale → crop → 48×48 area resize → `/255` → `[1, 48, 48, 1]`.
/// Pure: identical inputs give bit-identical tensors.
#[derive(Clone, Copy, Debug, Default)]
pub struct FramePreprocessor;

impl FramePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn preprocess(
        &self,
        frame: &Frame,
        region: FaceRegion,
    ) -> Result<NormalizedFaceTensor, PreprocessError> {
        if !region.fits_within(frame.width(), frame.height()) {
            return Err(PreprocessError::RegionOutOfBounds {
                region,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        let gray: Cow<'_, Frame> = if frame.is_grayscale() {
            Cow::Borrowed(frame)
        } else {
            Cow::Owned(frame.to_grayscale())
        };

        let crop = crop(&gray, region);
        let resized = resize_area(
            &crop,
            region.width as usize,
            region.height as usize,
            FACE_INPUT_SIZE,
            FACE_INPUT_SIZE,
        );
        let normalized: Vec<f32> = resized
            .into_iter()
            .map(|v| (v / u8::MAX as f32).clamp(0.0, 1.0))
            .collect();

        Ok(NormalizedFaceTensor::from_normalized(normalized)
            .expect("48x48 values in [0, 1] always form a valid tensor"))
    }
}

/// Copies the region's rows out of a grayscale frame. Region must fit.
fn crop(gray: &Frame, region: FaceRegion) -> Vec<u8> {
    let stride = gray.width() as usize;
    let (x, y) = (region.x as usize, region.y as usize);
    let (w, h) = (region.width as usize, region.height as usize);
    let data = gray.data();

    let mut out = Vec::with_capacity(w * h);
    for row in y..y + h {
        let start = row * stride + x;
        out.extend_from_slice(&data[start..start + w]);
    }
    out
}
