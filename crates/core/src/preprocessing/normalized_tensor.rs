use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::shared::constants::FACE_INPUT_SIZE;

/// Axis order a classifier expects its input in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]` (Keras-style models).
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]` (PyTorch-style models).
    Nchw,
}

impl std::str::FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(format!("layout must be 'nhwc' or 'nchw', got '{other}'")),
        }
    }
}

/// A face crop ready for classification: `[1, 48, 48, 1]` with values in
/// `[0, 1]`.
///
/// Deliberately not `Clone`: each tensor is produced for one region and
/// handed to the classifier by value.
#[derive(Debug, PartialEq)]
pub struct NormalizedFaceTensor {
    data: Array4<f32>,
}

impl NormalizedFaceTensor {
    pub const SHAPE: [usize; 4] = [1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1];

    /// Wraps row-major `48 × 48` intensities already scaled to `[0, 1]`.
    ///
    /// Returns `None` if the length is wrong or a value is outside `[0, 1]`.
    pub fn from_normalized(values: Vec<f32>) -> Option<Self> {
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return None;
        }
        let data = Array4::from_shape_vec(
            (1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1),
            values,
        )
        .ok()?;
        Some(Self { data })
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Consumes the tensor into the requested axis order.
    ///
    /// With a single channel both layouts share the same memory order, so
    /// this only relabels the shape.
    pub fn into_layout(self, layout: TensorLayout) -> Array4<f32> {
        match layout {
            TensorLayout::Nhwc => self.data,
            TensorLayout::Nchw => self.data.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned(),
        }
    }
}
