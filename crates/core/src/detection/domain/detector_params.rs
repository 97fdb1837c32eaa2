use serde::{Deserialize, Serialize};

use crate::detection::domain::face_locator::DetectionError;
use crate::shared::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_MIN_SIZE, DEFAULT_SCALE_FACTOR};

/// Multi-scale search parameters for a cascade locator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Window growth between pyramid levels; must exceed 1.0. Smaller values
    /// find more faces at higher cost.
    pub scale_factor: f64,
    /// Overlapping hits each kept face needs.
    pub min_neighbors: u32,
    /// Smallest face side in pixels.
    pub min_size: u32,
    /// Largest face side in pixels; unbounded when `None`.
    pub max_size: Option<u32>,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_SIZE,
            max_size: None,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(DetectionError::InvalidParams(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.min_size == 0 {
            return Err(DetectionError::InvalidParams(
                "minimum face size must be positive".into(),
            ));
        }
        let limit = i32::MAX as u32;
        if self.min_neighbors > limit || self.min_size > limit {
            return Err(DetectionError::InvalidParams(format!(
                "neighbour count and face sizes must not exceed {limit}"
            )));
        }
        if let Some(max) = self.max_size {
            if max < self.min_size {
                return Err(DetectionError::InvalidParams(format!(
                    "maximum face size {max} is below minimum {}",
                    self.min_size
                )));
            }
            if max > limit {
                return Err(DetectionError::InvalidParams(format!(
                    "maximum face size must not exceed {limit}"
                )));
            }
        }
        Ok(())
    }
}
