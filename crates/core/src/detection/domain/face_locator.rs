use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::frame::{Frame, PixelLayout};
use crate::shared::region::FaceRegion;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("face locator expects a grayscale frame, got {0:?}")]
    NotGrayscale(PixelLayout),
    #[error("invalid detector parameters: {0}")]
    InvalidParams(String),
    #[error("failed to load face cascade '{path}': {reason}")]
    Load { path: String, reason: String },
    #[error("face detection backend failed: {0}")]
    Backend(String),
}

/// Domain interface for face localization.
///
/// Implementations are immutable after construction and shared across
/// concurrent analyses, hence `&self` and `Sync`.
pub trait FaceLocator: Send + Sync {
    /// All face-like regions in detector scan order. An empty vector means
    /// "no face", which is not an error.
    fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, DetectionError>;
}

/// How a single face is chosen when the locator returns several.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// First region in detector scan order (single-subject assumption).
    #[default]
    First,
    /// Largest area; ties go to the earlier region.
    Largest,
    /// Centre closest to the frame centre; ties go to the earlier region.
    MostCentered,
}

impl FaceSelection {
    pub fn select(
        self,
        regions: &[FaceRegion],
        frame_width: u32,
        frame_height: u32,
    ) -> Option<FaceRegion> {
        let first = *regions.first()?;
        let picked = match self {
            FaceSelection::First => first,
            FaceSelection::Largest => regions
                .iter()
                .skip(1)
                .fold(first, |best, r| if r.area() > best.area() { *r } else { best }),
            FaceSelection::MostCentered => {
                let (fx, fy) = (frame_width as f64 / 2.0, frame_height as f64 / 2.0);
                let dist = |r: &FaceRegion| {
                    let (cx, cy) = r.center();
                    (cx - fx).powi(2) + (cy - fy).powi(2)
                };
                regions
                    .iter()
                    .skip(1)
                    .fold(first, |best, r| if dist(r) < dist(&best) { *r } else { best })
            }
        };
        if regions.len() > 1 {
            log::debug!(
                "{} candidate faces; {self} selected {picked}",
                regions.len()
            );
        }
        Some(picked)
    }
}

impl FromStr for FaceSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(FaceSelection::First),
            "largest" => Ok(FaceSelection::Largest),
            "most_centered" | "most-centered" | "centered" => Ok(FaceSelection::MostCentered),
            other => Err(format!(
                "face selection must be one of: first, largest, most_centered, got '{other}'"
            )),
        }
    }
}

impl std::fmt::Display for FaceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaceSelection::First => write!(f, "first"),
            FaceSelection::Largest => write!(f, "largest"),
            FaceSelection::MostCentered => write!(f, "most_centered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn regions() -> Vec<FaceRegion> {
        vec![
            FaceRegion::new(0, 0, 40, 40),
            FaceRegion::new(80, 80, 40, 40),
            FaceRegion::new(150, 10, 60, 60),
        ]
    }

    #[rstest]
    #[case::first(FaceSelection::First, FaceRegion::new(0, 0, 40, 40))]
    #[case::largest(FaceSelection::Largest, FaceRegion::new(150, 10, 60, 60))]
    #[case::centered(FaceSelection::MostCentered, FaceRegion::new(80, 80, 40, 40))]
    fn test_select(#[case] policy: FaceSelection, #[case] expected: FaceRegion) {
        assert_eq!(policy.select(&regions(), 200, 200), Some(expected));
    }

    #[rstest]
    #[case(FaceSelection::First)]
    #[case(FaceSelection::Largest)]
    #[case(FaceSelection::MostCentered)]
    fn test_select_empty_is_none(#[case] policy: FaceSelection) {
        assert_eq!(policy.select(&[], 100, 100), None);
    }

    #[test]
    fn test_largest_tie_keeps_earlier() {
        let rs = vec![FaceRegion::new(0, 0, 30, 30), FaceRegion::new(50, 50, 30, 30)];
        assert_eq!(FaceSelection::Largest.select(&rs, 100, 100), Some(rs[0]));
    }

    #[test]
    fn test_parse_and_display_roundtrip() {
        for policy in [
            FaceSelection::First,
            FaceSelection::Largest,
            FaceSelection::MostCentered,
        ] {
            assert_eq!(policy.to_string().parse::<FaceSelection>().unwrap(), policy);
        }
        assert!("biggest".parse::<FaceSelection>().is_err());
    }

    #[test]
    fn test_default_is_first() {
        assert_eq!(FaceSelection::default(), FaceSelection::First);
    }
}
