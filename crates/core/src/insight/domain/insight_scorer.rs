use serde::{Deserialize, Serialize};

use crate::classification::domain::emotion::{Emotion, EmotionScores};

/// Three-step level of an interview insight indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::Medium => write!(f, "medium"),
            Level::High => write!(f, "high"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightLabels {
    pub confidence: Level,
    pub anxiety: Level,
    pub nervousness: Level,
}

/// Raw indicator sums the labels are derived from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InsightScores {
    pub confidence: f64,
    pub anxiety: f64,
    pub nervousness: f64,
}

impl InsightScores {
    pub fn from_emotions(scores: &EmotionScores) -> Self {
        Self {
            confidence: scores.get(Emotion::Happy) + scores.get(Emotion::Neutral),
            anxiety: scores.get(Emotion::Fear) + scores.get(Emotion::Sad),
            nervousness: scores.get(Emotion::Surprise) + scores.get(Emotion::Fear),
        }
    }
}

/// Medium/high cut-offs for one indicator. A value must exceed a cut-off
/// to reach that level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub medium: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(medium: f64, high: f64) -> Self {
        Self { medium, high }
    }

    pub fn level(&self, value: f64) -> Level {
        if value > self.high {
            Level::High
        } else if value > self.medium {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    pub confidence: Band,
    pub anxiety: Band,
    pub nervousness: Band,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            confidence: Band::new(0.4, 0.7),
            anxiety: Band::new(0.3, 0.6),
            nervousness: Band::new(0.3, 0.6),
        }
    }
}

impl InsightThresholds {
    /// Each sum covers two probabilities, so cut-offs live in `[0, 2]`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, band) in [
            ("confidence", self.confidence),
            ("anxiety", self.anxiety),
            ("nervousness", self.nervousness),
        ] {
            let in_range = |v: f64| (0.0..=2.0).contains(&v);
            if !in_range(band.medium) || !in_range(band.high) {
                return Err(format!("{name} thresholds must lie in [0, 2]"));
            }
            if band.medium >= band.high {
                return Err(format!(
                    "{name} medium threshold {} must be below high threshold {}",
                    band.medium, band.high
                ));
            }
        }
        Ok(())
    }
}

/// Maps an emotion distribution onto interview insight labels.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsightScorer {
    thresholds: InsightThresholds,
}

impl InsightScorer {
    pub fn new(thresholds: InsightThresholds) -> Self {
        Self { thresholds }
    }

    pub fn sums(&self, scores: &EmotionScores) -> InsightScores {
        InsightScores::from_emotions(scores)
    }

    pub fn score(&self, scores: &EmotionScores) -> InsightLabels {
        let sums = self.sums(scores);
        InsightLabels {
            confidence: self.thresholds.confidence.level(sums.confidence),
            anxiety: self.thresholds.anxiety.level(sums.anxiety),
            nervousness: self.thresholds.nervousness.level(sums.nervousness),
        }
    }
}
