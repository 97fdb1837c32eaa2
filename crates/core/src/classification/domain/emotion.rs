use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::shared::constants::PROBABILITY_TOLERANCE;

#[derive(Error, Debug, PartialEq)]
pub enum ScoresError {
    #[error("unknown emotion label '{0}'")]
    UnknownLabel(String),
    #[error("not a probability distribution: {0}")]
    NotADistribution(String),
}

/// The fixed emotion taxonomy, in canonical model-output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const COUNT: usize = 7;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Emotion {
    type Err = ScoresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.label() == s)
            .ok_or_else(|| ScoresError::UnknownLabel(s.to_string()))
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability per emotion, indexed in canonical order.
///
/// Classifier output always sums to 1 (see [`from_probabilities`]).
/// Scoring inputs may be partial ([`from_partial`]), with absent labels
/// held as 0.
///
/// [`from_probabilities`]: Self::from_probabilities
/// [`from_partial`]: Self::from_partial
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionScores {
    values: [f64; Emotion::COUNT],
}

impl EmotionScores {
    /// Validates a full distribution: finite, non-negative, sums to 1.
    pub fn from_probabilities(values: [f64; Emotion::COUNT]) -> Result<Self, ScoresError> {
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ScoresError::NotADistribution(format!(
                "{} has probability {v}",
                Emotion::ALL[i]
            )));
        }
        let total: f64 = values.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ScoresError::NotADistribution(format!(
                "probabilities sum to {total}"
            )));
        }
        Ok(Self { values })
    }

    /// Builds scores from any subset of labels; later duplicates win.
    pub fn from_partial(pairs: impl IntoIterator<Item = (Emotion, f64)>) -> Self {
        let mut values = [0.0; Emotion::COUNT];
        for (emotion, p) in pairs {
            values[emotion.index()] = p;
        }
        Self { values }
    }

    /// Like [`from_partial`](Self::from_partial) but keyed by label text.
    pub fn from_labels<'a>(
        pairs: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, ScoresError> {
        let parsed = pairs
            .into_iter()
            .map(|(label, p)| Ok((label.parse::<Emotion>()?, p)))
            .collect::<Result<Vec<_>, ScoresError>>()?;
        Ok(Self::from_partial(parsed))
    }

    pub fn uniform() -> Self {
        Self {
            values: [1.0 / Emotion::COUNT as f64; Emotion::COUNT],
        }
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.values[emotion.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().zip(self.values.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Highest-probability emotion; ties go to the earlier label.
    pub fn dominant(&self) -> Emotion {
        self.iter()
            .fold((Emotion::Angry, f64::NEG_INFINITY), |best, (e, p)| {
                if p > best.1 {
                    (e, p)
                } else {
                    best
                }
            })
            .0
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::COUNT))?;
        for (emotion, p) in self.iter() {
            map.serialize_entry(emotion.label(), &p)?;
        }
        map.end()
    }
}
