use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Emotion {
    Happy,
    Sad,
    Bored,
    Confused,
    Surprised,
    Angry,
    Neutral,
    Focused,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Bored,
        Emotion::Confused,
        Emotion::Surprised,
        Emotion::Angry,
        Emotion::Neutral,
        Emotion::Focused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Bored => "bored",
            Emotion::Confused => "confused",
            Emotion::Surprised => "surprised",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
            Emotion::Focused => "focused",
        }
    }

    /// Lenient parse for classifier output. Accepts canonical labels as well
    /// as caption-style labels such as `"a happy child"` / `"an angry child"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let word = normalized
            .trim_start_matches("a ")
            .trim_start_matches("an ")
            .trim_end_matches(" child")
            .trim();

        Emotion::ALL.into_iter().find(|e| e.as_str() == word)
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GazeStatus {
    Looking,
    NotLooking,
    NoFace,
}

impl GazeStatus {
    /// Maps the classifier's gaze strings. Anything unrecognised means no
    /// face was found.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOOKING AT SCREEN" | "LOOKING" => GazeStatus::Looking,
            "NOT LOOKING AT SCREEN" | "NOT-LOOKING" | "NOT_LOOKING" => GazeStatus::NotLooking,
            _ => GazeStatus::NoFace,
        }
    }
}

/// One classification result. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionSample {
    emotion: Emotion,
    confidence: f64,
    timestamp: DateTime<Utc>,
    gaze_status: GazeStatus,
    looking_at_screen: bool,
}

impl EmotionSample {
    pub fn new(
        emotion: Emotion,
        confidence: f64,
        timestamp: DateTime<Utc>,
        gaze_status: GazeStatus,
        looking_at_screen: bool,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            emotion,
            confidence,
            timestamp,
            gaze_status,
            looking_at_screen,
        }
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn gaze_status(&self) -> GazeStatus {
        self.gaze_status
    }

    pub fn looking_at_screen(&self) -> bool {
        self.looking_at_screen
    }
}
