use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Emotion;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionStat {
    pub count: usize,
    /// Share of all samples, 0-100.
    pub pct: f64,
    /// Share of this emotion's samples taken while looking at the screen, 0-100.
    pub looking_pct: f64,
    pub time_sec: f64,
    pub looking_time_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttentionMetrics {
    pub total_time_sec: f64,
    pub screen_looking_time_sec: f64,
    pub screen_looking_pct: f64,
    pub emotion_stats: BTreeMap<Emotion, EmotionStat>,
    pub dominant_emotion: Emotion,
    pub attention_score: f64,
    pub distraction_event_count: u32,
    pub sample_count: usize,
}

impl AttentionMetrics {
    /// Neutral reading used when there are no samples to judge from.
    pub fn neutral(total_time_sec: f64) -> Self {
        Self {
            total_time_sec: total_time_sec.max(0.0),
            screen_looking_time_sec: 0.0,
            screen_looking_pct: 0.0,
            emotion_stats: BTreeMap::new(),
            dominant_emotion: Emotion::Neutral,
            attention_score: 50.0,
            distraction_event_count: 0,
            sample_count: 0,
        }
    }

    pub fn has_samples(&self) -> bool {
        self.sample_count > 0
    }

    pub fn dominant_share_pct(&self) -> f64 {
        self.emotion_stats
            .get(&self.dominant_emotion)
            .map(|stat| stat.pct)
            .unwrap_or(0.0)
    }
}

impl Default for AttentionMetrics {
    fn default() -> Self {
        Self::neutral(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackKind {
    Success,
    Warning,
    Info,
}

/// Short message for the live feedback banner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub message: String,
    pub kind: FeedbackKind,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrend {
    pub emotion: Emotion,
    pub confidence: f64,
    pub looking_at_screen: bool,
}
