use serde::{Deserialize, Serialize};

/// Tunable thresholds for the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionConfig {
    /// Emotion analysis: positive emotion above this score votes increase
    pub high_attention_score: f64,
    /// Emotion analysis: any emotion below this score votes decrease
    pub low_attention_score: f64,
    /// Bored yet above this score reads as under-challenged
    pub bored_attentive_score: f64,

    /// Performance analysis
    pub high_accuracy: f64,
    pub fast_reaction_ms: f64,
    pub low_accuracy: f64,
    pub slow_reaction_ms: f64,

    /// Attention-level analysis, "high" band
    pub high_looking_pct: f64,
    pub high_max_distractions: u32,
    /// Attention-level analysis, "medium" band; below it votes decrease
    pub medium_looking_pct: f64,
    pub medium_max_distractions: u32,
    pub medium_attention_score: f64,

    /// Matching votes needed to step a level
    pub votes_to_step: usize,

    /// Fine-tuning multipliers applied to cue speed
    pub negative_speed_factor: f64,
    pub positive_speed_factor: f64,
    pub low_attention_speed_factor: f64,

    /// Number of finished games remembered for prompts
    pub history_len: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            high_attention_score: 70.0,
            low_attention_score: 30.0,
            bored_attentive_score: 50.0,
            high_accuracy: 0.8,
            fast_reaction_ms: 1500.0,
            low_accuracy: 0.4,
            slow_reaction_ms: 3000.0,
            high_looking_pct: 80.0,
            high_max_distractions: 3,
            medium_looking_pct: 60.0,
            medium_max_distractions: 5,
            medium_attention_score: 50.0,
            votes_to_step: 2,
            negative_speed_factor: 0.8,
            positive_speed_factor: 1.2,
            low_attention_speed_factor: 0.7,
            history_len: 5,
        }
    }
}
