//! Fuses attention telemetry and gameplay performance into the next round's
//! difficulty settings.

pub mod analysis;
pub mod config;
pub mod engine;

pub use analysis::{
    analyze_attention, analyze_emotion, analyze_performance, emotion_value, polarity,
    AttentionLevel, EmotionPolarity, PerformanceLevel, Recommendation,
};
pub use config::DecisionConfig;
pub use engine::{AdaptiveDecisionEngine, Decision, HistoryEntry, Votes};
