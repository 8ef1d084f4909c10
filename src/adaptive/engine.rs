use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::AttentionMetrics;
use crate::models::{DifficultyBounds, DifficultySettings, Emotion, PerformanceMetrics};

use super::analysis::{
    analyze_attention, analyze_emotion, analyze_performance, AttentionLevel, EmotionPolarity,
    PerformanceLevel, Recommendation,
};
use super::config::DecisionConfig;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "adaptive";

use crate::log_info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Votes {
    pub emotion: Recommendation,
    pub performance: Recommendation,
    pub attention: Recommendation,
}

impl Votes {
    pub fn count(&self, kind: Recommendation) -> usize {
        [self.emotion, self.performance, self.attention]
            .into_iter()
            .filter(|vote| *vote == kind)
            .count()
    }
}

/// A decision together with the reasoning behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub settings: DifficultySettings,
    pub verdict: Recommendation,
    pub votes: Votes,
    pub emotion_polarity: EmotionPolarity,
    pub attention_level: AttentionLevel,
    pub performance_level: PerformanceLevel,
    /// Multiplier applied to cue speed during fine-tuning.
    pub speed_factor: f64,
    pub reason: String,
    pub suggestions: Vec<String>,
}

/// One finished game as remembered for prompt context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub accuracy: f64,
    pub avg_reaction_time_ms: f64,
    pub attention_score: f64,
    pub screen_looking_pct: f64,
    pub dominant_emotion: Emotion,
    pub level: u8,
    pub verdict: Recommendation,
}

pub struct AdaptiveDecisionEngine {
    config: DecisionConfig,
    bounds: DifficultyBounds,
    history: VecDeque<HistoryEntry>,
}

impl AdaptiveDecisionEngine {
    pub fn new(config: DecisionConfig, bounds: DifficultyBounds) -> Self {
        Self {
            config,
            bounds: bounds.normalized(),
            history: VecDeque::new(),
        }
    }

    pub fn bounds(&self) -> &DifficultyBounds {
        &self.bounds
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn decide(
        &self,
        current: &DifficultySettings,
        performance: &PerformanceMetrics,
        attention: &AttentionMetrics,
    ) -> DifficultySettings {
        self.decide_detailed(current, performance, attention).settings
    }

    pub fn decide_detailed(
        &self,
        current: &DifficultySettings,
        performance: &PerformanceMetrics,
        attention: &AttentionMetrics,
    ) -> Decision {
        let current = self.bounds.clamp(current);

        let emotion = analyze_emotion(attention, &self.config);
        let perf = analyze_performance(performance, &self.config);
        let focus = analyze_attention(attention, &self.config);
        let votes = Votes {
            emotion: emotion.recommendation,
            performance: perf.recommendation,
            attention: focus.recommendation,
        };

        let verdict = if votes.count(Recommendation::Increase) >= self.config.votes_to_step {
            Recommendation::Increase
        } else if votes.count(Recommendation::Decrease) >= self.config.votes_to_step {
            Recommendation::Decrease
        } else {
            Recommendation::Maintain
        };

        let stepped = self.step_level(&current, verdict);
        let (tuned, speed_factor) = self.fine_tune(stepped, emotion.polarity, focus.level);
        let settings = self.bounds.clamp(&tuned);

        let (reason, suggestions) = explain(verdict);
        log_info!(
            "votes {:?}/{:?}/{:?} -> {:?}, level {} -> {}, speed x{:.2}",
            votes.emotion,
            votes.performance,
            votes.attention,
            verdict,
            current.level,
            settings.level,
            speed_factor
        );

        Decision {
            settings,
            verdict,
            votes,
            emotion_polarity: emotion.polarity,
            attention_level: focus.level,
            performance_level: perf.level,
            speed_factor,
            reason,
            suggestions,
        }
    }

    /// Move one rung on the level ladder, carrying the current values along
    /// by the difference between the two level presets.
    fn step_level(&self, current: &DifficultySettings, verdict: Recommendation) -> DifficultySettings {
        let target = match verdict {
            Recommendation::Increase => current.level.saturating_add(1),
            Recommendation::Decrease => current.level.saturating_sub(1),
            Recommendation::Maintain => return current.clone(),
        };
        let target = self.bounds.level.clamp(target);
        if target == current.level {
            return current.clone();
        }

        let from = DifficultySettings::preset(current.level);
        let to = DifficultySettings::preset(target);
        let shift = |value: u32, a: u32, b: u32| (value as i64 + b as i64 - a as i64).max(0) as u32;

        DifficultySettings {
            level: target,
            item_count: shift(current.item_count, from.item_count, to.item_count),
            cue_visibility_ms: shift(current.cue_visibility_ms, from.cue_visibility_ms, to.cue_visibility_ms),
            target_ratio: current.target_ratio + (to.target_ratio - from.target_ratio),
            distractor_count: shift(current.distractor_count, from.distractor_count, to.distractor_count),
            distractor_types: to.distractor_types,
            pause_time_ms: shift(current.pause_time_ms, from.pause_time_ms, to.pause_time_ms),
        }
    }

    /// Continuous adjustments keyed to mood and focus. A faster cue means a
    /// shorter visibility window and a shorter pause.
    fn fine_tune(
        &self,
        mut settings: DifficultySettings,
        polarity: EmotionPolarity,
        attention: AttentionLevel,
    ) -> (DifficultySettings, f64) {
        let mut speed = 1.0;
        let mut items: i64 = 0;

        if polarity == EmotionPolarity::Negative {
            speed *= self.config.negative_speed_factor;
            items -= 1;
        } else if polarity == EmotionPolarity::Positive && attention == AttentionLevel::High {
            speed *= self.config.positive_speed_factor;
            items += 1;
        }
        if attention == AttentionLevel::Low {
            speed *= self.config.low_attention_speed_factor;
            items -= 1;
        }

        if speed > 0.0 && speed.is_finite() && speed != 1.0 {
            settings.cue_visibility_ms = self
                .bounds
                .cue_visibility_ms
                .clamp_from_f64(settings.cue_visibility_ms as f64 / speed);
            settings.pause_time_ms = self
                .bounds
                .pause_time_ms
                .clamp_from_f64(settings.pause_time_ms as f64 / speed);
        }
        settings.item_count = (settings.item_count as i64 + items).max(0) as u32;

        (settings, speed)
    }

    /// Remember a finished game. Only the most recent few are kept.
    pub fn record(
        &mut self,
        performance: &PerformanceMetrics,
        attention: &AttentionMetrics,
        decision: &Decision,
    ) {
        self.history.push_back(HistoryEntry {
            recorded_at: Utc::now(),
            accuracy: performance.accuracy(),
            avg_reaction_time_ms: performance.avg_reaction_time_ms,
            attention_score: attention.attention_score,
            screen_looking_pct: attention.screen_looking_pct,
            dominant_emotion: attention.dominant_emotion,
            level: decision.settings.level,
            verdict: decision.verdict,
        });
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }
}

impl Default for AdaptiveDecisionEngine {
    fn default() -> Self {
        Self::new(DecisionConfig::default(), DifficultyBounds::default())
    }
}

fn explain(verdict: Recommendation) -> (String, Vec<String>) {
    let (reason, suggestions): (&str, [&str; 3]) = match verdict {
        Recommendation::Increase => (
            "Great performance! Trying slightly harder tasks.",
            [
                "You're doing great!",
                "You're keeping your focus well",
                "Faster cues are coming next",
            ],
        ),
        Recommendation::Decrease => (
            "Focusing seems hard right now. Let's continue with easier tasks.",
            [
                "No worries, we learn step by step",
                "Take a breath and try to focus",
                "Cues will come more slowly",
            ],
        ),
        Recommendation::Maintain => (
            "Balanced performance, staying at the current difficulty.",
            [
                "Nice going!",
                "Keep up this pace",
                "Try to hold your attention",
            ],
        ),
    };
    (
        reason.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
    )
}
