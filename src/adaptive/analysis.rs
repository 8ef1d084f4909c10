use serde::{Deserialize, Serialize};

use crate::metrics::AttentionMetrics;
use crate::models::{Emotion, PerformanceMetrics};

use super::config::DecisionConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Recommendation {
    Increase,
    Maintain,
    Decrease,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EmotionPolarity {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttentionLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

/// 0-10 valence of an emotion for difficulty purposes.
pub fn emotion_value(emotion: Emotion) -> u8 {
    match emotion {
        Emotion::Happy => 10,
        Emotion::Surprised | Emotion::Focused => 8,
        Emotion::Neutral => 6,
        Emotion::Confused => 4,
        Emotion::Bored => 2,
        Emotion::Sad => 1,
        Emotion::Angry => 0,
    }
}

pub fn polarity(emotion: Emotion) -> EmotionPolarity {
    match emotion_value(emotion) {
        8..=u8::MAX => EmotionPolarity::Positive,
        4..=7 => EmotionPolarity::Neutral,
        _ => EmotionPolarity::Negative,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionAnalysis {
    pub value: u8,
    pub polarity: EmotionPolarity,
    pub recommendation: Recommendation,
}

pub fn analyze_emotion(attention: &AttentionMetrics, config: &DecisionConfig) -> EmotionAnalysis {
    let emotion = attention.dominant_emotion;
    let score = attention.attention_score;
    let polarity = polarity(emotion);

    // Bored is itself negative, so the under-challenged case must be
    // checked before the decrease branch.
    let recommendation = if polarity == EmotionPolarity::Positive && score > config.high_attention_score
    {
        Recommendation::Increase
    } else if emotion == Emotion::Bored && score > config.bored_attentive_score {
        Recommendation::Increase
    } else if polarity == EmotionPolarity::Negative || score < config.low_attention_score {
        Recommendation::Decrease
    } else {
        Recommendation::Maintain
    };

    EmotionAnalysis {
        value: emotion_value(emotion),
        polarity,
        recommendation,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceAnalysis {
    pub level: PerformanceLevel,
    pub recommendation: Recommendation,
}

pub fn analyze_performance(
    performance: &PerformanceMetrics,
    config: &DecisionConfig,
) -> PerformanceAnalysis {
    if !performance.has_attempts() {
        return PerformanceAnalysis {
            level: PerformanceLevel::Average,
            recommendation: Recommendation::Maintain,
        };
    }

    let accuracy = performance.accuracy();
    let reaction_ms = performance.avg_reaction_time_ms;

    let (level, recommendation) =
        if accuracy > config.high_accuracy && reaction_ms < config.fast_reaction_ms {
            (PerformanceLevel::Excellent, Recommendation::Increase)
        } else if accuracy <= config.low_accuracy || reaction_ms >= config.slow_reaction_ms {
            (PerformanceLevel::Poor, Recommendation::Decrease)
        } else if accuracy > 0.6 && reaction_ms < 2000.0 {
            (PerformanceLevel::Good, Recommendation::Maintain)
        } else {
            (PerformanceLevel::Average, Recommendation::Maintain)
        };

    PerformanceAnalysis {
        level,
        recommendation,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionAnalysis {
    pub level: AttentionLevel,
    pub recommendation: Recommendation,
}

pub fn analyze_attention(attention: &AttentionMetrics, config: &DecisionConfig) -> AttentionAnalysis {
    let pct = attention.screen_looking_pct;
    let events = attention.distraction_event_count;
    let score = attention.attention_score;

    if pct > config.high_looking_pct
        && events < config.high_max_distractions
        && score > config.high_attention_score
    {
        AttentionAnalysis {
            level: AttentionLevel::High,
            recommendation: Recommendation::Increase,
        }
    } else if pct > config.medium_looking_pct
        && events < config.medium_max_distractions
        && score > config.medium_attention_score
    {
        AttentionAnalysis {
            level: AttentionLevel::Medium,
            recommendation: Recommendation::Maintain,
        }
    } else {
        AttentionAnalysis {
            level: AttentionLevel::Low,
            recommendation: Recommendation::Decrease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attention(emotion: Emotion, score: f64, pct: f64, events: u32) -> AttentionMetrics {
        AttentionMetrics {
            dominant_emotion: emotion,
            attention_score: score,
            screen_looking_pct: pct,
            distraction_event_count: events,
            sample_count: 10,
            ..AttentionMetrics::default()
        }
    }

    fn performance(correct: u32, total: u32, reaction_ms: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            correct_attempts: correct,
            total_attempts: total,
            avg_reaction_time_ms: reaction_ms,
            ..PerformanceMetrics::default()
        }
    }

    #[test]
    fn test_polarity_table() {
        assert_eq!(polarity(Emotion::Happy), EmotionPolarity::Positive);
        assert_eq!(polarity(Emotion::Surprised), EmotionPolarity::Positive);
        assert_eq!(polarity(Emotion::Focused), EmotionPolarity::Positive);
        assert_eq!(polarity(Emotion::Neutral), EmotionPolarity::Neutral);
        assert_eq!(polarity(Emotion::Confused), EmotionPolarity::Neutral);
        assert_eq!(polarity(Emotion::Bored), EmotionPolarity::Negative);
        assert_eq!(polarity(Emotion::Angry), EmotionPolarity::Negative);
    }

    #[test]
    fn test_bored_but_attentive_is_increase() {
        let config = DecisionConfig::default();
        let result = analyze_emotion(&attention(Emotion::Bored, 60.0, 90.0, 0), &config);
        assert_eq!(result.recommendation, Recommendation::Increase);

        let result = analyze_emotion(&attention(Emotion::Bored, 45.0, 90.0, 0), &config);
        assert_eq!(result.recommendation, Recommendation::Decrease);
    }

    #[test]
    fn test_low_score_overrides_neutral_emotion() {
        let config = DecisionConfig::default();
        let result = analyze_emotion(&attention(Emotion::Neutral, 20.0, 10.0, 8), &config);
        assert_eq!(result.recommendation, Recommendation::Decrease);
        let result = analyze_emotion(&attention(Emotion::Neutral, 55.0, 70.0, 1), &config);
        assert_eq!(result.recommendation, Recommendation::Maintain);
    }

    #[test]
    fn test_performance_bands() {
        let config = DecisionConfig::default();
        let excellent = analyze_performance(&performance(9, 10, 1200.0), &config);
        assert_eq!(excellent.recommendation, Recommendation::Increase);

        let slow = analyze_performance(&performance(9, 10, 3200.0), &config);
        assert_eq!(slow.recommendation, Recommendation::Decrease);

        let inaccurate = analyze_performance(&performance(4, 10, 900.0), &config);
        assert_eq!(inaccurate.level, PerformanceLevel::Poor);

        let good = analyze_performance(&performance(7, 10, 1800.0), &config);
        assert_eq!(good.level, PerformanceLevel::Good);
        assert_eq!(good.recommendation, Recommendation::Maintain);
    }

    #[test]
    fn test_no_attempts_holds() {
        let config = DecisionConfig::default();
        let result = analyze_performance(&PerformanceMetrics::default(), &config);
        assert_eq!(result.recommendation, Recommendation::Maintain);
    }

    #[test]
    fn test_attention_bands() {
        let config = DecisionConfig::default();
        let high = analyze_attention(&attention(Emotion::Happy, 85.0, 90.0, 1), &config);
        assert_eq!(high.level, AttentionLevel::High);
        let medium = analyze_attention(&attention(Emotion::Happy, 60.0, 70.0, 4), &config);
        assert_eq!(medium.level, AttentionLevel::Medium);
        let low = analyze_attention(&attention(Emotion::Happy, 60.0, 55.0, 1), &config);
        assert_eq!(low.recommendation, Recommendation::Decrease);
    }
}
