//! Turns a buffered sample set into attention metrics.
//!
//! Everything here is pure: callers pass the samples and the elapsed
//! wall-clock time, and get a fresh [`AttentionMetrics`] back.

mod types;

pub use types::{AttentionMetrics, EmotionStat, Feedback, FeedbackKind, RecentTrend};

use std::collections::BTreeMap;

use crate::models::{Emotion, EmotionSample};

const MAX_LOOKING_POINTS: f64 = 50.0;
const LOOKING_POINTS_PER_PCT: f64 = 0.5;
const DISTRACTION_PENALTY_PER_EVENT: f64 = 2.0;
const MAX_DISTRACTION_PENALTY: f64 = 20.0;
pub const RECENT_TREND_WINDOW: usize = 10;

/// Up to 30 points keyed by the dominant emotion.
pub fn emotion_points(emotion: Emotion) -> f64 {
    match emotion {
        Emotion::Happy => 30.0,
        Emotion::Focused => 30.0,
        Emotion::Neutral => 25.0,
        Emotion::Surprised => 20.0,
        Emotion::Confused => 15.0,
        Emotion::Bored => 10.0,
        Emotion::Sad => 5.0,
        Emotion::Angry => 0.0,
    }
}

/// Aggregate `samples` gathered over `elapsed_sec` seconds.
///
/// Screen-looking time uses the average inter-sample interval
/// (`elapsed_sec / sample_count`) as every sample's duration instead of real
/// per-sample dwell time. This is an approximation that drifts when the
/// polling cadence does; the score thresholds are tuned against it, so keep it.
pub fn aggregate(samples: &[EmotionSample], elapsed_sec: f64) -> AttentionMetrics {
    let elapsed_sec = if elapsed_sec.is_finite() {
        elapsed_sec.max(0.0)
    } else {
        0.0
    };

    if samples.is_empty() {
        return AttentionMetrics::neutral(elapsed_sec);
    }

    let total = samples.len();
    let per_sample_sec = elapsed_sec / total as f64;

    let looking_count = samples.iter().filter(|s| s.looking_at_screen()).count();
    let screen_looking_time_sec = looking_count as f64 * per_sample_sec;
    let screen_looking_pct = if elapsed_sec > 0.0 {
        screen_looking_time_sec / elapsed_sec * 100.0
    } else {
        looking_count as f64 / total as f64 * 100.0
    };
    let screen_looking_pct = clamp_pct(screen_looking_pct);

    let (emotion_stats, dominant_emotion) = group_by_emotion(samples, per_sample_sec);
    let distraction_event_count = count_distraction_events(samples);
    let attention_score =
        attention_score(screen_looking_pct, dominant_emotion, distraction_event_count);

    AttentionMetrics {
        total_time_sec: elapsed_sec,
        screen_looking_time_sec,
        screen_looking_pct,
        emotion_stats,
        dominant_emotion,
        attention_score,
        distraction_event_count,
        sample_count: total,
    }
}

/// Weighted composite in `[0, 100]`.
pub fn attention_score(screen_looking_pct: f64, dominant: Emotion, distraction_events: u32) -> f64 {
    let looking_points = (clamp_pct(screen_looking_pct) * LOOKING_POINTS_PER_PCT).min(MAX_LOOKING_POINTS);
    let penalty =
        (distraction_events as f64 * DISTRACTION_PENALTY_PER_EVENT).min(MAX_DISTRACTION_PENALTY);

    (looking_points + emotion_points(dominant) - penalty).clamp(0.0, 100.0)
}

/// Count looking → not-looking transitions between consecutive samples. One
/// unbroken look-away stretch counts once; a stream that starts off-screen
/// has no transition until the child has looked at the screen first.
pub fn count_distraction_events(samples: &[EmotionSample]) -> u32 {
    samples
        .windows(2)
        .filter(|pair| pair[0].looking_at_screen() && !pair[1].looking_at_screen())
        .count() as u32
}

fn group_by_emotion(
    samples: &[EmotionSample],
    per_sample_sec: f64,
) -> (BTreeMap<Emotion, EmotionStat>, Emotion) {
    // (emotion, count, looking) in first-seen order so ties resolve to the earliest.
    let mut groups: Vec<(Emotion, usize, usize)> = Vec::new();
    for sample in samples {
        let idx = match groups.iter().position(|(e, _, _)| *e == sample.emotion()) {
            Some(idx) => idx,
            None => {
                groups.push((sample.emotion(), 0, 0));
                groups.len() - 1
            }
        };
        groups[idx].1 += 1;
        if sample.looking_at_screen() {
            groups[idx].2 += 1;
        }
    }

    let mut dominant = Emotion::Neutral;
    let mut best = 0usize;
    for (emotion, count, _) in &groups {
        if *count > best {
            best = *count;
            dominant = *emotion;
        }
    }

    let total = samples.len() as f64;
    let stats = groups
        .into_iter()
        .map(|(emotion, count, looking)| {
            let stat = EmotionStat {
                count,
                pct: clamp_pct(count as f64 / total * 100.0),
                looking_pct: clamp_pct(looking as f64 / count as f64 * 100.0),
                time_sec: count as f64 * per_sample_sec,
                looking_time_sec: looking as f64 * per_sample_sec,
            };
            (emotion, stat)
        })
        .collect();

    (stats, dominant)
}

fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Dominant emotion, mean confidence and majority gaze over the last
/// `window` samples.
pub fn recent_trend(samples: &[EmotionSample], window: usize) -> RecentTrend {
    let start = samples.len().saturating_sub(window.max(1));
    let recent = &samples[start..];

    if recent.is_empty() {
        return RecentTrend {
            emotion: Emotion::Neutral,
            confidence: 0.5,
            looking_at_screen: true,
        };
    }

    let (_, dominant) = group_by_emotion(recent, 0.0);
    let confidence = recent.iter().map(|s| s.confidence()).sum::<f64>() / recent.len() as f64;
    let looking = recent.iter().filter(|s| s.looking_at_screen()).count();

    RecentTrend {
        emotion: dominant,
        confidence,
        looking_at_screen: looking as f64 / recent.len() as f64 > 0.5,
    }
}

/// Pick the banner to show while a round is running.
pub fn realtime_feedback(metrics: &AttentionMetrics) -> Feedback {
    if metrics.has_samples() && metrics.screen_looking_pct < 40.0 {
        return Feedback {
            message: "Try to keep your eyes on the screen! 👀".into(),
            kind: FeedbackKind::Warning,
            suggestion: "Look for the colours on the screen".into(),
        };
    }

    if metrics.dominant_emotion == Emotion::Bored {
        return Feedback {
            message: "Looks a bit boring? Keep going! 🎯".into(),
            kind: FeedbackKind::Info,
            suggestion: "A more fun task is coming after this one".into(),
        };
    }

    if metrics.attention_score > 70.0 {
        return Feedback {
            message: "Great focus! 🌟".into(),
            kind: FeedbackKind::Success,
            suggestion: "Keep up this pace".into(),
        };
    }

    Feedback {
        message: "You're doing well! 👍".into(),
        kind: FeedbackKind::Info,
        suggestion: "Stay with it".into(),
    }
}
