use std::fmt::Write;

use serde::Serialize;

use crate::metrics::AttentionMetrics;
use crate::models::{DifficultyBounds, Emotion, EmotionSample};

use super::variety::least_used_kind;
use super::GenerationContext;

pub const PROMPT_SAMPLE_LIMIT: usize = 20;

#[derive(Serialize)]
struct CompactSample {
    e: &'static str,
    c: f64,
    l: bool,
}

impl From<&EmotionSample> for CompactSample {
    fn from(sample: &EmotionSample) -> Self {
        Self {
            e: sample.emotion().as_str(),
            c: (sample.confidence() * 100.0).round() / 100.0,
            l: sample.looking_at_screen(),
        }
    }
}

pub fn build_prompt(ctx: &GenerationContext, bounds: &DifficultyBounds) -> String {
    let mut out = String::new();
    let perf = &ctx.performance;

    out.push_str(
        "You design short attention exercises for children aged 7-12 and tune their \
         difficulty. Answer with a single JSON object and nothing else.\n\n",
    );

    let _ = writeln!(out, "ROUND {} PERFORMANCE", ctx.round);
    let _ = writeln!(
        out,
        "- Accuracy: {:.0}% ({}/{} correct)",
        perf.accuracy() * 100.0,
        perf.correct_attempts,
        perf.total_attempts
    );
    let _ = writeln!(out, "- Average reaction time: {:.0}ms", perf.avg_reaction_time_ms);
    let _ = writeln!(out, "- Best streak: {}", perf.best_streak);
    let _ = writeln!(out, "- Error pattern: {}", perf.error_pattern().describe());
    let _ = writeln!(
        out,
        "- Current settings: level {}, {} items, cue {}ms, target ratio {:.2}, {} distractors, pause {}ms",
        ctx.current.level,
        ctx.current.item_count,
        ctx.current.cue_visibility_ms,
        ctx.current.target_ratio,
        ctx.current.distractor_count,
        ctx.current.pause_time_ms
    );
    out.push('\n');

    if let Some(attention) = &ctx.attention {
        write_attention(&mut out, attention);
        write_guidance(&mut out, attention, perf.accuracy(), perf.has_attempts());
    }

    if !ctx.recent_samples.is_empty() {
        let start = ctx.recent_samples.len().saturating_sub(PROMPT_SAMPLE_LIMIT);
        let compact: Vec<CompactSample> = ctx.recent_samples[start..]
            .iter()
            .map(CompactSample::from)
            .collect();
        if let Ok(json) = serde_json::to_string(&compact) {
            let _ = writeln!(out, "RECENT SAMPLES (e=emotion, c=confidence, l=looking)");
            let _ = writeln!(out, "{json}\n");
        }
    }

    if !ctx.history.is_empty() {
        out.push_str("PREVIOUS GAMES\n");
        for entry in &ctx.history {
            let _ = writeln!(
                out,
                "- level {}: accuracy {:.0}%, reaction {:.0}ms, attention {:.0}, looking {:.0}%, mostly {}",
                entry.level,
                entry.accuracy * 100.0,
                entry.avg_reaction_time_ms,
                entry.attention_score,
                entry.screen_looking_pct,
                entry.dominant_emotion.as_str()
            );
        }
        out.push('\n');
    }

    let suggested = least_used_kind(&ctx.recent_task_kinds);
    let _ = writeln!(out, "VARIETY");
    if !ctx.recent_task_kinds.is_empty() {
        let recent: Vec<&str> = ctx.recent_task_kinds.iter().map(|k| k.as_str()).collect();
        let _ = writeln!(out, "- Recent task kinds: {}", recent.join(", "));
    }
    let _ = writeln!(
        out,
        "- Prefer a {} task, e.g. \"{}\"",
        suggested.as_str(),
        suggested.example()
    );
    if let Some(category) = ctx.category {
        let _ = writeln!(out, "- The task must target a {}", category.as_str());
    }
    out.push('\n');

    write_schema(&mut out, bounds);
    out
}

fn write_attention(out: &mut String, attention: &AttentionMetrics) {
    let _ = writeln!(out, "ATTENTION");
    let _ = writeln!(
        out,
        "- Dominant emotion: {} ({:.0}% of samples)",
        attention.dominant_emotion.as_str(),
        attention.dominant_share_pct()
    );
    let _ = writeln!(out, "- Looking at screen: {:.0}%", attention.screen_looking_pct);
    let _ = writeln!(out, "- Attention score: {:.0}/100", attention.attention_score);
    let _ = writeln!(out, "- Distraction events: {}", attention.distraction_event_count);
    out.push('\n');
}

fn write_guidance(out: &mut String, attention: &AttentionMetrics, accuracy: f64, has_attempts: bool) {
    let mut lines = Vec::new();
    if attention.has_samples() && attention.screen_looking_pct < 60.0 {
        lines.push("The child often looks away: use fewer items and more striking colours.");
    }
    if attention.dominant_emotion == Emotion::Bored {
        lines.push("The child seems bored: make the task more playful and slightly faster.");
    }
    if attention.dominant_emotion == Emotion::Confused {
        lines.push("The child seems confused: keep the instruction very simple and add a hint.");
    }
    if has_attempts && accuracy < 0.5 {
        lines.push("Accuracy is low: make it easier and give the cue more time.");
    }
    if attention.distraction_event_count > 5 {
        lines.push("Attention drifts often: keep distractors to a minimum.");
    }

    if lines.is_empty() {
        return;
    }
    out.push_str("GUIDANCE\n");
    for line in lines {
        let _ = writeln!(out, "- {line}");
    }
    out.push('\n');
}

fn write_schema(out: &mut String, bounds: &DifficultyBounds) {
    let _ = writeln!(out, "RESPOND WITH THIS JSON SHAPE");
    let _ = writeln!(
        out,
        r#"{{
  "task": {{
    "instruction": string,
    "durationSecs": number (30-60),
    "hints": [string] (at most 2),
    "targetColor": string (optional),
    "targetShape": string (optional),
    "targetNumber": number (optional),
    "distractorLevel": number (0-1)
  }},
  "newSettings": {{
    "itemCount": number ({}-{}),
    "cueVisibilityMs": number ({}-{}),
    "targetRatio": number ({}-{}),
    "distractorCount": number ({}-{}),
    "distractorTypes": ["emoji" | "text" | "shape" | "none"],
    "pauseTimeMs": number ({}-{})
  }},
  "reasoning": string,
  "encouragement": string,
  "tips": [string]
}}"#,
        bounds.item_count.min,
        bounds.item_count.max,
        bounds.cue_visibility_ms.min,
        bounds.cue_visibility_ms.max,
        bounds.target_ratio.min,
        bounds.target_ratio.max,
        bounds.distractor_count.min,
        bounds.distractor_count.max,
        bounds.pause_time_ms.min,
        bounds.pause_time_ms.max,
    );
}
