use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    normalize_distractor_types, Bound, DifficultyBounds, DifficultySettings, DifficultyTier,
    DistractorType,
};

pub const MIN_TASK_SECS: u32 = 30;
pub const MAX_TASK_SECS: u32 = 60;
pub const DEFAULT_TASK_SECS: u32 = 45;
pub const MAX_HINTS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskCategory {
    Color,
    Shape,
    Number,
    General,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 4] = [
        TaskCategory::Color,
        TaskCategory::Shape,
        TaskCategory::Number,
        TaskCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Color => "color",
            TaskCategory::Shape => "shape",
            TaskCategory::Number => "number",
            TaskCategory::General => "general",
        }
    }

    /// Colour wins over shape for mixed targets.
    pub fn from_targets(color: bool, shape: bool, number: bool) -> Self {
        if color {
            TaskCategory::Color
        } else if shape {
            TaskCategory::Shape
        } else if number {
            TaskCategory::Number
        } else {
            TaskCategory::General
        }
    }
}

/// One short attention exercise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SprintTask {
    pub instruction: String,
    pub duration_secs: u32,
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_number: Option<u32>,
    /// 0 = no distractors, 1 = heavy distraction.
    pub distractor_level: f64,
    pub tier: DifficultyTier,
    pub category: TaskCategory,
}

impl SprintTask {
    /// Validate a model-produced task object. Returns `None` only when the
    /// instruction is missing or blank; everything else is clamped.
    pub fn from_value(value: &Value, tier: DifficultyTier) -> Option<Self> {
        let instruction = text_field(value, &["instruction", "task", "gorev"])?;

        let duration = number_field(value, &["durationSecs", "duration", "sure_saniye"])
            .unwrap_or(DEFAULT_TASK_SECS as f64);
        let duration_secs = clamp_u32(duration, MIN_TASK_SECS, MAX_TASK_SECS);

        let hints = string_list(value, &["hints", "ipuclari"])
            .into_iter()
            .take(MAX_HINTS)
            .collect();

        let target_color = text_field(value, &["targetColor", "hedefRenk"]);
        let target_shape = text_field(value, &["targetShape", "hedefSekil"]);
        let target_number = number_field(value, &["targetNumber", "hedefSayi"])
            .filter(|n| *n >= 1.0)
            .map(|n| clamp_u32(n, 1, 99));

        let distractor_level = number_field(value, &["distractorLevel", "dikkatDagitici"])
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        let category = TaskCategory::from_targets(
            target_color.is_some(),
            target_shape.is_some(),
            target_number.is_some(),
        );

        Some(Self {
            instruction,
            duration_secs,
            hints,
            target_color,
            target_shape,
            target_number,
            distractor_level,
            tier,
            category,
        })
    }
}

/// Everything the next round needs: content, knobs, and copy for the child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    pub task: SprintTask,
    pub settings: DifficultySettings,
    pub reasoning: String,
    pub encouragement: String,
    pub tips: Vec<String>,
}

/// Read the `newSettings` block. Absent fields keep `base`'s value and
/// everything is clamped to `bounds`. `None` when there is no block.
pub fn settings_from_value(
    value: &Value,
    base: &DifficultySettings,
    bounds: &DifficultyBounds,
) -> Option<DifficultySettings> {
    let block = value
        .get("newSettings")
        .or_else(|| value.get("settings"))
        .filter(|v| v.is_object())?;

    let distractor_types = match block
        .get("distractorTypes")
        .and_then(Value::as_array)
    {
        Some(items) => {
            let parsed: BTreeSet<DistractorType> = items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(DistractorType::from_label)
                .collect();
            normalize_distractor_types(&parsed)
        }
        None => base.distractor_types.clone(),
    };

    let settings = DifficultySettings {
        level: base.level,
        item_count: pick_u32(
            block,
            &["itemCount", "boxCount"],
            base.item_count,
            &bounds.item_count,
        ),
        cue_visibility_ms: pick_u32(
            block,
            &["cueVisibilityMs", "commandVisibilityDuration"],
            base.cue_visibility_ms,
            &bounds.cue_visibility_ms,
        ),
        target_ratio: number_field(block, &["targetRatio", "conflictRate"])
            .map(|n| bounds.target_ratio.clamp_f64(n))
            .unwrap_or(base.target_ratio),
        distractor_count: pick_u32(
            block,
            &["distractorCount"],
            base.distractor_count,
            &bounds.distractor_count,
        ),
        distractor_types,
        pause_time_ms: pick_u32(
            block,
            &["pauseTimeMs", "pauseTime"],
            base.pause_time_ms,
            &bounds.pause_time_ms,
        ),
    };

    Some(bounds.clamp(&settings))
}

/// Assemble a plan from parsed model output, filling whichever of the task
/// or settings sections is missing from `fallback`. `None` when neither
/// section is usable.
pub fn plan_from_value(
    value: &Value,
    tier: DifficultyTier,
    fallback: &GeneratedPlan,
    bounds: &DifficultyBounds,
) -> Option<GeneratedPlan> {
    let task = value
        .get("task")
        .filter(|v| v.is_object())
        .and_then(|v| SprintTask::from_value(v, tier))
        .or_else(|| SprintTask::from_value(value, tier));
    let settings = settings_from_value(value, &fallback.settings, bounds);

    if task.is_none() && settings.is_none() {
        return None;
    }

    let tips = string_list(value, &["tips"]);
    Some(GeneratedPlan {
        task: task.unwrap_or_else(|| fallback.task.clone()),
        settings: settings.unwrap_or_else(|| bounds.clamp(&fallback.settings)),
        reasoning: text_field(value, &["reasoning"]).unwrap_or_else(|| fallback.reasoning.clone()),
        encouragement: text_field(value, &["encouragement"])
            .unwrap_or_else(|| fallback.encouragement.clone()),
        tips: if tips.is_empty() {
            fallback.tips.clone()
        } else {
            tips
        },
    })
}

fn pick_u32(block: &Value, keys: &[&str], current: u32, bound: &Bound<u32>) -> u32 {
    number_field(block, keys)
        .map(|n| bound.clamp_from_f64(n))
        .unwrap_or(current)
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers arrive as JSON numbers or numeric strings.
fn number_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|key| value.get(*key)).find_map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clamp_u32(value: f64, min: u32, max: u32) -> u32 {
    if value.is_nan() {
        return min;
    }
    value.round().clamp(min as f64, max as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fallback_plan() -> GeneratedPlan {
        GeneratedPlan {
            task: SprintTask {
                instruction: "Press the red button".into(),
                duration_secs: 30,
                hints: vec![],
                target_color: Some("red".into()),
                target_shape: None,
                target_number: None,
                distractor_level: 0.0,
                tier: DifficultyTier::Easy,
                category: TaskCategory::Color,
            },
            settings: DifficultySettings::preset(3),
            reasoning: "fallback".into(),
            encouragement: "keep going".into(),
            tips: vec!["breathe".into()],
        }
    }

    #[test]
    fn test_task_fields_are_clamped() {
        let value = json!({
            "instruction": "  Tap the blue circles  ",
            "durationSecs": 400,
            "hints": ["one", "two", "three"],
            "targetColor": "blue",
            "targetShape": "circle",
            "distractorLevel": 3.5
        });
        let task = SprintTask::from_value(&value, DifficultyTier::Hard).unwrap();
        assert_eq!(task.instruction, "Tap the blue circles");
        assert_eq!(task.duration_secs, MAX_TASK_SECS);
        assert_eq!(task.hints.len(), 2);
        assert_eq!(task.distractor_level, 1.0);
        assert_eq!(task.category, TaskCategory::Color);
    }

    #[test]
    fn test_blank_instruction_is_rejected() {
        let value = json!({"instruction": "   ", "durationSecs": 40});
        assert!(SprintTask::from_value(&value, DifficultyTier::Easy).is_none());
    }

    #[test]
    fn test_settings_accept_legacy_names_and_clamp() {
        let value = json!({
            "newSettings": {
                "boxCount": 40,
                "commandVisibilityDuration": "900",
                "conflictRate": 0.95,
                "distractorCount": 2,
                "distractorTypes": ["emoji", "sparkles", "none"],
                "pauseTime": 5000
            }
        });
        let bounds = DifficultyBounds::default();
        let base = DifficultySettings::preset(5);
        let settings = settings_from_value(&value, &base, &bounds).unwrap();
        assert_eq!(settings.item_count, 10);
        assert_eq!(settings.cue_visibility_ms, 1500);
        assert_eq!(settings.target_ratio, 0.9);
        assert_eq!(settings.pause_time_ms, 1200);
        assert_eq!(
            settings.distractor_types,
            BTreeSet::from([DistractorType::Emoji])
        );
        assert_eq!(settings.level, base.level);
    }

    #[test]
    fn test_unknown_distractor_types_become_none() {
        let value = json!({"newSettings": {"distractorCount": 0, "distractorTypes": ["glitter"]}});
        let settings = settings_from_value(
            &value,
            &DifficultySettings::preset(5),
            &DifficultyBounds::default(),
        )
        .unwrap();
        assert_eq!(
            settings.distractor_types,
            BTreeSet::from([DistractorType::None])
        );
    }

    #[test]
    fn test_distractor_types_follow_distractor_count() {
        let bounds = DifficultyBounds::default();
        let base = DifficultySettings::preset(5);

        let none_shown = json!({"newSettings": {"distractorCount": 0, "distractorTypes": ["emoji"]}});
        let settings = settings_from_value(&none_shown, &base, &bounds).unwrap();
        assert_eq!(settings.distractor_count, 0);
        assert_eq!(
            settings.distractor_types,
            BTreeSet::from([DistractorType::None])
        );

        let untyped = json!({"newSettings": {"distractorCount": 3, "distractorTypes": ["none"]}});
        let settings = settings_from_value(&untyped, &base, &bounds).unwrap();
        assert_eq!(settings.distractor_count, 3);
        assert_eq!(
            settings.distractor_types,
            BTreeSet::from([DistractorType::Emoji])
        );
        assert!(bounds.contains(&settings));
    }

    #[test]
    fn test_missing_section_is_filled_from_fallback() {
        let value = json!({"newSettings": {"boxCount": 6}, "reasoning": "steady"});
        let fallback = fallback_plan();
        let plan = plan_from_value(
            &value,
            DifficultyTier::Medium,
            &fallback,
            &DifficultyBounds::default(),
        )
        .unwrap();
        assert_eq!(plan.task, fallback.task);
        assert_eq!(plan.settings.item_count, 6);
        assert_eq!(plan.reasoning, "steady");
        assert_eq!(plan.tips, fallback.tips);
    }

    #[test]
    fn test_empty_object_is_unusable() {
        let plan = plan_from_value(
            &json!({"mood": "great"}),
            DifficultyTier::Easy,
            &fallback_plan(),
            &DifficultyBounds::default(),
        );
        assert!(plan.is_none());
    }
}
