use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DistractorType {
    Emoji,
    Text,
    Shape,
    None,
}

impl DistractorType {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "emoji" => Some(DistractorType::Emoji),
            "text" => Some(DistractorType::Text),
            "shape" => Some(DistractorType::Shape),
            "none" => Some(DistractorType::None),
            _ => None,
        }
    }
}

/// Coarse difficulty band used to key content generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

impl DifficultyTier {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=3 => DifficultyTier::Easy,
            4..=7 => DifficultyTier::Medium,
            _ => DifficultyTier::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
        }
    }
}

/// The tunable knobs for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultySettings {
    pub level: u8,
    pub item_count: u32,
    pub cue_visibility_ms: u32,
    pub target_ratio: f64,
    pub distractor_count: u32,
    pub distractor_types: BTreeSet<DistractorType>,
    pub pause_time_ms: u32,
}

impl DifficultySettings {
    /// Reference settings for a level on the 1..=10 ladder.
    pub fn preset(level: u8) -> Self {
        let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        let step = (level - MIN_LEVEL) as f64;

        let distractor_count = u32::from(level - MIN_LEVEL) / 3;
        let distractor_types = match distractor_count {
            0 => [DistractorType::None].into_iter().collect(),
            1 => [DistractorType::Emoji].into_iter().collect(),
            2 => [DistractorType::Emoji, DistractorType::Shape].into_iter().collect(),
            _ => [DistractorType::Emoji, DistractorType::Shape, DistractorType::Text]
                .into_iter()
                .collect(),
        };

        Self {
            level,
            item_count: 3 + (step * 5.0 / 9.0).round() as u32,
            cue_visibility_ms: 3600 - (step * 200.0) as u32,
            target_ratio: 0.3 + step * 0.06,
            distractor_count,
            distractor_types,
            pause_time_ms: 1000 - (step * 80.0) as u32,
        }
    }

    pub fn tier(&self) -> DifficultyTier {
        DifficultyTier::from_level(self.level)
    }
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self::preset(4)
    }
}

/// Inclusive range for one numeric knob.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bound<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy + PartialOrd> Bound<T> {
    pub fn new(min: T, max: T) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Swap the ends when a config file lists them backwards.
    pub fn normalized(self) -> Self {
        Self::new(self.min, self.max)
    }
}

impl Bound<f64> {
    /// Clamp a float, sending NaN to the lower end.
    pub fn clamp_f64(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        self.clamp(value)
    }
}

impl Bound<u32> {
    /// Clamp an untrusted float (e.g. parsed from model output) into the range.
    pub fn clamp_from_f64(&self, value: f64) -> u32 {
        if value.is_nan() {
            return self.min;
        }
        let rounded = value.round();
        if rounded <= self.min as f64 {
            self.min
        } else if rounded >= self.max as f64 {
            self.max
        } else {
            rounded as u32
        }
    }
}

/// Safe ranges every emitted [`DifficultySettings`] is forced into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DifficultyBounds {
    pub level: Bound<u8>,
    pub item_count: Bound<u32>,
    pub cue_visibility_ms: Bound<u32>,
    pub target_ratio: Bound<f64>,
    pub distractor_count: Bound<u32>,
    pub pause_time_ms: Bound<u32>,
}

impl Default for DifficultyBounds {
    fn default() -> Self {
        Self {
            level: Bound::new(MIN_LEVEL, MAX_LEVEL),
            item_count: Bound::new(2, 10),
            cue_visibility_ms: Bound::new(1500, 4000),
            target_ratio: Bound::new(0.2, 0.9),
            distractor_count: Bound::new(0, 3),
            pause_time_ms: Bound::new(200, 1200),
        }
    }
}

impl DifficultyBounds {
    pub fn normalized(self) -> Self {
        Self {
            level: self.level.normalized(),
            item_count: self.item_count.normalized(),
            cue_visibility_ms: self.cue_visibility_ms.normalized(),
            target_ratio: self.target_ratio.normalized(),
            distractor_count: self.distractor_count.normalized(),
            pause_time_ms: self.pause_time_ms.normalized(),
        }
    }

    /// Force every knob into range and keep the distractor set consistent
    /// with the distractor count.
    pub fn clamp(&self, settings: &DifficultySettings) -> DifficultySettings {
        let clamped = DifficultySettings {
            level: self.level.clamp(settings.level),
            item_count: self.item_count.clamp(settings.item_count),
            cue_visibility_ms: self.cue_visibility_ms.clamp(settings.cue_visibility_ms),
            target_ratio: self.target_ratio.clamp_f64(settings.target_ratio),
            distractor_count: self.distractor_count.clamp(settings.distractor_count),
            distractor_types: normalize_distractor_types(&settings.distractor_types),
            pause_time_ms: self.pause_time_ms.clamp(settings.pause_time_ms),
        };
        reconcile_distractors(clamped)
    }

    pub fn contains(&self, settings: &DifficultySettings) -> bool {
        self.clamp(settings) == *settings
    }
}

/// `none` only stands alone; an empty set becomes `{none}`.
pub fn normalize_distractor_types(types: &BTreeSet<DistractorType>) -> BTreeSet<DistractorType> {
    let mut out: BTreeSet<DistractorType> = types
        .iter()
        .copied()
        .filter(|t| *t != DistractorType::None)
        .collect();
    if out.is_empty() {
        out.insert(DistractorType::None);
    }
    out
}

/// No distractors means `{none}`; some distractors need at least one real kind.
fn reconcile_distractors(mut settings: DifficultySettings) -> DifficultySettings {
    if settings.distractor_count == 0 {
        settings.distractor_types = BTreeSet::from([DistractorType::None]);
    } else if settings.distractor_types.iter().all(|t| *t == DistractorType::None) {
        settings.distractor_types = BTreeSet::from([DistractorType::Emoji]);
    }
    settings
}
