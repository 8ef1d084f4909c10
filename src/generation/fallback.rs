//! Deterministic plans used whenever the generator can't be trusted.

use crate::models::{DifficultyBounds, DifficultyTier};

use super::task::{GeneratedPlan, SprintTask, TaskCategory};
use super::GenerationContext;

struct Template {
    instruction: &'static str,
    duration_secs: u32,
    hints: [&'static str; 2],
    color: Option<&'static str>,
    shape: Option<&'static str>,
    number: Option<u32>,
    distractor_level: f64,
}

const EASY: &[Template] = &[
    Template {
        instruction: "🔴 Press the red button",
        duration_secs: 30,
        hints: ["Look for the colour red", "It is a big button"],
        color: Some("red"),
        shape: None,
        number: None,
        distractor_level: 0.0,
    },
    Template {
        instruction: "⭐ Count the stars",
        duration_secs: 35,
        hints: ["Find the yellow stars", "Point at each one"],
        color: None,
        shape: Some("star"),
        number: None,
        distractor_level: 0.0,
    },
    Template {
        instruction: "Tap the number 3",
        duration_secs: 30,
        hints: ["Only the 3", "Take your time"],
        color: None,
        shape: None,
        number: Some(3),
        distractor_level: 0.0,
    },
];

const MEDIUM: &[Template] = &[
    Template {
        instruction: "🟢 Find how many green squares there are",
        duration_secs: 45,
        hints: ["Only the green ones", "Count quietly"],
        color: Some("green"),
        shape: Some("square"),
        number: None,
        distractor_level: 0.3,
    },
    Template {
        instruction: "🎯 Focus on the target in the middle for 3 seconds",
        duration_secs: 40,
        hints: ["Keep your eyes on the target", "Breathe slowly"],
        color: None,
        shape: None,
        number: None,
        distractor_level: 0.5,
    },
    Template {
        instruction: "💜 Tap the purple hearts",
        duration_secs: 40,
        hints: ["Hearts only", "Skip the other colours"],
        color: None,
        shape: Some("heart"),
        number: None,
        distractor_level: 0.4,
    },
];

const HARD: &[Template] = &[
    Template {
        instruction: "🔵 Tap the blue circles as soon as they appear",
        duration_secs: 50,
        hints: ["Get ready", "React quickly"],
        color: Some("blue"),
        shape: Some("circle"),
        number: None,
        distractor_level: 0.7,
    },
    Template {
        instruction: "🟡⭐ Follow the yellow stars and count them",
        duration_secs: 55,
        hints: ["Track the moving stars", "Don't lose the count"],
        color: Some("yellow"),
        shape: Some("star"),
        number: None,
        distractor_level: 0.8,
    },
    Template {
        instruction: "Tap every 7 that appears in 50 seconds",
        duration_secs: 50,
        hints: ["Watch for the 7", "Ignore the other numbers"],
        color: None,
        shape: None,
        number: Some(7),
        distractor_level: 0.6,
    },
];

const TIPS: [&str; 3] = [
    "Read each instruction carefully",
    "Don't rush, accuracy comes first",
    "You get a little better every time",
];

#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    bounds: DifficultyBounds,
}

impl FallbackGenerator {
    pub fn new(bounds: DifficultyBounds) -> Self {
        Self { bounds }
    }

    /// Same context, same plan.
    pub fn plan(&self, ctx: &GenerationContext) -> GeneratedPlan {
        let settings = self.bounds.clamp(&ctx.current);
        let tier = settings.tier();

        GeneratedPlan {
            task: self.task(tier, ctx.category, ctx.round),
            settings,
            reasoning: "Generator unavailable, using the built-in task list".into(),
            encouragement: if ctx.performance.accuracy() > 0.7 {
                "Great, keep it up!".into()
            } else {
                "Nice, keep practising!".into()
            },
            tips: TIPS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Pick from the tier's list, preferring templates of `category`.
    pub fn task(
        &self,
        tier: DifficultyTier,
        category: Option<TaskCategory>,
        round: u32,
    ) -> SprintTask {
        let pool = match tier {
            DifficultyTier::Easy => EASY,
            DifficultyTier::Medium => MEDIUM,
            DifficultyTier::Hard => HARD,
        };

        let matching: Vec<&Template> = match category {
            Some(wanted) => pool
                .iter()
                .filter(|t| category_of(t) == wanted)
                .collect(),
            None => Vec::new(),
        };
        let candidates: Vec<&Template> = if matching.is_empty() {
            pool.iter().collect()
        } else {
            matching
        };

        let offset = category
            .and_then(|c| TaskCategory::ALL.iter().position(|k| *k == c))
            .unwrap_or(0);
        let template = candidates[(round as usize + offset) % candidates.len()];

        SprintTask {
            instruction: template.instruction.to_string(),
            duration_secs: template.duration_secs,
            hints: template.hints.iter().map(|h| h.to_string()).collect(),
            target_color: template.color.map(str::to_string),
            target_shape: template.shape.map(str::to_string),
            target_number: template.number,
            distractor_level: template.distractor_level,
            tier,
            category: category_of(template),
        }
    }
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new(DifficultyBounds::default())
    }
}

fn category_of(template: &Template) -> TaskCategory {
    TaskCategory::from_targets(
        template.color.is_some(),
        template.shape.is_some(),
        template.number.is_some(),
    )
}
