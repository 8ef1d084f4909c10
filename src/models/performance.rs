use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const MAX_RECENT_ERRORS: usize = 10;

/// Gameplay performance for one round or one game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub correct_attempts: u32,
    pub total_attempts: u32,
    pub avg_reaction_time_ms: f64,
    pub streak_counter: u32,
    pub best_streak: u32,
    pub time_spent_ms: u64,
    /// Oldest first, at most [`MAX_RECENT_ERRORS`] entries.
    pub recent_error_tags: VecDeque<String>,
}

/// Which kind of mistake dominates the recent error tags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPattern {
    None,
    ColorCommand,
    TextCommand,
    QuickClicks,
    SlowClicks,
    Mixed,
}

impl ErrorPattern {
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorPattern::None => "not enough errors to analyse yet",
            ErrorPattern::ColorCommand => "struggles with colour commands",
            ErrorPattern::TextCommand => "struggles with word commands",
            ErrorPattern::QuickClicks => "tends to click too quickly",
            ErrorPattern::SlowClicks => "reacts slowly",
            ErrorPattern::Mixed => "mixed error types",
        }
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accuracy in `[0, 1]`; zero when nothing has been attempted.
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        (self.correct_attempts.min(self.total_attempts) as f64) / self.total_attempts as f64
    }

    pub fn has_attempts(&self) -> bool {
        self.total_attempts > 0
    }

    /// Fold one attempt into the running averages, streaks and error ring.
    pub fn record_attempt(&mut self, correct: bool, reaction_ms: f64, error_tag: Option<&str>) {
        let reaction_ms = if reaction_ms.is_finite() {
            reaction_ms.max(0.0)
        } else {
            0.0
        };

        let previous = self.total_attempts as f64;
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.avg_reaction_time_ms =
            (self.avg_reaction_time_ms * previous + reaction_ms) / self.total_attempts as f64;

        if correct {
            self.correct_attempts = self.correct_attempts.saturating_add(1);
            self.streak_counter = self.streak_counter.saturating_add(1);
            self.best_streak = self.best_streak.max(self.streak_counter);
        } else {
            self.streak_counter = 0;
            if let Some(tag) = error_tag {
                self.push_error(tag);
            }
        }
    }

    pub fn push_error(&mut self, tag: &str) {
        self.recent_error_tags.push_back(tag.to_string());
        while self.recent_error_tags.len() > MAX_RECENT_ERRORS {
            self.recent_error_tags.pop_front();
        }
    }

    pub fn error_pattern(&self) -> ErrorPattern {
        if self.recent_error_tags.is_empty() {
            return ErrorPattern::None;
        }

        let mut counts = [
            (ErrorPattern::ColorCommand, 0usize),
            (ErrorPattern::TextCommand, 0),
            (ErrorPattern::QuickClicks, 0),
            (ErrorPattern::SlowClicks, 0),
        ];

        for tag in &self.recent_error_tags {
            let tag = tag.to_ascii_lowercase();
            if tag.contains("color") || tag.contains("colour") {
                counts[0].1 += 1;
            }
            if tag.contains("text") {
                counts[1].1 += 1;
            }
            if tag.contains("quick") {
                counts[2].1 += 1;
            }
            if tag.contains("slow") {
                counts[3].1 += 1;
            }
        }

        let top = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        if top == 0 {
            return ErrorPattern::Mixed;
        }
        // First category reaching the top count wins, matching tag priority order.
        counts
            .iter()
            .find(|(_, c)| *c == top)
            .map(|(p, _)| *p)
            .unwrap_or(ErrorPattern::Mixed)
    }
}
