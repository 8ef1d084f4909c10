use serde::{Deserialize, Serialize};

/// Shape of a task as far as variety is concerned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ColorClick,
    ShapeClick,
    Counting,
    Waiting,
    Combination,
    TimedCounting,
    TimedClicking,
    NumberClick,
}

impl TaskKind {
    pub const ALL: [TaskKind; 8] = [
        TaskKind::ColorClick,
        TaskKind::ShapeClick,
        TaskKind::Counting,
        TaskKind::Waiting,
        TaskKind::Combination,
        TaskKind::TimedCounting,
        TaskKind::TimedClicking,
        TaskKind::NumberClick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ColorClick => "color-click",
            TaskKind::ShapeClick => "shape-click",
            TaskKind::Counting => "counting",
            TaskKind::Waiting => "waiting",
            TaskKind::Combination => "combination",
            TaskKind::TimedCounting => "timed-counting",
            TaskKind::TimedClicking => "timed-clicking",
            TaskKind::NumberClick => "number-click",
        }
    }

    pub fn example(&self) -> &'static str {
        match self {
            TaskKind::ColorClick => "Tap every red circle",
            TaskKind::ShapeClick => "Tap the stars",
            TaskKind::Counting => "Count the blue squares",
            TaskKind::Waiting => "Wait 3 seconds, then tap the green circle",
            TaskKind::Combination => "Tap only the blue triangles",
            TaskKind::TimedCounting => "Count all the hearts that appear in 40 seconds",
            TaskKind::TimedClicking => "Tap all the yellow stars for 50 seconds",
            TaskKind::NumberClick => "Tap the number 3",
        }
    }
}

const COLORS: [&str; 6] = ["red", "blue", "green", "yellow", "purple", "orange"];
const SHAPES: [&str; 6] = ["circle", "square", "triangle", "star", "heart", "diamond"];

/// Best guess at the kind of a free-text instruction.
pub fn classify_instruction(instruction: &str) -> TaskKind {
    let text = instruction.to_lowercase();
    let timed = text.contains("second") || text.contains("minute");

    if text.contains("count") || text.contains("how many") {
        return if text.contains(" all ") || timed {
            TaskKind::TimedCounting
        } else {
            TaskKind::Counting
        };
    }
    if text.contains("all") && text.contains("tap") && timed {
        return TaskKind::TimedClicking;
    }
    if text.contains("wait") || text.contains("hold") || text.contains("stay still") {
        return TaskKind::Waiting;
    }
    if text.contains("tap") && text.chars().any(|c| c.is_ascii_digit()) {
        return TaskKind::NumberClick;
    }

    let has_color = COLORS.iter().any(|c| text.contains(c));
    let has_shape = SHAPES.iter().any(|s| text.contains(s));
    match (has_color, has_shape) {
        (true, true) => TaskKind::Combination,
        (false, true) => TaskKind::ShapeClick,
        _ => TaskKind::ColorClick,
    }
}

/// The least used kind among `recent`, first in [`TaskKind::ALL`] order on ties.
pub fn least_used_kind(recent: &[TaskKind]) -> TaskKind {
    TaskKind::ALL
        .iter()
        .copied()
        .min_by_key(|kind| recent.iter().filter(|k| *k == kind).count())
        .unwrap_or(TaskKind::ColorClick)
}
