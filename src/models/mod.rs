pub mod difficulty;
pub mod emotion;
pub mod performance;
pub mod session;

pub use difficulty::{
    normalize_distractor_types, Bound, DifficultyBounds, DifficultySettings, DifficultyTier,
    DistractorType, MAX_LEVEL, MIN_LEVEL,
};
pub use emotion::{Emotion, EmotionSample, GazeStatus};
pub use performance::{ErrorPattern, PerformanceMetrics};
pub use session::{GameSession, RoundSession};
