use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EmotionSample;

/// Top-level tracking scope for one play-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub active: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub samples: Vec<EmotionSample>,
}

impl GameSession {
    pub fn new(id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            active: true,
            ended_at: None,
            samples: Vec::new(),
        }
    }

    /// Seconds since start, frozen at `ended_at` once the game is over.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let until = self.ended_at.unwrap_or(now);
        let millis = (until - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }
}

/// One round inside a game. Its samples are not stored separately: the round
/// is the suffix of the game buffer starting at `start_index`, which keeps it
/// a contiguous, time-ordered slice of the game's samples by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSession {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub start_index: usize,
    /// Set once the round's samples have been harvested.
    pub closed_at_index: Option<usize>,
}

impl RoundSession {
    pub fn new(number: u32, started_at: DateTime<Utc>, start_index: usize) -> Self {
        Self {
            number,
            started_at,
            start_index,
            closed_at_index: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at_index.is_none()
    }

    /// The round's view into the enclosing game buffer.
    pub fn samples<'a>(&self, game: &'a GameSession) -> &'a [EmotionSample] {
        let end = self.closed_at_index.unwrap_or(game.samples.len());
        let end = end.min(game.samples.len());
        let start = self.start_index.min(end);
        &game.samples[start..end]
    }
}
