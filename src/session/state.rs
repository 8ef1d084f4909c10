use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{self, AttentionMetrics};
use crate::models::{EmotionSample, GameSession, RoundSession};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackerStatus {
    Idle,
    Active,
    Ended,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        TrackerStatus::Idle
    }
}

/// Outcome of offering one sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDisposition {
    /// Appended to the game buffer and to the open round, if any.
    Accepted { in_round: bool },
    /// No active game; the sample was discarded.
    Dropped,
}

/// Nested game/round state. Mutated only through the owning tracker.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    game: Option<GameSession>,
    round: Option<RoundSession>,
    rounds_started: u32,
    /// Bumped by every `begin_game`; identifies which game a sample belongs to.
    epoch: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TrackerStatus {
        match &self.game {
            None => TrackerStatus::Idle,
            Some(game) if game.active => TrackerStatus::Active,
            Some(_) => TrackerStatus::Ended,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == TrackerStatus::Active
    }

    /// Epoch of the live game, `None` between games.
    pub fn active_epoch(&self) -> Option<u64> {
        self.is_active().then_some(self.epoch)
    }

    pub fn game(&self) -> Option<&GameSession> {
        self.game.as_ref()
    }

    pub fn round(&self) -> Option<&RoundSession> {
        self.round.as_ref()
    }

    /// Replace whatever game was there with a fresh, active one.
    pub fn begin_game(&mut self, id: String, now: DateTime<Utc>) -> u64 {
        *self = Self {
            game: Some(GameSession::new(id, now)),
            round: None,
            rounds_started: 0,
            epoch: self.epoch.wrapping_add(1),
        };
        self.epoch
    }

    /// Open a new round at the current end of the game buffer. Returns the
    /// round number, or `None` when there is no active game.
    pub fn begin_round(&mut self, now: DateTime<Utc>) -> Option<u32> {
        let game = self.game.as_ref().filter(|g| g.active)?;
        self.rounds_started += 1;
        self.round = Some(RoundSession::new(self.rounds_started, now, game.samples.len()));
        Some(self.rounds_started)
    }

    pub fn push_sample(&mut self, sample: EmotionSample) -> SampleDisposition {
        let Some(game) = self.game.as_mut().filter(|g| g.active) else {
            return SampleDisposition::Dropped;
        };
        game.samples.push(sample);
        let in_round = self.round.as_ref().map(|r| r.is_open()).unwrap_or(false);
        SampleDisposition::Accepted { in_round }
    }

    /// Like [`push_sample`](Self::push_sample), but only for the game that
    /// was live at `epoch`. A result started under an earlier game is dropped
    /// even when a newer game is active by now.
    pub fn push_sample_for(&mut self, epoch: u64, sample: EmotionSample) -> SampleDisposition {
        if self.active_epoch() != Some(epoch) {
            return SampleDisposition::Dropped;
        }
        self.push_sample(sample)
    }

    /// Harvest the open round. A second call without a new round returns an
    /// empty vector rather than the same samples again.
    pub fn close_round(&mut self) -> Vec<EmotionSample> {
        let (Some(game), Some(round)) = (self.game.as_ref(), self.round.as_mut()) else {
            return Vec::new();
        };
        if !round.is_open() {
            return Vec::new();
        }
        round.closed_at_index = Some(game.samples.len());
        round.samples(game).to_vec()
    }

    /// Samples of the current round so far (open or just closed).
    pub fn round_samples(&self) -> Vec<EmotionSample> {
        match (self.game.as_ref(), self.round.as_ref()) {
            (Some(game), Some(round)) => round.samples(game).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Mark the game inactive and freeze its clock. Repeated calls leave the
    /// first end time in place.
    pub fn finish_game(&mut self, now: DateTime<Utc>) -> AttentionMetrics {
        let Some(game) = self.game.as_mut() else {
            return AttentionMetrics::neutral(0.0);
        };
        if game.active {
            game.active = false;
            game.ended_at = Some(now);
        }
        metrics::aggregate(&game.samples, game.elapsed_secs(now))
    }

    pub fn metrics_at(&self, now: DateTime<Utc>) -> AttentionMetrics {
        match &self.game {
            Some(game) => metrics::aggregate(&game.samples, game.elapsed_secs(now)),
            None => AttentionMetrics::neutral(0.0),
        }
    }

    pub fn game_sample_count(&self) -> usize {
        self.game.as_ref().map(|g| g.samples.len()).unwrap_or(0)
    }
}
