use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::models::{Emotion, EmotionSample, GazeStatus};

use super::capture::Frame;
use super::classifier::FrameClassifier;

const DISTRACTION_RATE: f64 = 0.15;

/// Live game context the simulation reacts to. The game updates it as the
/// child plays.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaySnapshot {
    pub correct_clicks: u32,
    pub wrong_clicks: u32,
    pub time_left_secs: u32,
    pub is_playing: bool,
}

impl PlaySnapshot {
    pub fn accuracy(&self) -> f64 {
        let total = self.correct_clicks + self.wrong_clicks;
        if total == 0 {
            0.5
        } else {
            self.correct_clicks as f64 / total as f64
        }
    }
}

pub type SharedPlaySnapshot = Arc<RwLock<PlaySnapshot>>;

struct SimState {
    rng: StdRng,
    emotion: Emotion,
    first_frame_at: Option<DateTime<Utc>>,
}

/// Stand-in classifier used when no camera or classifier service is
/// reachable. Produces plausible samples from how the game is going.
pub struct SimulatedClassifier {
    play: SharedPlaySnapshot,
    state: Mutex<SimState>,
}

impl SimulatedClassifier {
    pub fn new(play: SharedPlaySnapshot) -> Self {
        Self::with_rng(play, StdRng::from_entropy())
    }

    pub fn seeded(play: SharedPlaySnapshot, seed: u64) -> Self {
        Self::with_rng(play, StdRng::seed_from_u64(seed))
    }

    fn with_rng(play: SharedPlaySnapshot, rng: StdRng) -> Self {
        Self {
            play,
            state: Mutex::new(SimState {
                rng,
                emotion: Emotion::Neutral,
                first_frame_at: None,
            }),
        }
    }

    fn simulate(&self, at: DateTime<Utc>) -> EmotionSample {
        let play = *self.play.read().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let first = *state.first_frame_at.get_or_insert(at);
        let session_secs = (at - first).num_seconds();
        let accuracy = play.accuracy();
        let rng = &mut state.rng;

        let next = if !play.is_playing {
            Some(Emotion::Neutral)
        } else if accuracy > 0.8 && play.correct_clicks > 5 {
            Some(pick(rng, 0.3, Emotion::Happy, Emotion::Neutral))
        } else if accuracy < 0.3 && play.wrong_clicks > 3 {
            if rng.gen_bool(0.4) {
                Some(Emotion::Confused)
            } else {
                Some(pick(rng, 0.5, Emotion::Sad, Emotion::Neutral))
            }
        } else if play.time_left_secs < 10 && accuracy > 0.6 {
            Some(pick(rng, 0.3, Emotion::Surprised, Emotion::Neutral))
        } else if session_secs > 30 && accuracy < 0.5 {
            Some(pick(rng, 0.4, Emotion::Bored, Emotion::Neutral))
        } else {
            None
        };
        if let Some(emotion) = next {
            state.emotion = emotion;
        }

        let looking = !state.rng.gen_bool(DISTRACTION_RATE);
        let confidence = 0.7 + state.rng.gen::<f64>() * 0.25;
        let gaze = if looking {
            GazeStatus::Looking
        } else {
            GazeStatus::NotLooking
        };

        EmotionSample::new(state.emotion, confidence, at, gaze, looking)
    }
}

fn pick(rng: &mut StdRng, p: f64, hit: Emotion, miss: Emotion) -> Emotion {
    if rng.gen_bool(p) {
        hit
    } else {
        miss
    }
}

#[async_trait]
impl FrameClassifier for SimulatedClassifier {
    async fn classify(&self, frame: &Frame) -> Result<EmotionSample> {
        Ok(self.simulate(frame.captured_at))
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            jpeg: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_idle_game_reads_neutral() {
        let play = Arc::new(RwLock::new(PlaySnapshot::default()));
        let sim = SimulatedClassifier::seeded(play, 7);
        for _ in 0..20 {
            let sample = sim.classify(&frame()).await.unwrap();
            assert_eq!(sample.emotion(), Emotion::Neutral);
            assert!((0.7..=0.95).contains(&sample.confidence()));
        }
    }

    #[tokio::test]
    async fn test_strong_play_only_yields_happy_or_neutral() {
        let play = Arc::new(RwLock::new(PlaySnapshot {
            correct_clicks: 18,
            wrong_clicks: 1,
            time_left_secs: 40,
            is_playing: true,
        }));
        let sim = SimulatedClassifier::seeded(play, 11);
        let mut saw_happy = false;
        for _ in 0..200 {
            let emotion = sim.classify(&frame()).await.unwrap().emotion();
            assert!(matches!(emotion, Emotion::Happy | Emotion::Neutral));
            saw_happy |= emotion == Emotion::Happy;
        }
        assert!(saw_happy);
    }

    #[tokio::test]
    async fn test_most_samples_are_looking() {
        let play = Arc::new(RwLock::new(PlaySnapshot::default()));
        let sim = SimulatedClassifier::seeded(play, 3);
        let mut looking = 0;
        for _ in 0..1000 {
            if sim.classify(&frame()).await.unwrap().looking_at_screen() {
                looking += 1;
            }
        }
        assert!((750..=950).contains(&looking), "looking = {looking}");
    }
}
