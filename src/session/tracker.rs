use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::metrics::{self, AttentionMetrics, RecentTrend, RECENT_TREND_WINDOW};
use crate::models::EmotionSample;
use crate::{log_debug, log_info};

use super::state::{SampleDisposition, SessionState, TrackerStatus};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "session";

/// Anything the sampling loop can ask "which game is live right now?".
pub trait ActivityGate: Send + Sync {
    /// Epoch of the live game, `None` between games. Every new game gets a
    /// fresh epoch, so a restart is visible even though the gate stays active.
    fn active_epoch(&self) -> Option<u64>;

    fn is_active(&self) -> bool {
        self.active_epoch().is_some()
    }

    /// Follows [`active_epoch`](Self::active_epoch). Used to abandon in-flight work.
    fn subscribe(&self) -> watch::Receiver<Option<u64>>;
}

/// Cheap-to-clone handle over the game/round state machine. All mutations go
/// through one mutex, so start/end/add calls from timers and callbacks are
/// serialized.
#[derive(Clone)]
pub struct SessionTracker {
    state: Arc<Mutex<SessionState>>,
    active_tx: Arc<watch::Sender<Option<u64>>>,
}

#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub status: TrackerStatus,
    pub game_id: Option<String>,
    pub round_number: Option<u32>,
    pub game_sample_count: usize,
    pub round_sample_count: usize,
}

impl SessionTracker {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            active_tx: Arc::new(active_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A panic elsewhere must not wedge telemetry; the state is still coherent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.active_tx.send_replace(state.active_epoch());
    }

    /// Start a new game, superseding any previous one. Returns its id.
    pub fn start_game(&self) -> String {
        self.start_game_at(Utc::now())
    }

    pub fn start_game_at(&self, now: DateTime<Utc>) -> String {
        let id = Uuid::new_v4().to_string();
        {
            let mut state = self.lock();
            if let Some(previous) = state.game() {
                log_info!(
                    "game {} superseded with {} samples",
                    previous.id,
                    previous.samples.len()
                );
            }
            state.begin_game(id.clone(), now);
            self.publish(&state);
        }
        log_info!("game {} started", id);
        id
    }

    pub fn start_round(&self) -> Option<u32> {
        self.start_round_at(Utc::now())
    }

    pub fn start_round_at(&self, now: DateTime<Utc>) -> Option<u32> {
        let number = self.lock().begin_round(now);
        match number {
            Some(n) => log_info!("round {} started", n),
            None => log_debug!("start_round ignored: no active game"),
        }
        number
    }

    /// Append to the game and round buffers while a game is active; otherwise a
    /// silent no-op. Returns whether the sample was kept.
    pub fn add_sample(&self, sample: EmotionSample) -> bool {
        match self.lock().push_sample(sample) {
            SampleDisposition::Accepted { .. } => true,
            SampleDisposition::Dropped => {
                log_debug!("sample dropped: no active game");
                false
            }
        }
    }

    /// Append only if the game live at `epoch` is still the live game. The
    /// sampling loop uses this so a result that outlived its game can't land
    /// in the game that replaced it.
    pub fn add_sample_for(&self, epoch: u64, sample: EmotionSample) -> bool {
        match self.lock().push_sample_for(epoch, sample) {
            SampleDisposition::Accepted { .. } => true,
            SampleDisposition::Dropped => {
                log_debug!("sample from game epoch {} dropped", epoch);
                false
            }
        }
    }

    /// Harvest the current round's samples. The game buffer keeps them.
    pub fn end_round(&self) -> Vec<EmotionSample> {
        let mut state = self.lock();
        let number = state.round().map(|r| r.number);
        let samples = state.close_round();
        if let Some(n) = number {
            log_debug!("round {} harvested {} samples", n, samples.len());
        }
        samples
    }

    pub fn end_game(&self) -> AttentionMetrics {
        self.end_game_at(Utc::now())
    }

    pub fn end_game_at(&self, now: DateTime<Utc>) -> AttentionMetrics {
        let (metrics, was_active) = {
            let mut state = self.lock();
            let was_active = state.is_active();
            let metrics = state.finish_game(now);
            self.publish(&state);
            (metrics, was_active)
        };
        if was_active {
            log_info!(
                "game ended: {:.1}s, {} samples, attention {:.1}, dominant {}",
                metrics.total_time_sec,
                metrics.sample_count,
                metrics.attention_score,
                metrics.dominant_emotion.as_str()
            );
        }
        metrics
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    pub fn active_epoch(&self) -> Option<u64> {
        self.lock().active_epoch()
    }

    /// Live metrics over the whole game buffer so far.
    pub fn current_metrics(&self) -> AttentionMetrics {
        self.lock().metrics_at(Utc::now())
    }

    pub fn current_metrics_at(&self, now: DateTime<Utc>) -> AttentionMetrics {
        self.lock().metrics_at(now)
    }

    pub fn recent_trend(&self) -> RecentTrend {
        let state = self.lock();
        let samples = state.game().map(|g| g.samples.as_slice()).unwrap_or(&[]);
        metrics::recent_trend(samples, RECENT_TREND_WINDOW)
    }

    pub fn game_samples(&self) -> Vec<EmotionSample> {
        self.lock()
            .game()
            .map(|g| g.samples.clone())
            .unwrap_or_default()
    }

    pub fn round_samples(&self) -> Vec<EmotionSample> {
        self.lock().round_samples()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.lock();
        TrackerSnapshot {
            status: state.status(),
            game_id: state.game().map(|g| g.id.clone()),
            round_number: state.round().map(|r| r.number),
            game_sample_count: state.game_sample_count(),
            round_sample_count: state.round_samples().len(),
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityGate for SessionTracker {
    fn active_epoch(&self) -> Option<u64> {
        SessionTracker::active_epoch(self)
    }

    fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.active_tx.subscribe()
    }
}
