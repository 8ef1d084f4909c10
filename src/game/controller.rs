use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::adaptive::AdaptiveDecisionEngine;
use crate::generation::{
    classify_instruction, GenerationContext, GenerativeTaskClient, OllamaClient, TaskCategory,
    TaskKind,
};
use crate::metrics::{self, AttentionMetrics, Feedback, RecentTrend};
use crate::models::{DifficultySettings, PerformanceMetrics};
use crate::sensing::{PlaySnapshot, SampleSource, SharedPlaySnapshot};
use crate::session::SessionTracker;
use crate::settings::EngineSettings;

use super::report::{GameReport, RoundReport};
use super::signal::{connect_sample_source, SignalMode};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "game";

use crate::{log_debug, log_info, log_warn};

const RECENT_KIND_LIMIT: usize = 5;

struct GameState {
    game_id: Option<String>,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    settings: DifficultySettings,
    open_round: Option<(u32, DateTime<Utc>)>,
    rounds: Vec<RoundReport>,
    recent_task_kinds: Vec<TaskKind>,
    category: Option<TaskCategory>,
}

impl GameState {
    fn new(settings: DifficultySettings) -> Self {
        Self {
            game_id: None,
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            settings,
            open_round: None,
            rounds: Vec::new(),
            recent_task_kinds: Vec::new(),
            category: None,
        }
    }

    fn is_current(&self, game_id: &str) -> bool {
        self.game_id.as_deref() == Some(game_id)
    }
}

/// Consumer-facing entry point: one handle a game screen drives through
/// start/round/end calls.
#[derive(Clone)]
pub struct GameController {
    tracker: SessionTracker,
    source: Arc<Mutex<SampleSource>>,
    signal: SignalMode,
    engine: Arc<Mutex<AdaptiveDecisionEngine>>,
    generator: GenerativeTaskClient,
    play: SharedPlaySnapshot,
    state: Arc<Mutex<GameState>>,
}

impl GameController {
    pub fn new(
        tracker: SessionTracker,
        source: SampleSource,
        signal: SignalMode,
        engine: AdaptiveDecisionEngine,
        generator: GenerativeTaskClient,
        play: SharedPlaySnapshot,
    ) -> Self {
        let settings = engine.bounds().clamp(&DifficultySettings::default());
        Self {
            tracker,
            source: Arc::new(Mutex::new(source)),
            signal,
            engine: Arc::new(Mutex::new(engine)),
            generator,
            play,
            state: Arc::new(Mutex::new(GameState::new(settings))),
        }
    }

    /// Wire everything from settings, probing telemetry and falling back to
    /// the simulator when it is unavailable.
    pub async fn connect(settings: &EngineSettings) -> Self {
        let tracker = SessionTracker::new();
        let play: SharedPlaySnapshot = Arc::default();
        let (source, signal) =
            connect_sample_source(settings, Arc::new(tracker.clone()), Arc::clone(&play)).await;

        let engine = AdaptiveDecisionEngine::new(settings.decision.clone(), settings.bounds.clone());
        let generator = GenerativeTaskClient::new(
            Arc::new(OllamaClient::new(&settings.generator)),
            settings.bounds.clone(),
            Duration::from_millis(settings.generator.timeout_ms),
        )
        .with_debug(settings.debug);

        Self::new(tracker, source, signal, engine, generator, play)
    }

    pub fn signal(&self) -> SignalMode {
        self.signal
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Live play state the simulator reacts to. Games update it as clicks land.
    pub fn play(&self) -> SharedPlaySnapshot {
        Arc::clone(&self.play)
    }

    pub async fn current_settings(&self) -> DifficultySettings {
        self.state.lock().await.settings.clone()
    }

    pub async fn set_category(&self, category: Option<TaskCategory>) {
        self.state.lock().await.category = category;
    }

    /// Begin a game, superseding any unfinished one. Telemetry starts (or
    /// resumes) here; if it can't, the game still runs without samples.
    pub async fn start_game(&self) -> String {
        let mut state = self.state.lock().await;
        state.cancel.cancel();

        let game_id = self.tracker.start_game();
        state.game_id = Some(game_id.clone());
        state.started_at = Utc::now();
        state.cancel = CancellationToken::new();
        state.open_round = None;
        state.rounds.clear();

        self.update_play(|play| {
            *play = PlaySnapshot {
                is_playing: true,
                ..PlaySnapshot::default()
            }
        });

        let mut source = self.source.lock().await;
        if source.is_polling() {
            source.resume_analysis();
        } else {
            let tracker = self.tracker.clone();
            if let Err(err) =
                source.start_polling(move |epoch, sample| tracker.add_sample_for(epoch, sample))
            {
                log_warn!("telemetry not started: {}", err);
            }
        }

        game_id
    }

    pub async fn start_round(&self) -> Option<u32> {
        let mut state = self.state.lock().await;
        let number = self.tracker.start_round()?;
        state.open_round = Some((number, Utc::now()));
        Some(number)
    }

    /// Close the open round, decide the next settings and fetch the next
    /// plan. `None` when no round is open.
    pub async fn end_round(&self, performance: &PerformanceMetrics) -> Option<RoundReport> {
        let (game_id, number, started_at, samples, mut ctx) = {
            let mut state = self.state.lock().await;
            let Some((number, started_at)) = state.open_round.take() else {
                log_debug!("end_round ignored: no open round");
                return None;
            };
            let game_id = state.game_id.clone()?;
            let samples = self.tracker.end_round();
            let ctx = GenerationContext {
                session_id: game_id.clone(),
                round: number,
                current: state.settings.clone(),
                performance: performance.clone(),
                attention: None,
                recent_samples: samples.clone(),
                history: Vec::new(),
                recent_task_kinds: state.recent_task_kinds.clone(),
                category: state.category,
                cancel: state.cancel.clone(),
            };
            (game_id, number, started_at, samples, ctx)
        };

        let ended_at = Utc::now();
        let elapsed = (ended_at - started_at).num_milliseconds() as f64 / 1000.0;
        let attention = metrics::aggregate(&samples, elapsed);

        let decision = {
            let engine = self.engine.lock().await;
            ctx.history = engine.history().cloned().collect();
            engine.decide_detailed(&ctx.current, performance, &attention)
        };
        ctx.current = decision.settings.clone();
        ctx.attention = Some(attention.clone());

        self.update_play(|play| {
            play.correct_clicks = performance.correct_attempts;
            play.wrong_clicks = performance
                .total_attempts
                .saturating_sub(performance.correct_attempts);
        });

        let outcome = self.generator.generate(&ctx).await;
        let (next_plan, plan_source, fallback_reason) = RoundReport::plan_parts(outcome);

        let report = RoundReport {
            round: number,
            started_at,
            ended_at,
            attention,
            performance: performance.clone(),
            decision,
            next_plan,
            plan_source,
            fallback_reason,
        };

        let mut state = self.state.lock().await;
        if state.is_current(&game_id) {
            state.settings = report.next_plan.settings.clone();
            state
                .recent_task_kinds
                .push(classify_instruction(&report.next_plan.task.instruction));
            let overflow = state.recent_task_kinds.len().saturating_sub(RECENT_KIND_LIMIT);
            state.recent_task_kinds.drain(..overflow);
            state.rounds.push(report.clone());
        } else {
            log_debug!("round {} finished after its game ended, not applied", number);
        }

        Some(report)
    }

    /// Finish the game: stop analysis, abort in-flight remote calls, decide
    /// the next game's settings and hand back the persistence payload.
    /// `None` when no game is running.
    pub async fn end_game(&self, performance: &PerformanceMetrics) -> Option<GameReport> {
        let mut state = self.state.lock().await;
        let game_id = state.game_id.take()?;

        state.cancel.cancel();
        self.source.lock().await.pause_analysis();

        let ended_at = Utc::now();
        if state.open_round.take().is_some() {
            self.tracker.end_round();
        }
        let attention = self.tracker.end_game_at(ended_at);

        let previous_level = state.settings.level;
        let decision = {
            let mut engine = self.engine.lock().await;
            let decision = engine.decide_detailed(&state.settings, performance, &attention);
            engine.record(performance, &attention, &decision);
            decision
        };
        state.settings = decision.settings.clone();

        self.update_play(|play| play.is_playing = false);

        log_info!(
            "game {} finished: level {} -> {} ({:?})",
            game_id,
            previous_level,
            decision.settings.level,
            decision.verdict
        );

        Some(GameReport {
            game_id,
            started_at: state.started_at,
            ended_at,
            signal: self.signal,
            attention,
            performance: performance.clone(),
            settings: decision.settings.clone(),
            decision,
            rounds: std::mem::take(&mut state.rounds),
        })
    }

    pub fn current_metrics(&self) -> AttentionMetrics {
        self.tracker.current_metrics()
    }

    pub fn feedback(&self) -> Feedback {
        metrics::realtime_feedback(&self.tracker.current_metrics())
    }

    pub fn recent_trend(&self) -> RecentTrend {
        self.tracker.recent_trend()
    }

    /// Stop polling and release the capture device.
    pub async fn shutdown(&self) {
        self.state.lock().await.cancel.cancel();
        self.source.lock().await.stop().await;
    }

    fn update_play<F>(&self, edit: F)
    where
        F: FnOnce(&mut PlaySnapshot),
    {
        let mut play = self.play.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut play);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FallbackReason;
    use crate::models::{DifficultyBounds, Emotion};
    use crate::sensing::SamplingOptions;
    use crate::test_support::{CannedGenerator, FixedClassifier, MemoryDevice};
    use std::sync::atomic::Ordering;

    const PLAN: &str = r#"{"task":{"instruction":"Count the red hearts","durationSecs":40},
        "newSettings":{"itemCount":5},"reasoning":"steady","encouragement":"Nice!","tips":["Go slow"]}"#;

    async fn controller(
        classifier: Arc<FixedClassifier>,
        generator: Arc<CannedGenerator>,
    ) -> GameController {
        let tracker = SessionTracker::new();
        let mut source = SampleSource::new(
            Arc::new(MemoryDevice::new()),
            classifier,
            Arc::new(tracker.clone()),
            SamplingOptions {
                tick_interval: Duration::from_millis(1000),
                min_interval: Duration::from_millis(3000),
                call_timeout: Duration::from_millis(2500),
            },
        );
        assert!(source.probe_availability().await);

        let bounds = DifficultyBounds::default();
        let client = GenerativeTaskClient::new(generator, bounds.clone(), Duration::from_secs(5));
        GameController::new(
            tracker,
            source,
            SignalMode::Live,
            AdaptiveDecisionEngine::default(),
            client,
            Arc::default(),
        )
    }

    fn performance(correct: u32, total: u32, reaction_ms: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            correct_attempts: correct,
            total_attempts: total,
            avg_reaction_time_ms: reaction_ms,
            ..PerformanceMetrics::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_game_round_trip() {
        let classifier = Arc::new(FixedClassifier::new(Emotion::Happy, true));
        let generator = Arc::new(CannedGenerator::new(PLAN));
        let game = controller(Arc::clone(&classifier), generator).await;

        let game_id = game.start_game().await;
        assert!(game.play().read().unwrap().is_playing);
        assert_eq!(game.start_round().await, Some(1));
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        let round = game.end_round(&performance(9, 10, 1200.0)).await.unwrap();
        assert_eq!(round.round, 1);
        assert_eq!(round.attention.sample_count, 4);
        assert!(round.fallback_reason.is_none());
        assert_eq!(round.next_plan.task.instruction, "Count the red hearts");
        assert_eq!(game.current_settings().await.item_count, 5);

        let report = game.end_game(&performance(9, 10, 1200.0)).await.unwrap();
        assert_eq!(report.game_id, game_id);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.attention.sample_count, 4);
        assert!(!game.tracker().is_active());
        assert!(!game.play().read().unwrap().is_playing);

        let calls = classifier.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), calls);
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_carries_only_the_rounds_samples() {
        let generator = Arc::new(CannedGenerator::new(PLAN));
        let game = controller(
            Arc::new(FixedClassifier::new(Emotion::Happy, true)),
            Arc::clone(&generator),
        )
        .await;

        game.start_game().await;
        // Samples at 0s and 3s land before the round, 6s and 9s inside it.
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        game.start_round().await;
        tokio::time::sleep(Duration::from_millis(5_000)).await;

        let round = game.end_round(&performance(7, 10, 1800.0)).await.unwrap();
        assert_eq!(round.attention.sample_count, 2);
        assert_eq!(game.tracker().game_samples().len(), 4);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].matches("\"e\":\"happy\"").count(), 2);
        drop(prompts);
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_end_calls_are_no_ops() {
        let game = controller(
            Arc::new(FixedClassifier::new(Emotion::Neutral, true)),
            Arc::new(CannedGenerator::new(PLAN)),
        )
        .await;

        assert!(game.end_round(&PerformanceMetrics::default()).await.is_none());
        assert!(game.end_game(&PerformanceMetrics::default()).await.is_none());

        game.start_game().await;
        assert!(game.end_round(&PerformanceMetrics::default()).await.is_none());
        assert!(game.end_game(&PerformanceMetrics::default()).await.is_some());
        assert!(game.end_game(&PerformanceMetrics::default()).await.is_none());
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_end_cancels_pending_generation() {
        let generator = Arc::new(CannedGenerator::new(PLAN).delayed(Duration::from_secs(60)));
        let game = controller(
            Arc::new(FixedClassifier::new(Emotion::Neutral, true)),
            generator,
        )
        .await;

        game.start_game().await;
        game.start_round().await;

        let pending = {
            let game = game.clone();
            tokio::spawn(async move { game.end_round(&performance(5, 10, 2000.0)).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        let report = game.end_game(&performance(5, 10, 2000.0)).await.unwrap();

        let round = pending.await.unwrap().unwrap();
        assert_eq!(round.fallback_reason, Some(FallbackReason::Cancelled));
        assert!(report.rounds.is_empty());
        assert_eq!(game.current_settings().await, report.settings);
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_strong_game_raises_next_level() {
        let game = controller(
            Arc::new(FixedClassifier::new(Emotion::Happy, true)),
            Arc::new(CannedGenerator::new(PLAN)),
        )
        .await;
        let start_level = game.current_settings().await.level;

        game.start_game().await;
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        let report = game.end_game(&performance(9, 10, 1200.0)).await.unwrap();
        assert_eq!(report.settings.level, start_level + 1);
        assert_eq!(game.current_settings().await.level, start_level + 1);
        game.shutdown().await;
    }
}
