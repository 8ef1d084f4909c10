//! Between-round content: asks a text generator for the next task and
//! settings, validates what comes back, and falls back to a deterministic
//! local plan whenever the remote answer is late, broken, or missing.

pub mod client;
pub mod fallback;
pub mod prompt;
pub mod repair;
pub mod task;
pub mod variety;

pub use client::{OllamaClient, TextGenerator};
pub use fallback::FallbackGenerator;
pub use prompt::build_prompt;
pub use repair::{parse_lenient, ParseError};
pub use task::{GeneratedPlan, SprintTask, TaskCategory};
pub use variety::{classify_instruction, TaskKind};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::adaptive::HistoryEntry;
use crate::error::EngineError;
use crate::metrics::AttentionMetrics;
use crate::models::{DifficultyBounds, DifficultySettings, EmotionSample, PerformanceMetrics};
use crate::utils::truncate_for_log;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "generation";

use crate::{log_debug, log_info, log_warn};

const RAW_LOG_CHARS: usize = 600;

/// Everything the generator may condition on for one request.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub session_id: String,
    pub round: u32,
    /// Settings the decision engine picked for the next round.
    pub current: DifficultySettings,
    pub performance: PerformanceMetrics,
    pub attention: Option<AttentionMetrics>,
    pub recent_samples: Vec<EmotionSample>,
    pub history: Vec<HistoryEntry>,
    pub recent_task_kinds: Vec<TaskKind>,
    pub category: Option<TaskCategory>,
    /// Cancelled when the owning game ends.
    pub cancel: CancellationToken,
}

impl GenerationContext {
    pub fn new(session_id: impl Into<String>, round: u32, current: DifficultySettings) -> Self {
        Self {
            session_id: session_id.into(),
            round,
            current,
            performance: PerformanceMetrics::default(),
            attention: None,
            recent_samples: Vec::new(),
            history: Vec::new(),
            recent_task_kinds: Vec::new(),
            category: None,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FallbackReason {
    Timeout,
    Transport,
    Status(u16),
    Malformed,
    Cancelled,
    /// Another request for the same session was still running.
    InFlight,
}

impl From<&EngineError> for FallbackReason {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Timeout(_) => FallbackReason::Timeout,
            EngineError::Status { status } => FallbackReason::Status(*status),
            EngineError::MalformedResponse { .. } => FallbackReason::Malformed,
            EngineError::Cancelled => FallbackReason::Cancelled,
            _ => FallbackReason::Transport,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum GenerationOutcome {
    Generated {
        plan: GeneratedPlan,
        #[serde(skip)]
        raw_text: String,
    },
    Fallback {
        plan: GeneratedPlan,
        reason: FallbackReason,
    },
}

impl GenerationOutcome {
    pub fn plan(&self) -> &GeneratedPlan {
        match self {
            GenerationOutcome::Generated { plan, .. } | GenerationOutcome::Fallback { plan, .. } => {
                plan
            }
        }
    }

    pub fn into_plan(self) -> GeneratedPlan {
        match self {
            GenerationOutcome::Generated { plan, .. } | GenerationOutcome::Fallback { plan, .. } => {
                plan
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GenerationOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            GenerationOutcome::Fallback { reason, .. } => Some(*reason),
            GenerationOutcome::Generated { .. } => None,
        }
    }
}

/// Holds a session's in-flight slot until dropped.
struct InFlightGuard {
    sessions: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl InFlightGuard {
    fn acquire(sessions: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> Option<Self> {
        let mut active = sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(session_id.to_string()) {
            return None;
        }
        Some(Self {
            sessions: Arc::clone(sessions),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

#[derive(Clone)]
pub struct GenerativeTaskClient {
    generator: Arc<dyn TextGenerator>,
    fallback: FallbackGenerator,
    bounds: DifficultyBounds,
    timeout: Duration,
    in_flight: Arc<Mutex<HashSet<String>>>,
    debug: bool,
}

impl GenerativeTaskClient {
    pub fn new(generator: Arc<dyn TextGenerator>, bounds: DifficultyBounds, timeout: Duration) -> Self {
        Self {
            generator,
            fallback: FallbackGenerator::new(bounds.clone()),
            bounds,
            timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            debug: false,
        }
    }

    /// Also log every prompt.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn is_available(&self) -> bool {
        self.generator.is_available().await
    }

    /// Produce the next round's plan. Never fails: every problem degrades
    /// to the local fallback with the reason attached.
    pub async fn generate(&self, ctx: &GenerationContext) -> GenerationOutcome {
        let fallback = self.fallback.plan(ctx);

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &ctx.session_id) else {
            log_debug!(
                "generation for session {} already running, ignoring request",
                ctx.session_id
            );
            return GenerationOutcome::Fallback {
                plan: fallback,
                reason: FallbackReason::InFlight,
            };
        };

        if ctx.cancel.is_cancelled() {
            return GenerationOutcome::Fallback {
                plan: fallback,
                reason: FallbackReason::Cancelled,
            };
        }

        let prompt = build_prompt(ctx, &self.bounds);
        if self.debug {
            log_debug!("prompt for round {}:\n{}", ctx.round, prompt);
        }

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(EngineError::Cancelled),
            res = timeout(self.timeout, self.generator.generate_text(&prompt)) => match res {
                Ok(inner) => inner,
                Err(_) => Err(EngineError::Timeout(self.timeout)),
            },
        };

        let text = match result {
            Ok(text) => text,
            Err(EngineError::Cancelled) => {
                log_info!("generation for session {} cancelled", ctx.session_id);
                return GenerationOutcome::Fallback {
                    plan: fallback,
                    reason: FallbackReason::Cancelled,
                };
            }
            Err(err) => {
                log_warn!("generator call failed, using fallback: {}", err);
                if let EngineError::MalformedResponse { raw, .. } = &err {
                    log_debug!("raw generator body: {}", truncate_for_log(raw, RAW_LOG_CHARS));
                }
                return GenerationOutcome::Fallback {
                    plan: fallback,
                    reason: FallbackReason::from(&err),
                };
            }
        };

        let value = match parse_lenient(&text) {
            Ok(value) => value,
            Err(err) => {
                log_warn!("generator output unusable, using fallback: {}", err);
                log_debug!("raw generator text: {}", truncate_for_log(&text, RAW_LOG_CHARS));
                return GenerationOutcome::Fallback {
                    plan: fallback,
                    reason: FallbackReason::Malformed,
                };
            }
        };

        match task::plan_from_value(&value, fallback.settings.tier(), &fallback, &self.bounds) {
            Some(plan) => GenerationOutcome::Generated {
                plan,
                raw_text: text,
            },
            None => {
                log_warn!("generator output had neither a task nor settings, using fallback");
                log_debug!("raw generator text: {}", truncate_for_log(&text, RAW_LOG_CHARS));
                GenerationOutcome::Fallback {
                    plan: fallback,
                    reason: FallbackReason::Malformed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    enum Script {
        Text(&'static str),
        Status(u16),
        Hang,
    }

    struct ScriptedGenerator {
        script: Script,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(script: Script) -> Self {
            Self {
                script,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.script {
                Script::Text(text) => Ok(text.to_string()),
                Script::Status(status) => Err(EngineError::Status { status: *status }),
                Script::Hang => std::future::pending().await,
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn client(generator: Arc<ScriptedGenerator>) -> GenerativeTaskClient {
        GenerativeTaskClient::new(
            generator,
            DifficultyBounds::default(),
            Duration::from_millis(5000),
        )
    }

    fn ctx() -> GenerationContext {
        GenerationContext::new("game-1", 2, DifficultySettings::preset(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_at_deadline() {
        let generator = Arc::new(ScriptedGenerator::new(Script::Hang));
        let started = Instant::now();
        let outcome = client(generator).generate(&ctx()).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Timeout));
        assert_eq!(started.elapsed(), Duration::from_millis(5000));
        assert!(DifficultyBounds::default().contains(&outcome.plan().settings));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_after_deadline_is_ignored() {
        let generator = Arc::new(
            ScriptedGenerator::new(Script::Text(r#"{"newSettings":{"itemCount":9}}"#))
                .delayed(Duration::from_secs(10)),
        );
        let started = Instant::now();
        let outcome = client(generator).generate(&ctx()).await;
        assert!(outcome.is_fallback());
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let generator = Arc::new(ScriptedGenerator::new(Script::Status(500)));
        let outcome = client(generator).generate(&ctx()).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Status(500)));
        assert_eq!(outcome.plan().settings, DifficultySettings::preset(5));
    }

    #[tokio::test]
    async fn test_prose_falls_back_as_malformed() {
        let generator = Arc::new(ScriptedGenerator::new(Script::Text("not json at all")));
        let outcome = client(generator).generate(&ctx()).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Malformed));
        assert!(!outcome.plan().task.instruction.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_reply_is_repaired_and_clamped() {
        let generator = Arc::new(ScriptedGenerator::new(Script::Text(
            "Here is the plan:\n```json\n{\"task\": {\"instruction\": \"Tap the green stars\", \
             \"durationSecs\": 90, \"targetColor\": \"green\"}, \"newSettings\": {\"boxCount\": 14, \
             \"pauseTime\": 50,}, \"tips\": [\"Look carefully\", \"Take a bre",
        )));
        let outcome = client(generator).generate(&ctx()).await;
        assert!(!outcome.is_fallback(), "{outcome:?}");
        let plan = outcome.plan();
        assert_eq!(plan.task.instruction, "Tap the green stars");
        assert_eq!(plan.task.duration_secs, 60);
        assert_eq!(plan.settings.item_count, 10);
        assert_eq!(plan.settings.pause_time_ms, 200);
        assert_eq!(plan.tips.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_request_for_same_session_is_ignored() {
        let generator = Arc::new(
            ScriptedGenerator::new(Script::Text(r#"{"reasoning":"ok","newSettings":{}}"#))
                .delayed(Duration::from_secs(1)),
        );
        let client = client(Arc::clone(&generator));
        let context = ctx();

        let (first, second) = tokio::join!(client.generate(&context), client.generate(&context));
        assert!(!first.is_fallback());
        assert_eq!(second.fallback_reason(), Some(FallbackReason::InFlight));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let third = client.generate(&context).await;
        assert!(!third.is_fallback());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_sessions_are_not_blocked() {
        let generator = Arc::new(
            ScriptedGenerator::new(Script::Text(r#"{"newSettings":{}}"#))
                .delayed(Duration::from_secs(1)),
        );
        let client = client(Arc::clone(&generator));
        let a = ctx();
        let b = GenerationContext::new("game-2", 1, DifficultySettings::preset(2));

        let (first, second) = tokio::join!(client.generate(&a), client.generate(&b));
        assert!(!first.is_fallback());
        assert!(!second.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_end_cancels_in_flight_call() {
        let generator = Arc::new(ScriptedGenerator::new(Script::Hang));
        let client = client(generator);
        let context = ctx();
        let token = context.cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(800)).await;
            token.cancel();
        });

        let started = Instant::now();
        let outcome = client.generate(&context).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Cancelled));
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }
}
