use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adaptive::Decision;
use crate::generation::{FallbackReason, GeneratedPlan, GenerationOutcome};
use crate::metrics::AttentionMetrics;
use crate::models::{DifficultySettings, PerformanceMetrics};

use super::signal::SignalMode;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlanSource {
    Generated,
    Fallback,
}

/// What happened in one round and what the next one will look like.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReport {
    pub round: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub attention: AttentionMetrics,
    pub performance: PerformanceMetrics,
    pub decision: Decision,
    pub next_plan: GeneratedPlan,
    pub plan_source: PlanSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl RoundReport {
    pub(crate) fn plan_parts(outcome: GenerationOutcome) -> (GeneratedPlan, PlanSource, Option<FallbackReason>) {
        let reason = outcome.fallback_reason();
        let source = if outcome.is_fallback() {
            PlanSource::Fallback
        } else {
            PlanSource::Generated
        };
        (outcome.into_plan(), source, reason)
    }
}

/// Payload handed to external persistence when a game ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReport {
    pub game_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub signal: SignalMode,
    pub attention: AttentionMetrics,
    pub performance: PerformanceMetrics,
    /// Settings chosen for the next game.
    pub settings: DifficultySettings,
    pub decision: Decision,
    pub rounds: Vec<RoundReport>,
}
