use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::EmotionSample;
use crate::session::ActivityGate;

use super::capture::CaptureDevice;
use super::classifier::FrameClassifier;
use super::clock::Clock;
use super::gate::IntervalGate;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "sensing";

use crate::{log_debug, log_warn};

/// Receives the epoch of the game the tick started under, plus the sample.
/// Returns whether the sample was kept.
pub type SampleCallback = Arc<dyn Fn(u64, EmotionSample) -> bool + Send + Sync>;

/// What one scheduler tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Analysis is paused between rounds.
    Paused,
    /// No live game; the remote call was never issued.
    Inactive,
    /// Inside the minimum interval since the last accepted call.
    Throttled,
    Sampled,
    /// The game ended while the call was in flight; its result was dropped.
    Discarded,
    /// Capture or classification failed. The next tick governs retry.
    Failed,
    Cancelled,
}

/// Everything a tick needs, shared between ticks of one polling run.
pub struct TickContext {
    pub device: Arc<dyn CaptureDevice>,
    pub classifier: Arc<dyn FrameClassifier>,
    pub activity: Arc<dyn ActivityGate>,
    pub clock: Arc<dyn Clock>,
    pub gate: Arc<Mutex<IntervalGate>>,
    pub analyzing: Arc<AtomicBool>,
    pub call_timeout: Duration,
    pub cancel_token: CancellationToken,
    pub on_sample: SampleCallback,
}

pub async fn poll_once(ctx: &TickContext) -> TickOutcome {
    if !ctx.analyzing.load(Ordering::Acquire) {
        return TickOutcome::Paused;
    }
    let Some(epoch) = ctx.activity.active_epoch() else {
        return TickOutcome::Inactive;
    };
    {
        let mut gate = ctx.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !gate.try_accept(ctx.clock.now()) {
            return TickOutcome::Throttled;
        }
    }

    // Ending the game and starting another both move the epoch on.
    let mut epoch_rx = ctx.activity.subscribe();
    let session_ended = async move {
        if epoch_rx.wait_for(|current| *current != Some(epoch)).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let work = async {
        let frame = ctx.device.grab().await?;
        ctx.classifier.classify(&frame).await
    };

    let result = tokio::select! {
        res = tokio::time::timeout(ctx.call_timeout, work) => res,
        _ = ctx.cancel_token.cancelled() => return TickOutcome::Cancelled,
        _ = session_ended => {
            log_debug!("classification abandoned: game ended mid-call");
            return TickOutcome::Discarded;
        }
    };

    match result {
        Ok(Ok(sample)) => {
            if (ctx.on_sample)(epoch, sample) {
                TickOutcome::Sampled
            } else {
                log_debug!("late sample dropped: its game is over");
                TickOutcome::Discarded
            }
        }
        Ok(Err(err)) => {
            log_warn!("classification failed ({:?}): {}", err.kind(), err);
            TickOutcome::Failed
        }
        Err(_) => {
            log_warn!(
                "classification timed out (> {}ms)",
                ctx.call_timeout.as_millis()
            );
            TickOutcome::Failed
        }
    }
}
