use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::EmotionSample;
use crate::session::ActivityGate;
use crate::settings::EngineSettings;

use super::capture::CaptureDevice;
use super::classifier::FrameClassifier;
use super::clock::{Clock, TokioClock};
use super::gate::IntervalGate;
use super::loop_worker::{poll_once, TickContext, TickOutcome};
use super::scheduler::{every, CancelHandle};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "sensing";

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    pub tick_interval: Duration,
    pub min_interval: Duration,
    pub call_timeout: Duration,
}

impl SamplingOptions {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            tick_interval: Duration::from_millis(settings.sampling.tick_interval_ms),
            min_interval: Duration::from_millis(settings.sampling.min_interval_ms),
            call_timeout: Duration::from_millis(settings.classifier.request_timeout_ms),
        }
    }
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// Owns the capture device and the polling loop for one tracking session.
///
/// "Connected" and "analyzing" are separate: `pause_analysis` keeps the
/// device attached and the loop ticking, only the remote calls stop.
pub struct SampleSource {
    device: Arc<dyn CaptureDevice>,
    classifier: Arc<dyn FrameClassifier>,
    activity: Arc<dyn ActivityGate>,
    clock: Arc<dyn Clock>,
    options: SamplingOptions,
    gate: Arc<Mutex<IntervalGate>>,
    analyzing: Arc<AtomicBool>,
    device_held: bool,
    polling: Option<CancelHandle>,
    cancel_token: Option<CancellationToken>,
}

impl SampleSource {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        classifier: Arc<dyn FrameClassifier>,
        activity: Arc<dyn ActivityGate>,
        options: SamplingOptions,
    ) -> Self {
        Self::with_clock(device, classifier, activity, options, Arc::new(TokioClock))
    }

    pub fn with_clock(
        device: Arc<dyn CaptureDevice>,
        classifier: Arc<dyn FrameClassifier>,
        activity: Arc<dyn ActivityGate>,
        options: SamplingOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            device,
            classifier,
            activity,
            clock,
            gate: Arc::new(Mutex::new(IntervalGate::new(options.min_interval))),
            options,
            analyzing: Arc::new(AtomicBool::new(false)),
            device_held: false,
            polling: None,
            cancel_token: None,
        }
    }

    /// Acquire the capture device and ping the classifier. Both must succeed;
    /// on a failed health check the device is released again.
    pub async fn probe_availability(&mut self) -> bool {
        if !self.device_held {
            if let Err(err) = self.device.open().await {
                log_warn!("capture device {} unavailable: {}", self.device.name(), err);
                return false;
            }
            self.device_held = true;
        }

        match self.classifier.health().await {
            Ok(()) => {
                log_info!("classifier healthy, device {} attached", self.device.name());
                true
            }
            Err(err) => {
                log_warn!("classifier health check failed: {}", err);
                self.release_device();
                false
            }
        }
    }

    /// Start the fixed-cadence loop. `on_sample` runs on the polling task for
    /// every accepted classification, with the epoch of the game the call was
    /// issued under, and reports whether the sample was kept.
    pub fn start_polling<F>(&mut self, on_sample: F) -> Result<()>
    where
        F: Fn(u64, EmotionSample) -> bool + Send + Sync + 'static,
    {
        if self.polling.is_some() {
            bail!("polling already active");
        }
        if !self.device_held {
            bail!("capture device not acquired; probe availability first");
        }

        let cancel_token = CancellationToken::new();
        let ctx = Arc::new(TickContext {
            device: Arc::clone(&self.device),
            classifier: Arc::clone(&self.classifier),
            activity: Arc::clone(&self.activity),
            clock: Arc::clone(&self.clock),
            gate: Arc::clone(&self.gate),
            analyzing: Arc::clone(&self.analyzing),
            call_timeout: self.options.call_timeout,
            cancel_token: cancel_token.clone(),
            on_sample: Arc::new(on_sample),
        });

        self.reset_gate();
        self.analyzing.store(true, Ordering::Release);

        let handle = every(self.options.tick_interval, cancel_token.clone(), move || {
            let ctx = Arc::clone(&ctx);
            async move {
                let outcome = poll_once(&ctx).await;
                if outcome != TickOutcome::Throttled {
                    log_debug!("tick: {:?}", outcome);
                }
            }
        });

        log_info!(
            "polling every {}ms, at most one call per {}ms",
            self.options.tick_interval.as_millis(),
            self.options.min_interval.as_millis()
        );
        self.polling = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn pause_analysis(&self) {
        if self.analyzing.swap(false, Ordering::AcqRel) {
            log_info!("analysis paused");
        }
    }

    /// Resume without re-probing; the next tick is accepted immediately.
    pub fn resume_analysis(&self) {
        self.reset_gate();
        self.analyzing.store(true, Ordering::Release);
        log_info!("analysis resumed");
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }

    pub fn holds_device(&self) -> bool {
        self.device_held
    }

    /// Halt the loop and release the device. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.analyzing.store(false, Ordering::Release);
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.polling.take() {
            handle.shutdown().await;
            log_info!("polling stopped");
        }
        self.release_device();
    }

    fn reset_gate(&self) {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn release_device(&mut self) {
        if self.device_held {
            self.device.close();
            self.device_held = false;
        }
    }
}

impl Drop for SampleSource {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.release_device();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, Result as EngineResult};
    use crate::models::{Emotion, GazeStatus};
    use crate::sensing::capture::{Frame, SyntheticDevice};
    use crate::session::SessionTracker;
    use crate::test_support::{FixedClassifier, MemoryDevice};
    use async_trait::async_trait;

    /// Fails every health check.
    struct DownClassifier;

    #[async_trait]
    impl FrameClassifier for DownClassifier {
        async fn classify(&self, frame: &Frame) -> EngineResult<EmotionSample> {
            Ok(EmotionSample::new(
                Emotion::Neutral,
                0.8,
                frame.captured_at,
                GazeStatus::Looking,
                true,
            ))
        }
        async fn health(&self) -> EngineResult<()> {
            Err(EngineError::Unavailable("down".into()))
        }
    }

    fn options() -> SamplingOptions {
        SamplingOptions {
            tick_interval: Duration::from_millis(1000),
            min_interval: Duration::from_millis(3000),
            call_timeout: Duration::from_millis(2500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_respects_min_interval() {
        let tracker = SessionTracker::new();
        tracker.start_game();
        let classifier = Arc::new(FixedClassifier::new(Emotion::Neutral, true));
        let mut source = SampleSource::new(
            Arc::new(MemoryDevice::new()),
            classifier.clone(),
            Arc::new(tracker.clone()),
            options(),
        );
        assert!(source.probe_availability().await);

        let sink = tracker.clone();
        source
            .start_polling(move |epoch, s| sink.add_sample_for(epoch, s))
            .unwrap();

        // Ticks at 0..=10s; accepted at 0, 3, 6, 9.
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        source.stop().await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.game_samples().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_accepts_next_tick() {
        let tracker = SessionTracker::new();
        tracker.start_game();
        let classifier = Arc::new(FixedClassifier::new(Emotion::Neutral, true));
        let mut source = SampleSource::new(
            Arc::new(MemoryDevice::new()),
            classifier.clone(),
            Arc::new(tracker.clone()),
            options(),
        );
        assert!(source.probe_availability().await);
        source.start_polling(|_, _| true).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        source.pause_analysis();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        source.resume_analysis();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        source.stop().await;
    }

    #[tokio::test]
    async fn test_unhealthy_classifier_releases_device() {
        let device = Arc::new(SyntheticDevice::default());
        let mut source = SampleSource::new(
            device.clone(),
            Arc::new(DownClassifier),
            Arc::new(SessionTracker::new()),
            options(),
        );
        assert!(!source.probe_availability().await);
        assert!(!device.is_open());
        assert!(source.start_polling(|_, _| true).is_err());
    }

    #[tokio::test]
    async fn test_stop_releases_device_and_is_idempotent() {
        let device = Arc::new(SyntheticDevice::default());
        let tracker = Arc::new(SessionTracker::new());
        let mut first = SampleSource::new(
            device.clone(),
            Arc::new(FixedClassifier::new(Emotion::Neutral, true)),
            tracker.clone(),
            options(),
        );
        assert!(first.probe_availability().await);

        let mut second = SampleSource::new(
            device.clone(),
            Arc::new(FixedClassifier::new(Emotion::Neutral, true)),
            tracker.clone(),
            options(),
        );
        assert!(!second.probe_availability().await);

        first.stop().await;
        first.stop().await;
        assert!(second.probe_availability().await);
    }
}
