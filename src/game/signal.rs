use std::sync::Arc;

use serde::Serialize;
use tokio::time::Duration;

use crate::sensing::{
    CaptureDevice, HttpClassifier, SampleSource, SamplingOptions, SharedPlaySnapshot,
    SimulatedClassifier, SnapshotFileDevice, SyntheticDevice,
};
use crate::session::ActivityGate;
use crate::settings::EngineSettings;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "game";

use crate::{log_info, log_warn};

/// Where samples come from for this game.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SignalMode {
    Live,
    Simulated,
}

/// Probe the configured camera and classifier. If either is unavailable,
/// fall back to the simulator driven by `play`.
pub async fn connect_sample_source(
    settings: &EngineSettings,
    activity: Arc<dyn ActivityGate>,
    play: SharedPlaySnapshot,
) -> (SampleSource, SignalMode) {
    let options = SamplingOptions::from_settings(settings);
    let quality = settings.sampling.jpeg_quality;

    let device: Arc<dyn CaptureDevice> = match &settings.classifier.snapshot_path {
        Some(path) => Arc::new(SnapshotFileDevice::new(path.clone(), quality)),
        None => Arc::new(SyntheticDevice::new(320, 240, quality)),
    };
    let classifier = Arc::new(HttpClassifier::new(
        &settings.classifier.base_url,
        Duration::from_millis(settings.classifier.request_timeout_ms),
        Duration::from_millis(settings.classifier.health_timeout_ms),
    ));

    let mut live = SampleSource::new(device, classifier, Arc::clone(&activity), options);
    if live.probe_availability().await {
        log_info!("live telemetry from {}", settings.classifier.base_url);
        return (live, SignalMode::Live);
    }
    live.stop().await;

    log_warn!("telemetry unavailable, using simulated signal");
    let mut simulated = SampleSource::new(
        Arc::new(SyntheticDevice::default()),
        Arc::new(SimulatedClassifier::new(play)),
        activity,
        options,
    );
    simulated.probe_availability().await;
    (simulated, SignalMode::Simulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::PlaySnapshot;
    use crate::session::SessionTracker;
    use std::sync::RwLock;

    #[tokio::test]
    async fn test_unreachable_classifier_selects_simulator() {
        let mut settings = EngineSettings::default();
        settings.classifier.base_url = "http://127.0.0.1:9".into();
        settings.classifier.health_timeout_ms = 500;

        let play = Arc::new(RwLock::new(PlaySnapshot::default()));
        let (mut source, mode) =
            connect_sample_source(&settings, Arc::new(SessionTracker::new()), play).await;
        assert_eq!(mode, SignalMode::Simulated);
        assert!(source.holds_device());
        source.stop().await;
        assert!(!source.holds_device());
    }
}
