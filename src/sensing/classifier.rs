use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::{EngineError, Result};
use crate::models::{Emotion, EmotionSample, GazeStatus};
use crate::utils::truncate_for_log;

use super::capture::Frame;

/// Remote (or simulated) emotion and gaze classification.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<EmotionSample>;

    /// Lightweight liveness probe.
    async fn health(&self) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest {
    frame: String,
}

/// Body returned by `POST /analyze_frame`. Every field is optional; the
/// service omits fields when no face is found.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub gaze_status: Option<String>,
    #[serde(default, alias = "lookingAtScreen")]
    pub looking_at_screen: Option<bool>,
    #[serde(default, rename = "faceDetected", alias = "face_detected")]
    pub face_detected: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ClassifierResponse {
    /// Normalise into a sample stamped with the capture time. Unknown
    /// emotions read as neutral; a missing face forces `no-face`.
    pub fn into_sample(self, captured_at: DateTime<Utc>) -> EmotionSample {
        let emotion = self
            .emotion
            .as_deref()
            .and_then(Emotion::from_label)
            .unwrap_or(Emotion::Neutral);
        let confidence = self.confidence.unwrap_or(0.0);

        if self.face_detected == Some(false) {
            return EmotionSample::new(emotion, confidence, captured_at, GazeStatus::NoFace, false);
        }

        let gaze = match (self.gaze_status.as_deref(), self.looking_at_screen) {
            (Some(label), _) => GazeStatus::from_label(label),
            (None, Some(true)) => GazeStatus::Looking,
            (None, Some(false)) => GazeStatus::NotLooking,
            (None, None) => GazeStatus::NoFace,
        };
        let looking = self
            .looking_at_screen
            .unwrap_or(gaze == GazeStatus::Looking);

        EmotionSample::new(emotion, confidence, captured_at, gaze, looking)
    }
}

/// Client for the classifier service (`/analyze_frame`, `/health`).
pub struct HttpClassifier {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl HttpClassifier {
    pub fn new(base_url: &str, request_timeout: Duration, health_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            health_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl FrameClassifier for HttpClassifier {
    async fn classify(&self, frame: &Frame) -> Result<EmotionSample> {
        let request = AnalyzeRequest {
            frame: frame.to_base64(),
        };

        let response = self
            .client
            .post(format!("{}/analyze_frame", self.base_url))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let parsed: ClassifierResponse = serde_json::from_str(&text)
            .map_err(|err| EngineError::malformed(err.to_string(), truncate_for_log(&text, 200)))?;
        if let Some(reason) = parsed.error {
            return Err(EngineError::malformed(reason, truncate_for_log(&text, 200)));
        }

        Ok(parsed.into_sample(frame.captured_at))
    }

    async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|err| EngineError::Unavailable(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Unavailable(format!(
                "health returned HTTP {}",
                response.status().as_u16()
            )))
        }
    }
}
