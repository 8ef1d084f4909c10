//! Throwaway HTTP server and in-process fakes for the async seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

use crate::error::{EngineError, Result as EngineResult};
use crate::generation::TextGenerator;
use crate::models::{Emotion, EmotionSample, GazeStatus};
use crate::sensing::{CaptureDevice, Frame, FrameClassifier};

#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Canned {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serve `routes` (keyed by request path) until the test ends. Unknown paths
/// get a 404. Returns the base URL, e.g. `http://127.0.0.1:40123`.
pub async fn serve(routes: Vec<(&'static str, Canned)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<&'static str, Canned>> = Arc::new(routes.into_iter().collect());

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let _ = respond(stream, &routes).await;
            });
        }
    });

    format!("http://{addr}")
}

async fn respond(
    mut stream: TcpStream,
    routes: &HashMap<&'static str, Canned>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    let canned = routes
        .get(path)
        .cloned()
        .unwrap_or_else(|| Canned::status(404, "{}"));

    if !canned.delay.is_zero() {
        tokio::time::sleep(canned.delay).await;
    }

    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        canned.status,
        canned.body.len(),
        canned.body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// In-memory capture device with the usual exclusive-open rule.
pub struct MemoryDevice {
    open: AtomicBool,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CaptureDevice for MemoryDevice {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open(&self) -> EngineResult<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Capture("busy".into()));
        }
        Ok(())
    }

    async fn grab(&self) -> EngineResult<Frame> {
        Ok(Frame {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            captured_at: Utc::now(),
        })
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Classifier that always reports the same emotion and gaze.
pub struct FixedClassifier {
    pub emotion: Emotion,
    pub looking: bool,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(emotion: Emotion, looking: bool) -> Self {
        Self {
            emotion,
            looking,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FrameClassifier for FixedClassifier {
    async fn classify(&self, frame: &Frame) -> EngineResult<EmotionSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gaze = if self.looking {
            GazeStatus::Looking
        } else {
            GazeStatus::NotLooking
        };
        Ok(EmotionSample::new(
            self.emotion,
            0.9,
            frame.captured_at,
            gaze,
            self.looking,
        ))
    }

    async fn health(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Generator that answers every prompt with the same text after `delay`.
pub struct CannedGenerator {
    pub reply: String,
    pub delay: Duration,
    pub calls: AtomicUsize,
    /// Every prompt received, oldest first.
    pub prompts: Mutex<Vec<String>>,
}

impl CannedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate_text(&self, prompt: &str) -> EngineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }

    async fn is_available(&self) -> bool {
        true
    }
}
