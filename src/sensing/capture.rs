use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{EngineError, Result};

/// One captured camera frame, already JPEG encoded.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wire form expected by the classifier's `frame` field.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }
}

/// A camera-like source. Only one holder may have it open at a time; a
/// second `open()` fails until `close()` is called.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self) -> Result<()>;

    async fn grab(&self) -> Result<Frame>;

    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Exclusive-ownership flag shared by the built-in devices.
#[derive(Debug, Default)]
struct Lease {
    held: AtomicBool,
}

impl Lease {
    fn acquire(&self, device: &str) -> Result<()> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EngineError::Capture(format!("{device} is already in use")))
    }

    fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn ensure_held(&self, device: &str) -> Result<()> {
        if self.is_held() {
            Ok(())
        } else {
            Err(EngineError::Capture(format!("{device} is not open")))
        }
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| EngineError::Capture(format!("jpeg encode failed: {err}")))?;
    Ok(buf.into_inner())
}

async fn encode_off_thread(image: DynamicImage, quality: u8) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_jpeg(&image, quality))
        .await
        .map_err(|err| EngineError::Capture(format!("jpeg worker join failed: {err}")))?
}

/// Reads the most recent still an external camera daemon keeps writing to
/// disk. Any format `image` can decode is accepted and re-encoded as JPEG.
pub struct SnapshotFileDevice {
    name: String,
    path: PathBuf,
    quality: u8,
    lease: Lease,
}

impl SnapshotFileDevice {
    pub fn new(path: impl Into<PathBuf>, quality: u8) -> Self {
        let path = path.into();
        Self {
            name: format!("snapshot:{}", path.display()),
            path,
            quality,
            lease: Lease::default(),
        }
    }
}

#[async_trait]
impl CaptureDevice for SnapshotFileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<()> {
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|err| EngineError::Capture(format!("{}: {err}", self.path.display())))?;
        self.lease.acquire(&self.name)
    }

    async fn grab(&self) -> Result<Frame> {
        self.lease.ensure_held(&self.name)?;
        let captured_at = Utc::now();
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| EngineError::Capture(format!("{}: {err}", self.path.display())))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|err| EngineError::Capture(format!("snapshot decode failed: {err}")))?;
        let jpeg = encode_off_thread(image, self.quality).await?;
        Ok(Frame { jpeg, captured_at })
    }

    fn close(&self) {
        self.lease.release();
    }

    fn is_open(&self) -> bool {
        self.lease.is_held()
    }
}

/// Generated test card. Always obtainable, used for demos and tests.
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    quality: u8,
    frame_no: AtomicU32,
    lease: Lease,
}

impl SyntheticDevice {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality,
            frame_no: AtomicU32::new(0),
            lease: Lease::default(),
        }
    }

    pub fn frames_grabbed(&self) -> u32 {
        self.frame_no.load(Ordering::Relaxed)
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new(64, 48, 80)
    }
}

#[async_trait]
impl CaptureDevice for SyntheticDevice {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn open(&self) -> Result<()> {
        self.lease.acquire(self.name())
    }

    async fn grab(&self) -> Result<Frame> {
        self.lease.ensure_held(self.name())?;
        let n = self.frame_no.fetch_add(1, Ordering::Relaxed);
        let shift = (n % 256) as u8;
        let (w, h) = (self.width, self.height);
        let card = RgbImage::from_fn(w, h, |x, y| {
            let r = ((x * 255) / w) as u8;
            let g = ((y * 255) / h) as u8;
            Rgb([r, g, shift])
        });
        let jpeg = encode_off_thread(DynamicImage::ImageRgb8(card), self.quality).await?;
        Ok(Frame {
            jpeg,
            captured_at: Utc::now(),
        })
    }

    fn close(&self) {
        self.lease.release();
    }

    fn is_open(&self) -> bool {
        self.lease.is_held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_is_exclusive_until_closed() {
        let device = SyntheticDevice::default();
        device.open().await.unwrap();
        assert!(matches!(device.open().await, Err(EngineError::Capture(_))));
        device.close();
        device.open().await.unwrap();
        assert!(device.is_open());
    }

    #[tokio::test]
    async fn test_grab_requires_open() {
        let device = SyntheticDevice::default();
        assert!(device.grab().await.is_err());
    }

    #[tokio::test]
    async fn test_synthetic_frame_is_jpeg() {
        let device = SyntheticDevice::new(16, 16, 70);
        device.open().await.unwrap();
        let frame = device.grab().await.unwrap();
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
        assert!(!frame.to_base64().is_empty());
        assert_eq!(device.frames_grabbed(), 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_cannot_open() {
        let device = SnapshotFileDevice::new("/nonexistent/focusplay/frame.png", 80);
        assert!(device.open().await.is_err());
        assert!(!device.is_open());
    }
}
