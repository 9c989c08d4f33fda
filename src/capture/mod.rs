//! Capture device seam
//!
//! A capture device hands out a live stream while the session is in the
//! camera phase. The stream is wrapped in a [`CameraHandle`] which releases
//! the underlying device when dropped, so every exit path (snapshot, mode
//! switch, error, teardown) gives the device back.

mod still_file;

pub use still_file::StillFileCamera;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix used for JPEG data URLs produced by snapshots
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// MIME type of an encoded image, from its magic bytes. Defaults to JPEG.
pub fn image_mime_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

/// Errors raised while acquiring or reading a capture device
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeviceAccessError {
    /// The user or the platform refused access to the device
    #[error("Camera access was denied.")]
    PermissionDenied,

    /// Another application holds the device
    #[error("Camera is already in use by another app.")]
    InUse,

    /// The stream is open but has not produced a frame yet
    #[error("Camera is not ready yet.")]
    NotReady,

    /// Any other acquisition or read failure
    #[error("Could not access camera.")]
    Unavailable(String),
}

/// A locally captured still frame, held as a data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    data_url: String,
}

impl CapturedImage {
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    /// Build a data URL from encoded image bytes (JPEG, PNG or WebP)
    pub fn from_image_bytes(bytes: &[u8]) -> Self {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            data_url: format!("data:{};base64,{}", image_mime_type(bytes), encoded),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

/// Something that can open a live capture stream
pub trait CaptureDevice: Send + Sync {
    /// Human-readable device name for logs
    fn name(&self) -> &str;

    /// Acquire the device and start streaming
    fn open(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError>;
}

/// Stand-in used when no camera has been configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaptureDevice;

impl CaptureDevice for NoCaptureDevice {
    fn name(&self) -> &str {
        "none"
    }

    fn open(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
        Err(DeviceAccessError::Unavailable(
            "no capture device configured".to_string(),
        ))
    }
}

/// A live, exclusively held capture stream
pub trait CaptureStream: Send {
    /// Whether a frame is available to snapshot
    fn is_ready(&self) -> bool;

    /// Grab the current frame as a still image
    fn snapshot(&mut self) -> Result<CapturedImage, DeviceAccessError>;

    /// Stop the stream and give the device back. Must be idempotent.
    fn release(&mut self);
}

/// Scoped owner of an open capture stream
///
/// Dropping the handle releases the device.
pub struct CameraHandle {
    device: String,
    stream: Box<dyn CaptureStream>,
}

impl CameraHandle {
    /// Open `device` and wrap the stream
    pub fn acquire(device: &dyn CaptureDevice) -> Result<Self, DeviceAccessError> {
        let stream = device.open()?;
        tracing::debug!(target: "capture", device = device.name(), "Capture device acquired");
        Ok(Self {
            device: device.name().to_string(),
            stream,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.stream.is_ready()
    }

    /// Snapshot the current frame, consuming (and thereby releasing) the handle
    pub fn take_picture(mut self) -> Result<CapturedImage, DeviceAccessError> {
        if !self.stream.is_ready() {
            return Err(DeviceAccessError::NotReady);
        }
        self.stream.snapshot()
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.stream.release();
        tracing::debug!(target: "capture", device = %self.device, "Capture device released");
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeCamera;
    use super::*;

    #[test]
    fn test_handle_releases_on_drop() {
        let camera = FakeCamera::default();
        let handle = CameraHandle::acquire(&camera).unwrap();
        assert_eq!(camera.open_handles(), 1);
        drop(handle);
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_take_picture_releases_device() {
        let camera = FakeCamera::default();
        let handle = CameraHandle::acquire(&camera).unwrap();
        let still = handle.take_picture().unwrap();
        assert!(still.data_url().starts_with(JPEG_DATA_URL_PREFIX));
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_take_picture_not_ready_still_releases() {
        let camera = FakeCamera::default();
        camera
            .not_ready
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let handle = CameraHandle::acquire(&camera).unwrap();
        assert_eq!(handle.take_picture(), Err(DeviceAccessError::NotReady));
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_denied_device_holds_nothing() {
        let camera = FakeCamera::default();
        camera.deny.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = CameraHandle::acquire(&camera).unwrap_err();
        assert_eq!(err.to_string(), "Camera access was denied.");
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_jpeg_data_url() {
        let still = CapturedImage::from_image_bytes(b"abc");
        assert_eq!(still.data_url(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn test_data_url_mime_follows_magic_bytes() {
        let png = CapturedImage::from_image_bytes(b"\x89PNG\r\n\x1a\n");
        assert!(png.data_url().starts_with("data:image/png;base64,"));

        let webp = CapturedImage::from_image_bytes(b"RIFF\x10\0\0\0WEBPVP8 ");
        assert!(webp.data_url().starts_with("data:image/webp;base64,"));

        // RIFF without the WEBP tag is not WebP
        assert_eq!(image_mime_type(b"RIFF\x10\0\0\0WAVEfmt "), "image/jpeg");
        assert_eq!(image_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(image_mime_type(b""), "image/jpeg");
    }
}
