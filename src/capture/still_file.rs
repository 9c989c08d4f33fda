//! Still-file camera
//!
//! Stands in for a live camera on the command line: opening the device reads
//! a photo from disk, and the snapshot is that photo as a data URL typed by its magic bytes.

use super::{CaptureDevice, CaptureStream, CapturedImage, DeviceAccessError};
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StillFileCamera {
    path: PathBuf,
    name: String,
}

impl StillFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

impl CaptureDevice for StillFileCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn CaptureStream>, DeviceAccessError> {
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => DeviceAccessError::PermissionDenied,
            _ => DeviceAccessError::Unavailable(format!("{}: {}", self.path.display(), e)),
        })?;
        Ok(Box::new(StillFileStream { frame: Some(bytes) }))
    }
}

struct StillFileStream {
    frame: Option<Vec<u8>>,
}

impl CaptureStream for StillFileStream {
    fn is_ready(&self) -> bool {
        self.frame.as_ref().is_some_and(|f| !f.is_empty())
    }

    fn snapshot(&mut self) -> Result<CapturedImage, DeviceAccessError> {
        match &self.frame {
            Some(bytes) if !bytes.is_empty() => Ok(CapturedImage::from_image_bytes(bytes)),
            _ => Err(DeviceAccessError::NotReady),
        }
    }

    fn release(&mut self) {
        self.frame = None;
    }
}
