//! Session phases
//!
//! [`Phase`] is the single source of truth for what is on screen. Each
//! variant owns exactly the data it displays, so an open camera next to a
//! finished 3-D model (or two "current" images) cannot be represented.

use crate::capture::{CameraHandle, CapturedImage, DeviceAccessError};
use crate::gateway::{AudioRef, GatewayFailure, ImageRef, ModelResult, Operation, SegmentSet};
use serde::{Deserialize, Serialize};

/// Data-free discriminant of [`Phase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    CameraActive,
    Captured,
    Loading,
    ResultReady,
    Segmented,
    Reconstructed,
    Failed,
}

impl PhaseKind {
    /// Returns a human-readable description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            PhaseKind::Idle => "Your image will appear here",
            PhaseKind::CameraActive => "Camera is live",
            PhaseKind::Captured => "Photo captured",
            PhaseKind::Loading => "Processing…",
            PhaseKind::ResultReady => "Design ready",
            PhaseKind::Segmented => "Pick an object to recolor",
            PhaseKind::Reconstructed => "3D model ready",
            PhaseKind::Failed => "Something went wrong",
        }
    }

    /// Phases a loading call may land in
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseKind::ResultReady
                | PhaseKind::Segmented
                | PhaseKind::Reconstructed
                | PhaseKind::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Idle => "idle",
            PhaseKind::CameraActive => "camera_active",
            PhaseKind::Captured => "captured",
            PhaseKind::Loading => "loading",
            PhaseKind::ResultReady => "result_ready",
            PhaseKind::Segmented => "segmented",
            PhaseKind::Reconstructed => "reconstructed",
            PhaseKind::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A displayed image and the narration attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub image: ImageRef,
    pub audio: Option<AudioRef>,
}

impl ImageResult {
    pub fn new(image: ImageRef) -> Self {
        Self { image, audio: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Capture device permission or availability
    DeviceAccess,
    /// Any backend call failure
    Gateway,
}

/// A visible error message and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub operation: Option<Operation>,
    /// What the user sees
    pub message: String,
    /// Technical detail for logs and `--json` output
    pub detail: Option<String>,
    pub at: chrono::DateTime<chrono::Local>,
}

impl ErrorInfo {
    pub fn device(error: &DeviceAccessError) -> Self {
        let detail = match error {
            DeviceAccessError::Unavailable(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            kind: ErrorKind::DeviceAccess,
            operation: None,
            message: error.to_string(),
            detail,
            at: chrono::Local::now(),
        }
    }

    pub fn gateway(failure: &GatewayFailure) -> Self {
        Self {
            kind: ErrorKind::Gateway,
            operation: Some(failure.operation),
            message: failure.user_message().to_string(),
            detail: Some(failure.message.clone()),
            at: chrono::Local::now(),
        }
    }
}

/// An outstanding phase-changing call
#[derive(Debug)]
pub struct Pending {
    pub operation: Operation,
    /// Stable phase to return to if the call fails
    pub(crate) fallback: Option<Box<Phase>>,
}

/// What the session is currently showing
#[derive(Debug, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Live camera; the handle is the only place a device is ever held
    CameraActive(CameraHandle),
    Captured(CapturedImage),
    Loading(Pending),
    ResultReady(ImageResult),
    Segmented {
        image: ImageResult,
        segments: SegmentSet,
    },
    Reconstructed {
        source: ImageResult,
        model: ModelResult,
    },
    Failed(ErrorInfo),
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::CameraActive(_) => PhaseKind::CameraActive,
            Phase::Captured(_) => PhaseKind::Captured,
            Phase::Loading(_) => PhaseKind::Loading,
            Phase::ResultReady(_) => PhaseKind::ResultReady,
            Phase::Segmented { .. } => PhaseKind::Segmented,
            Phase::Reconstructed { .. } => PhaseKind::Reconstructed,
            Phase::Failed(_) => PhaseKind::Failed,
        }
    }

    pub fn holds_device(&self) -> bool {
        matches!(self, Phase::CameraActive(_))
    }

    /// The image result this phase shows or was built from
    pub fn image_result(&self) -> Option<&ImageResult> {
        match self {
            Phase::ResultReady(image) | Phase::Segmented { image, .. } => Some(image),
            Phase::Reconstructed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub(crate) fn image_result_mut(&mut self) -> Option<&mut ImageResult> {
        match self {
            Phase::ResultReady(image) | Phase::Segmented { image, .. } => Some(image),
            Phase::Reconstructed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Consume the phase, keeping its image result
    pub(crate) fn into_image_result(self) -> Option<ImageResult> {
        match self {
            Phase::ResultReady(image) | Phase::Segmented { image, .. } => Some(image),
            Phase::Reconstructed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image_result().map(|r| &r.image)
    }

    pub fn audio(&self) -> Option<&AudioRef> {
        self.image_result().and_then(|r| r.audio.as_ref())
    }

    pub fn segments(&self) -> Option<&SegmentSet> {
        match self {
            Phase::Segmented { segments, .. } => Some(segments),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ModelResult> {
        match self {
            Phase::Reconstructed { model, .. } => Some(model),
            _ => None,
        }
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        match self {
            Phase::Captured(still) => Some(still),
            _ => None,
        }
    }

    pub fn loading_operation(&self) -> Option<Operation> {
        match self {
            Phase::Loading(pending) => Some(pending.operation),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ErrorInfo> {
        match self {
            Phase::Failed(info) => Some(info),
            _ => None,
        }
    }
}
