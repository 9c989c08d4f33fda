//! Session transition function
//!
//! [`SessionState`] is synchronous and owns every piece of session data.
//! Phase-changing calls are split in two: a `begin_*` method checks the
//! guard, moves into `Loading` (or marks narration in flight) and hands back
//! an [`Issued`] call; [`SessionState::complete`] applies the gateway result
//! and always lands in a terminal phase. The async driver in
//! [`super::Session`] performs the network round trip in between.

use super::phase::{ErrorInfo, ImageResult, Pending, Phase, PhaseKind};
use super::prompts;
use super::{Mode, Style};
use crate::capture::{CameraHandle, CaptureDevice, CapturedImage, DeviceAccessError};
use crate::gateway::{
    AudioRef, GatewayFailure, ImageRef, ModelResult, Operation, Rgb, Segment, SegmentSet,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an event was refused or an operation did not succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Guard failed on the current phase; nothing changed
    #[error("{event} is not allowed while the session is {phase}")]
    NotAllowed {
        event: &'static str,
        phase: PhaseKind,
    },

    /// Guard failed on the current mode; nothing changed
    #[error("{event} requires {required} mode")]
    WrongMode { event: &'static str, required: Mode },

    /// Another call is outstanding; nothing changed
    #[error("{0} is already in flight")]
    Busy(Operation),

    /// The event's argument does not fit the current phase; nothing changed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Device(#[from] DeviceAccessError),

    #[error(transparent)]
    Gateway(#[from] GatewayFailure),
}

impl SessionError {
    /// True when the event was rejected by a guard and state is unchanged
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::NotAllowed { .. }
                | SessionError::WrongMode { .. }
                | SessionError::Busy(_)
                | SessionError::InvalidInput(_)
        )
    }
}

/// Identifies an issued call; results are matched back by epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    operation: Operation,
}

impl Ticket {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// Inputs for the one network call a transition needs
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCall {
    Generate {
        prompt: String,
    },
    Redesign {
        captured: CapturedImage,
        prompt: String,
    },
    Segment {
        image: ImageRef,
    },
    Recolor {
        image: ImageRef,
        mask: Segment,
        color: Rgb,
    },
    Reconstruct {
        image: ImageRef,
    },
    Narrate {
        image: ImageRef,
        style: Style,
    },
}

impl PendingCall {
    pub fn operation(&self) -> Operation {
        match self {
            PendingCall::Generate { .. } => Operation::Generate,
            PendingCall::Redesign { .. } => Operation::Redesign,
            PendingCall::Segment { .. } => Operation::Segment,
            PendingCall::Recolor { .. } => Operation::Recolor,
            PendingCall::Reconstruct { .. } => Operation::Reconstruct,
            PendingCall::Narrate { .. } => Operation::SynthesizeVoice,
        }
    }
}

/// A call the driver must now perform
#[derive(Debug)]
pub struct Issued {
    pub ticket: Ticket,
    pub call: PendingCall,
}

/// Successful payload of a gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Image(ImageRef),
    Segments(SegmentSet),
    Model(ModelResult),
    Audio(AudioRef),
}

pub type CallResult = Result<CallOutcome, GatewayFailure>;

/// How a result was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result landed; the session is now in this phase
    Applied(PhaseKind),
    /// The result belonged to a superseded request and was dropped
    Stale,
}

/// Renderable view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub phase: PhaseKind,
    pub style: Style,
    pub in_flight: Option<Operation>,
    pub image: Option<ImageRef>,
    pub captured: bool,
    pub segments: Option<SegmentSet>,
    pub model: Option<ModelResult>,
    pub audio: Option<AudioRef>,
    pub error: Option<ErrorInfo>,
    pub quote: Option<String>,
}

/// All mutable session data; mutated only through the methods below
#[derive(Debug)]
pub struct SessionState {
    mode: Mode,
    phase: Phase,
    style: Style,
    error: Option<ErrorInfo>,
    quote: Option<String>,
    in_flight: Option<Operation>,
    epoch: u64,
}

impl SessionState {
    pub fn new(style: Style) -> Self {
        Self {
            mode: Mode::Generate,
            phase: Phase::Idle,
            style,
            error: None,
            quote: None,
            in_flight: None,
            epoch: 0,
        }
    }

    // ========== Getters ==========

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// The visible error message, if any
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn quote(&self) -> Option<&str> {
        self.quote.as_deref()
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            phase: self.phase.kind(),
            style: self.style,
            in_flight: self.in_flight,
            image: self.phase.image().cloned(),
            captured: self.phase.captured().is_some(),
            segments: self.phase.segments().cloned(),
            model: self.phase.model().cloned(),
            audio: self.phase.audio().cloned(),
            error: self.error.clone(),
            quote: self.quote.clone(),
        }
    }

    // ========== Immediate transitions ==========

    /// Switch top-level mode. Always allowed: releases the camera, clears
    /// every result and orphans any outstanding call.
    pub fn switch_mode(&mut self, mode: Mode) {
        self.set_phase(Phase::Idle);
        self.mode = mode;
        self.error = None;
        self.quote = None;
        if let Some(op) = self.in_flight.take() {
            tracing::debug!(target: "session", operation = %op, "Orphaning in-flight call on mode switch");
        }
        self.epoch += 1;
    }

    pub fn select_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Enter `CameraActive`, acquiring `device`
    pub fn start_camera(&mut self, device: &dyn CaptureDevice) -> Result<(), SessionError> {
        const EVENT: &str = "startCameraCapture";
        self.require_mode(EVENT, Mode::Redesign)?;
        self.require_idle_gateway()?;
        if self.phase.holds_device() {
            return Err(self.not_allowed(EVENT));
        }

        // Prior results are cleared before the device is touched
        self.set_phase(Phase::Idle);
        self.error = None;

        match CameraHandle::acquire(device) {
            Ok(handle) => {
                self.set_phase(Phase::CameraActive(handle));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "session", device = device.name(), error = %e, "Camera access failed");
                self.fail(ErrorInfo::device(&e));
                Err(e.into())
            }
        }
    }

    /// Snapshot the live frame and release the camera
    pub fn take_picture(&mut self) -> Result<(), SessionError> {
        match &self.phase {
            Phase::CameraActive(handle) if handle.is_ready() => {}
            Phase::CameraActive(_) => return Err(DeviceAccessError::NotReady.into()),
            _ => return Err(self.not_allowed("takePicture")),
        }

        let Phase::CameraActive(handle) = std::mem::take(&mut self.phase) else {
            unreachable!("phase checked above");
        };
        match handle.take_picture() {
            Ok(still) => {
                self.set_phase(Phase::Captured(still));
                Ok(())
            }
            Err(e) => {
                self.fail(ErrorInfo::device(&e));
                Err(e.into())
            }
        }
    }

    /// Drop the 3-D model and go back to the image it came from
    pub fn close_model(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Reconstructed { .. }) {
            return Err(self.not_allowed("closeModel"));
        }
        let source = std::mem::take(&mut self.phase).into_image_result();
        if let Some(source) = source {
            self.set_phase(Phase::ResultReady(source));
        }
        Ok(())
    }

    // ========== Call-issuing transitions ==========

    pub fn begin_generate(&mut self) -> Result<Issued, SessionError> {
        self.require_mode("startGenerate", Mode::Generate)?;
        self.require_idle_gateway()?;

        let prompt = prompts::generate_prompt(self.style);
        Ok(self.enter_loading(Operation::Generate, None, PendingCall::Generate { prompt }))
    }

    pub fn begin_redesign(&mut self) -> Result<Issued, SessionError> {
        self.require_idle_gateway()?;
        if !matches!(self.phase, Phase::Captured(_)) {
            return Err(self.not_allowed("submitRedesign"));
        }

        let Phase::Captured(captured) = std::mem::take(&mut self.phase) else {
            unreachable!("phase checked above");
        };
        let prompt = prompts::redesign_prompt(self.style);
        Ok(self.enter_loading(
            Operation::Redesign,
            None,
            PendingCall::Redesign { captured, prompt },
        ))
    }

    pub fn begin_segmentation(&mut self) -> Result<Issued, SessionError> {
        self.require_idle_gateway()?;
        let image = match &self.phase {
            Phase::ResultReady(result) => result.image.clone(),
            _ => return Err(self.not_allowed("requestSegmentation")),
        };

        let fallback = std::mem::take(&mut self.phase);
        Ok(self.enter_loading(
            Operation::Segment,
            Some(fallback),
            PendingCall::Segment { image },
        ))
    }

    pub fn begin_recolor(&mut self, mask: Segment, color: Rgb) -> Result<Issued, SessionError> {
        self.require_idle_gateway()?;
        let image = match &self.phase {
            Phase::Segmented { image, segments } => {
                if !segments.contains(&mask) {
                    return Err(SessionError::InvalidInput(format!(
                        "mask '{}' is not one of the current segments",
                        mask.label
                    )));
                }
                image.image.clone()
            }
            _ => return Err(self.not_allowed("recolorObject")),
        };

        let fallback = std::mem::take(&mut self.phase);
        Ok(self.enter_loading(
            Operation::Recolor,
            Some(fallback),
            PendingCall::Recolor { image, mask, color },
        ))
    }

    pub fn begin_reconstruction(&mut self) -> Result<Issued, SessionError> {
        self.require_idle_gateway()?;
        let image = match &self.phase {
            Phase::ResultReady(result) | Phase::Segmented { image: result, .. } => {
                result.image.clone()
            }
            _ => return Err(self.not_allowed("requestReconstruction")),
        };

        let fallback = std::mem::take(&mut self.phase);
        Ok(self.enter_loading(
            Operation::Reconstruct,
            Some(fallback),
            PendingCall::Reconstruct { image },
        ))
    }

    /// Narration runs without leaving the current phase
    pub fn begin_narration(&mut self) -> Result<Issued, SessionError> {
        self.require_idle_gateway()?;
        let image = match &self.phase {
            Phase::ResultReady(_) | Phase::Segmented { .. } | Phase::Reconstructed { .. } => self
                .phase
                .image()
                .cloned()
                .ok_or_else(|| SessionError::InvalidInput("no image to narrate".into()))?,
            _ => return Err(self.not_allowed("requestNarration")),
        };

        self.error = None;
        self.in_flight = Some(Operation::SynthesizeVoice);
        Ok(Issued {
            ticket: self.ticket(Operation::SynthesizeVoice),
            call: PendingCall::Narrate {
                image,
                style: self.style,
            },
        })
    }

    // ========== Completion ==========

    /// Apply the result of an issued call
    pub fn complete(&mut self, ticket: Ticket, result: CallResult) -> Completion {
        if !self.is_current(&ticket) {
            tracing::debug!(
                target: "session",
                operation = %ticket.operation,
                "Dropping response from a superseded request"
            );
            return Completion::Stale;
        }
        self.in_flight = None;

        if ticket.operation == Operation::SynthesizeVoice {
            return self.complete_narration(result);
        }

        let fallback = match std::mem::take(&mut self.phase) {
            Phase::Loading(pending) => pending.fallback.map(|b| *b),
            other => {
                // in_flight without Loading only happens for narration
                tracing::error!(target: "session", phase = %other.kind(), "Completion outside Loading");
                self.phase = other;
                return Completion::Stale;
            }
        };

        let next = match (ticket.operation, result) {
            (Operation::Generate | Operation::Redesign | Operation::Recolor, Ok(CallOutcome::Image(image))) => {
                Ok(Phase::ResultReady(ImageResult::new(image)))
            }
            (Operation::Segment, Ok(CallOutcome::Segments(segments))) => {
                match fallback.and_then(Phase::into_image_result) {
                    Some(image) => Ok(Phase::Segmented { image, segments }),
                    None => Err((
                        GatewayFailure::malformed(ticket.operation, "no source image to segment"),
                        None,
                    )),
                }
            }
            (Operation::Reconstruct, Ok(CallOutcome::Model(model))) => {
                match fallback.and_then(Phase::into_image_result) {
                    Some(source) => Ok(Phase::Reconstructed { source, model }),
                    None => Err((
                        GatewayFailure::malformed(ticket.operation, "no source image to reconstruct"),
                        None,
                    )),
                }
            }
            (operation, Ok(other)) => Err((
                GatewayFailure::malformed(operation, format!("unexpected payload {:?}", other)),
                fallback,
            )),
            (_, Err(failure)) => Err((failure, fallback)),
        };

        match next {
            Ok(phase) => self.set_phase(phase),
            Err((failure, fallback)) => {
                tracing::warn!(target: "session", operation = %failure.operation, error = %failure.message, "Call failed");
                let info = ErrorInfo::gateway(&failure);
                match fallback {
                    // Keep the last displayed artifact on screen
                    Some(previous) => {
                        self.error = Some(info);
                        self.set_phase(previous);
                    }
                    None => self.fail(info),
                }
            }
        }
        Completion::Applied(self.phase.kind())
    }

    fn complete_narration(&mut self, result: CallResult) -> Completion {
        match result {
            Ok(CallOutcome::Audio(audio)) => match self.phase.image_result_mut() {
                Some(image) => image.audio = Some(audio),
                None => {
                    tracing::debug!(target: "session", "Narration arrived with no image on screen")
                }
            },
            Ok(other) => {
                let failure = GatewayFailure::malformed(
                    Operation::SynthesizeVoice,
                    format!("unexpected payload {:?}", other),
                );
                self.error = Some(ErrorInfo::gateway(&failure));
            }
            Err(failure) => {
                tracing::warn!(target: "session", error = %failure.message, "Narration failed");
                self.error = Some(ErrorInfo::gateway(&failure));
            }
        }
        Completion::Applied(self.phase.kind())
    }

    pub fn set_quote(&mut self, quote: Option<String>) {
        self.quote = quote;
    }

    /// Whether `ticket` still names the outstanding call
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch && self.in_flight == Some(ticket.operation)
    }

    // ========== Private Helpers ==========

    fn ticket(&self, operation: Operation) -> Ticket {
        Ticket {
            epoch: self.epoch,
            operation,
        }
    }

    fn enter_loading(
        &mut self,
        operation: Operation,
        fallback: Option<Phase>,
        call: PendingCall,
    ) -> Issued {
        self.error = None;
        self.quote = None;
        self.in_flight = Some(operation);
        self.set_phase(Phase::Loading(Pending {
            operation,
            fallback: fallback.map(Box::new),
        }));
        Issued {
            ticket: self.ticket(operation),
            call,
        }
    }

    fn fail(&mut self, info: ErrorInfo) {
        self.error = Some(info.clone());
        self.set_phase(Phase::Failed(info));
    }

    /// Replace the phase; the old phase (and any camera handle in it) is dropped here
    fn set_phase(&mut self, phase: Phase) {
        let from = self.phase.kind();
        let to = phase.kind();
        self.phase = phase;
        if from != to {
            tracing::debug!(target: "session", %from, %to, "Phase transition");
        }
    }

    fn require_mode(&self, event: &'static str, required: Mode) -> Result<(), SessionError> {
        if self.mode == required {
            Ok(())
        } else {
            Err(SessionError::WrongMode { event, required })
        }
    }

    fn require_idle_gateway(&self) -> Result<(), SessionError> {
        match self.in_flight {
            Some(op) => Err(SessionError::Busy(op)),
            None => Ok(()),
        }
    }

    fn not_allowed(&self, event: &'static str) -> SessionError {
        SessionError::NotAllowed {
            event,
            phase: self.phase.kind(),
        }
    }
}


#[cfg(test)]
mod property_tests {
    //! Random event sequences against the session invariants

    use super::*;
    use crate::capture::testing::FakeCamera;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Event {
        StartGenerate,
        StartCamera,
        TakePicture,
        SubmitRedesign,
        SwitchMode(bool),
        SelectStyle(usize),
        RequestSegmentation,
        Recolor,
        RequestReconstruction,
        RequestNarration,
        CloseModel,
        /// Resolve the oldest outstanding call; `true` = success
        Resolve(bool),
    }

    fn arb_event() -> impl Strategy<Value = Event> {
        (0usize..12, any::<bool>(), 0usize..6).prop_map(|(kind, flag, style)| match kind {
            0 => Event::StartGenerate,
            1 => Event::StartCamera,
            2 => Event::TakePicture,
            3 => Event::SubmitRedesign,
            4 => Event::SwitchMode(flag),
            5 => Event::SelectStyle(style),
            6 => Event::RequestSegmentation,
            7 => Event::Recolor,
            8 => Event::RequestReconstruction,
            9 => Event::RequestNarration,
            10 => Event::CloseModel,
            _ => Event::Resolve(flag),
        })
    }

    fn success_for(call: &PendingCall) -> CallOutcome {
        match call {
            PendingCall::Generate { .. } | PendingCall::Redesign { .. } => {
                CallOutcome::Image(ImageRef::new("img"))
            }
            PendingCall::Recolor { .. } => CallOutcome::Image(ImageRef::new("recolored")),
            PendingCall::Segment { .. } => {
                CallOutcome::Segments(SegmentSet::new(vec![Segment::new("M1", "sofa")]))
            }
            PendingCall::Reconstruct { .. } => {
                CallOutcome::Model(ModelResult::from_url("https://cdn.example/m.glb"))
            }
            PendingCall::Narrate { .. } => CallOutcome::Audio(AudioRef::new("audio")),
        }
    }

    fn check_invariants(state: &SessionState, camera: &FakeCamera) {
        let kind = state.phase_kind();

        // Device held iff camera phase
        assert_eq!(camera.open_handles() == 1, kind == PhaseKind::CameraActive);
        assert!(camera.open_handles() <= 1);

        // Loading always has its call marked in flight
        if let Some(op) = state.phase().loading_operation() {
            assert_eq!(state.in_flight(), Some(op));
        }
        if let Some(op) = state.in_flight() {
            if op == Operation::SynthesizeVoice {
                assert!(state.phase().image().is_some());
            } else {
                assert_eq!(kind, PhaseKind::Loading);
            }
        }

        // Follow-up phases always carry an image
        if matches!(kind, PhaseKind::Segmented | PhaseKind::Reconstructed) {
            assert!(state.phase().image().is_some());
        }
        if kind == PhaseKind::Failed {
            assert!(state.error().is_some());
        }
    }

    fn apply(
        state: &mut SessionState,
        camera: &FakeCamera,
        outstanding: &mut Vec<Issued>,
        event: Event,
    ) {
        let before = state.snapshot();
        let busy = state.in_flight().is_some();

        let issued = match event {
            Event::StartGenerate => state.begin_generate().ok(),
            Event::StartCamera => {
                let _ = state.start_camera(camera);
                None
            }
            Event::TakePicture => {
                let _ = state.take_picture();
                None
            }
            Event::SubmitRedesign => state.begin_redesign().ok(),
            Event::SwitchMode(redesign) => {
                state.switch_mode(if redesign { Mode::Redesign } else { Mode::Generate });
                let snap = state.snapshot();
                assert_eq!(snap.phase, PhaseKind::Idle);
                assert!(snap.image.is_none() && !snap.captured && snap.audio.is_none());
                assert!(snap.segments.is_none() && snap.model.is_none());
                None
            }
            Event::SelectStyle(i) => {
                state.select_style(Style::ALL[i]);
                None
            }
            Event::RequestSegmentation => state.begin_segmentation().ok(),
            Event::Recolor => state
                .begin_recolor(Segment::new("M1", "sofa"), Rgb::new(9, 9, 9))
                .ok(),
            Event::RequestReconstruction => state.begin_reconstruction().ok(),
            Event::RequestNarration => state.begin_narration().ok(),
            Event::CloseModel => {
                let _ = state.close_model();
                None
            }
            Event::Resolve(ok) => {
                if !outstanding.is_empty() {
                    let Issued { ticket, call } = outstanding.remove(0);
                    let result = if ok {
                        Ok(success_for(&call))
                    } else {
                        Err(GatewayFailure::network(call.operation(), "down"))
                    };
                    let completion = state.complete(ticket, result);
                    if let Completion::Applied(kind) = completion {
                        if call.operation() != Operation::SynthesizeVoice {
                            assert!(kind.is_terminal());
                        }
                    }
                }
                None
            }
        };

        if let Some(issued) = issued {
            // A call can only be issued when nothing else is in flight
            assert!(!busy, "issued {:?} while busy: {:?}", issued.call, before);
            outstanding.push(issued);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_invariants_hold_for_any_event_sequence(
            events in prop::collection::vec(arb_event(), 1..60)
        ) {
            let camera = FakeCamera::default();
            let mut state = SessionState::new(Style::Modern);
            let mut outstanding = Vec::new();

            for event in events {
                apply(&mut state, &camera, &mut outstanding, event);
                check_invariants(&state, &camera);
            }
        }

        #[test]
        fn prop_busy_session_rejects_new_calls_unchanged(
            events in prop::collection::vec(arb_event(), 0..30)
        ) {
            let camera = FakeCamera::default();
            let mut state = SessionState::new(Style::Modern);
            let mut outstanding = Vec::new();
            for event in events {
                apply(&mut state, &camera, &mut outstanding, event);
            }

            if state.in_flight().is_some() {
                let before = state.snapshot();
                prop_assert!(state.begin_generate().is_err());
                prop_assert!(state.begin_redesign().is_err());
                prop_assert!(state.begin_segmentation().is_err());
                prop_assert!(state.begin_reconstruction().is_err());
                prop_assert!(state.begin_narration().is_err());
                prop_assert!(state
                    .begin_recolor(Segment::new("M1", "sofa"), Rgb::new(0, 0, 0))
                    .is_err());
                prop_assert_eq!(state.snapshot(), before);
            }
        }
    }
}
