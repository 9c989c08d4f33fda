//! Design session
//!
//! [`SessionState`] holds the transition rules. [`Session`] wraps it behind
//! a lock, performs the gateway call each transition asks for and feeds the
//! result back in. The lock is never held across an await, so a second
//! event arriving mid-call sees `Loading` and is rejected as busy.

mod designer;
mod events;
mod phase;
mod prompts;
mod state;
mod style;

pub use designer::{fetch_quote, AvatarChat, CANNED_REPLY, FALLBACK_QUOTE};
pub use events::SessionEvent;
pub use phase::{ErrorInfo, ErrorKind, ImageResult, Phase, PhaseKind};
pub use prompts::{generate_prompt, redesign_prompt};
pub use state::{
    CallOutcome, CallResult, Completion, Issued, PendingCall, SessionError, SessionSnapshot,
    SessionState, Ticket,
};
pub use style::{Mode, Style};

use crate::capture::{CaptureDevice, NoCaptureDevice};
use crate::config::SessionConfig;
use crate::gateway::{Gateway, Operation, Rgb, Segment};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Async driver around [`SessionState`]
pub struct Session<G: Gateway + ?Sized> {
    state: Arc<Mutex<SessionState>>,
    gateway: Arc<G>,
    device: Arc<dyn CaptureDevice>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    quotes_while_loading: bool,
}

impl<G: Gateway + ?Sized> Clone for Session<G> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            gateway: Arc::clone(&self.gateway),
            device: Arc::clone(&self.device),
            events: self.events.clone(),
            quotes_while_loading: self.quotes_while_loading,
        }
    }
}

impl<G: Gateway + ?Sized> Session<G> {
    /// Create an idle session in generate mode
    pub fn new(gateway: Arc<G>, config: &SessionConfig) -> Self {
        let style = config.default_style.unwrap_or_else(Style::random);
        tracing::debug!(target: "session", %style, gateway = gateway.name(), "Session created");
        Self {
            state: Arc::new(Mutex::new(SessionState::new(style))),
            gateway,
            device: Arc::new(NoCaptureDevice),
            events: None,
            quotes_while_loading: config.quotes_while_loading,
        }
    }

    /// Use `device` for camera capture
    pub fn with_device(mut self, device: Arc<dyn CaptureDevice>) -> Self {
        self.device = device;
        self
    }

    /// Emit [`SessionEvent`]s on `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn gateway(&self) -> &G {
        self.gateway.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> PhaseKind {
        self.lock().phase_kind()
    }

    pub fn style(&self) -> Style {
        self.lock().style()
    }

    // ========== Immediate Events ==========

    pub fn switch_mode(&self, mode: Mode) {
        self.update(|s| s.switch_mode(mode));
        self.emit(SessionEvent::ModeChanged(mode));
    }

    pub fn select_style(&self, style: Style) {
        self.update(|s| s.select_style(style));
        self.emit(SessionEvent::StyleChanged(style));
    }

    pub fn start_camera_capture(&self) -> Result<(), SessionError> {
        let device = Arc::clone(&self.device);
        self.update(|s| s.start_camera(device.as_ref()))
    }

    pub fn take_picture(&self) -> Result<(), SessionError> {
        self.update(SessionState::take_picture)
    }

    pub fn close_model(&self) -> Result<(), SessionError> {
        self.update(SessionState::close_model)
    }

    // ========== Gateway-backed Events ==========

    pub async fn start_generate(&self) -> Result<Completion, SessionError> {
        let issued = self.update(SessionState::begin_generate)?;
        self.run(issued).await
    }

    pub async fn submit_redesign(&self) -> Result<Completion, SessionError> {
        let issued = self.update(SessionState::begin_redesign)?;
        self.run(issued).await
    }

    pub async fn request_segmentation(&self) -> Result<Completion, SessionError> {
        let issued = self.update(SessionState::begin_segmentation)?;
        self.run(issued).await
    }

    pub async fn recolor_object(&self, mask: Segment, color: Rgb) -> Result<Completion, SessionError> {
        let issued = self.update(|s| s.begin_recolor(mask, color))?;
        self.run(issued).await
    }

    pub async fn request_reconstruction(&self) -> Result<Completion, SessionError> {
        let issued = self.update(SessionState::begin_reconstruction)?;
        self.run(issued).await
    }

    pub async fn request_narration(&self) -> Result<Completion, SessionError> {
        let issued = self.update(SessionState::begin_narration)?;
        self.run(issued).await
    }

    /// Fetch and display a designer quote; never fails
    pub async fn get_quote(&self) -> String {
        let quote = fetch_quote(self.gateway.as_ref()).await;
        self.update(|s| s.set_quote(Some(quote.clone())));
        self.emit(SessionEvent::QuoteUpdated(quote.clone()));
        quote
    }

    // ========== Private Helpers ==========

    async fn run(&self, issued: Issued) -> Result<Completion, SessionError> {
        let Issued { ticket, call } = issued;
        let operation = ticket.operation();
        self.emit(SessionEvent::CallStarted(operation));

        let result = if self.quotes_while_loading && operation != Operation::SynthesizeVoice {
            self.execute_with_quote(ticket, &call).await
        } else {
            self.execute(&call).await
        };

        let failure = result.as_ref().err().cloned();
        let completion = self.update(|s| s.complete(ticket, result));

        match completion {
            Completion::Stale => {
                self.emit(SessionEvent::StaleResponseDropped(operation));
                Ok(Completion::Stale)
            }
            Completion::Applied(_) => match failure {
                Some(failure) => Err(failure.into()),
                None => {
                    if operation == Operation::SynthesizeVoice {
                        let audio = self.lock().phase().audio().cloned();
                        if let Some(audio) = audio {
                            self.emit(SessionEvent::AudioAttached(audio));
                        }
                    }
                    Ok(completion)
                }
            },
        }
    }

    /// Run the call while a quote is fetched alongside it
    ///
    /// The quote is shown only if it arrives while the call is still current.
    async fn execute_with_quote(&self, ticket: Ticket, call: &PendingCall) -> CallResult {
        let main = self.execute(call);
        tokio::pin!(main);
        let quote = fetch_quote(self.gateway.as_ref());
        tokio::pin!(quote);
        let mut quote_done = false;

        loop {
            tokio::select! {
                biased;
                text = &mut quote, if !quote_done => {
                    quote_done = true;
                    let shown = self.update(|s| {
                        if s.is_current(&ticket) {
                            s.set_quote(Some(text.clone()));
                            true
                        } else {
                            false
                        }
                    });
                    if shown {
                        self.emit(SessionEvent::QuoteUpdated(text));
                    }
                }
                result = &mut main => return result,
            }
        }
    }

    async fn execute(&self, call: &PendingCall) -> CallResult {
        let gateway = self.gateway.as_ref();
        match call {
            PendingCall::Generate { prompt } => {
                gateway.generate_image(prompt).await.map(CallOutcome::Image)
            }
            PendingCall::Redesign { captured, prompt } => gateway
                .redesign_image(captured, prompt)
                .await
                .map(CallOutcome::Image),
            PendingCall::Segment { image } => {
                gateway.segment(image).await.map(CallOutcome::Segments)
            }
            PendingCall::Recolor { image, mask, color } => gateway
                .recolor(image, mask, *color)
                .await
                .map(CallOutcome::Image),
            PendingCall::Reconstruct { image } => {
                gateway.reconstruct(image).await.map(CallOutcome::Model)
            }
            PendingCall::Narrate { image, style } => gateway
                .synthesize_voice(image, style.as_str())
                .await
                .map(CallOutcome::Audio),
        }
    }

    /// Apply `f` under the lock and report what changed
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut pending = Vec::new();
        let result = {
            let mut state = self.lock();
            let phase_before = state.phase_kind();
            let error_before = state.error().cloned();

            let result = f(&mut state);

            let phase_after = state.phase_kind();
            if phase_before != phase_after {
                pending.push(SessionEvent::PhaseChanged {
                    from: phase_before,
                    to: phase_after,
                });
            }
            if let Some(error) = state.error() {
                if error_before.as_ref() != Some(error) {
                    pending.push(SessionEvent::Error(error.message.clone()));
                }
            }
            result
        };

        for event in pending {
            self.emit(event);
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(target: "session", "Session lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver just means nobody is rendering
            let _ = tx.send(event);
        }
    }
}
