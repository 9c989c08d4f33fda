//! Session Events
//!
//! Notifications sent from the session driver to whatever renders it.

use super::phase::PhaseKind;
use super::{Mode, Style};
use crate::gateway::{AudioRef, Operation};

/// Events emitted by [`super::Session`]
///
/// These are sent over an unbounded mpsc channel so a slow consumer never
/// blocks a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // ========== State Events ==========
    /// The visible phase changed
    PhaseChanged { from: PhaseKind, to: PhaseKind },

    /// The top-level mode changed
    ModeChanged(Mode),

    /// The selected style changed
    StyleChanged(Style),

    // ========== Call Events ==========
    /// A backend call was issued
    CallStarted(Operation),

    /// A loading quote arrived (or the fallback was used)
    QuoteUpdated(String),

    /// Narration attached to the current image
    AudioAttached(AudioRef),

    /// A visible error message was set
    Error(String),

    /// A response arrived for a request that was superseded
    StaleResponseDropped(Operation),
}
