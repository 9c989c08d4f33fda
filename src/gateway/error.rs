//! Gateway failure type
//!
//! Network errors, non-success statuses and undecodable bodies all collapse
//! into one [`GatewayFailure`]. The cause is kept for logging only; callers
//! are expected to treat every failure the same way.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend operations brokered by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    Redesign,
    Segment,
    Recolor,
    Reconstruct,
    SynthesizeVoice,
    GetQuote,
    Chat,
    Health,
    AvailableModels,
}

impl Operation {
    /// Endpoint path relative to the configured base origin
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Generate => "generate-fal-image",
            Operation::Redesign => "redesign-fal-image",
            Operation::Segment => "segment",
            Operation::Recolor => "recolor",
            Operation::Reconstruct => "reconstruct",
            Operation::SynthesizeVoice => "generate-voiceover",
            Operation::GetQuote => "get-designer-quote",
            Operation::Chat => "chat-with-avatar",
            Operation::Health => "health",
            Operation::AvailableModels => "available-models",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::Redesign => "redesign",
            Operation::Segment => "segment",
            Operation::Recolor => "recolor",
            Operation::Reconstruct => "reconstruct",
            Operation::SynthesizeVoice => "synthesize_voice",
            Operation::GetQuote => "get_quote",
            Operation::Chat => "chat",
            Operation::Health => "health",
            Operation::AvailableModels => "available_models",
        }
    }

    /// Message shown to the user when this operation fails
    pub fn user_message(&self) -> &'static str {
        match self {
            Operation::Generate => "Failed to generate image from backend.",
            Operation::Redesign => "Failed to redesign image.",
            Operation::Segment => "Segmentation failed.",
            Operation::Recolor => "Recolor failed.",
            Operation::Reconstruct => "3D reconstruction failed.",
            Operation::SynthesizeVoice => "Failed to generate audio description.",
            Operation::GetQuote => "Could not fetch a designer quote.",
            Operation::Chat => "Chat is unavailable.",
            Operation::Health => "Backend health check failed.",
            Operation::AvailableModels => "Could not list 3D models.",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong underneath a [`GatewayFailure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureCause {
    /// Connection refused, timeout, DNS and friends
    Network,
    /// The backend answered with a non-success status
    Status { code: u16 },
    /// The body could not be decoded into the expected shape
    MalformedBody,
}

/// The single failure kind every gateway operation can produce
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{operation} failed: {message}")]
pub struct GatewayFailure {
    pub operation: Operation,
    pub message: String,
    pub cause: FailureCause,
}

pub type GatewayResult<T> = std::result::Result<T, GatewayFailure>;

impl GatewayFailure {
    pub fn new(operation: Operation, cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            cause,
        }
    }

    pub fn network(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, FailureCause::Network, message)
    }

    pub fn status(operation: Operation, code: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", code)
        } else {
            format!("HTTP {}: {}", code, truncate(body, 200))
        };
        Self::new(operation, FailureCause::Status { code }, message)
    }

    pub fn malformed(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, FailureCause::MalformedBody, message)
    }

    /// Classify a reqwest transport error
    pub fn from_reqwest(operation: Operation, e: &reqwest::Error) -> Self {
        if e.is_decode() {
            Self::malformed(operation, e.to_string())
        } else if let Some(status) = e.status() {
            Self::status(operation, status.as_u16(), &e.to_string())
        } else if e.is_timeout() {
            Self::network(operation, format!("Request timeout: {}", e))
        } else if e.is_connect() {
            Self::network(operation, format!("Connection failed: {}", e))
        } else {
            Self::network(operation, e.to_string())
        }
    }

    /// Message for the user; the technical detail stays in the logs
    pub fn user_message(&self) -> &'static str {
        self.operation.user_message()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_includes_body() {
        let failure = GatewayFailure::status(Operation::Segment, 500, " boom ");
        assert_eq!(failure.message, "HTTP 500: boom");
        assert_eq!(failure.cause, FailureCause::Status { code: 500 });
        assert_eq!(failure.to_string(), "segment failed: HTTP 500: boom");
    }

    #[test]
    fn test_status_message_without_body() {
        let failure = GatewayFailure::status(Operation::Recolor, 404, "");
        assert_eq!(failure.message, "HTTP 404");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(500);
        let failure = GatewayFailure::status(Operation::Generate, 502, &body);
        assert_eq!(failure.message.len(), "HTTP 502: ".len() + 200);
    }

    #[test]
    fn test_paths_match_backend_routes() {
        assert_eq!(Operation::Generate.path(), "generate-fal-image");
        assert_eq!(Operation::SynthesizeVoice.path(), "generate-voiceover");
        assert_eq!(Operation::GetQuote.path(), "get-designer-quote");
        assert_eq!(Operation::Chat.path(), "chat-with-avatar");
    }

    #[test]
    fn test_user_message_hides_detail() {
        let failure = GatewayFailure::network(Operation::Reconstruct, "connection refused");
        assert_eq!(failure.user_message(), "3D reconstruction failed.");
    }
}
