//! Designer persona: loading quotes and avatar chat
//!
//! Both are decoration. A gateway failure is replaced by a local fallback
//! and never reaches the session's error state.

use super::Style;
use crate::config::ChatConfig;
use crate::gateway::{CharacterContext, ChatReply, ChatTurn, Gateway};

/// Shown when the backend cannot supply a quote
pub const FALLBACK_QUOTE: &str = "Design is thinking made visual.";

/// Reply used when the avatar backend is unreachable
pub const CANNED_REPLY: &str =
    "I'm having trouble connecting right now, but I'd love to keep talking about your space.";

/// Fetch a designer quote, falling back to [`FALLBACK_QUOTE`]
pub async fn fetch_quote<G: Gateway + ?Sized>(gateway: &G) -> String {
    match gateway.get_quote().await {
        Ok(quote) if !quote.trim().is_empty() => quote,
        Ok(_) => {
            tracing::debug!(target: "session", "Empty quote from backend, using fallback");
            FALLBACK_QUOTE.to_string()
        }
        Err(e) => {
            tracing::debug!(target: "session", error = %e, "Quote unavailable, using fallback");
            FALLBACK_QUOTE.to_string()
        }
    }
}

/// A conversation with the designer avatar
#[derive(Debug, Clone)]
pub struct AvatarChat {
    character_name: String,
    history: Vec<ChatTurn>,
    max_history: usize,
}

impl AvatarChat {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            character_name: config.character_name.clone(),
            history: Vec::new(),
            max_history: config.max_history,
        }
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Send `message` and record the exchange
    ///
    /// Always yields a reply; on failure the canned reply is returned with
    /// `source` set to `"fallback"`.
    pub async fn send<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        message: &str,
        style: Style,
    ) -> ChatReply {
        let context = CharacterContext {
            character_name: self.character_name.clone(),
            style: style.to_string(),
            conversation_history: self.history.clone(),
        };

        let reply = match gateway.chat(message, &context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(target: "session", error = %e, "Avatar chat failed, using canned reply");
                ChatReply {
                    text: CANNED_REPLY.to_string(),
                    source: Some("fallback".to_string()),
                }
            }
        };

        self.history.push(ChatTurn::user(message));
        self.history.push(ChatTurn::assistant(reply.text.clone()));
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
        reply
    }
}
