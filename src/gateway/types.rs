//! Typed payloads exchanged with the design backend

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reference to a displayable image (remote URL or data URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a generated narration clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AudioRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One object mask returned by segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Mask image (URL or base64 payload)
    pub mask: String,
    /// Opaque label from the backend
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Segment {
    pub fn new(mask: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            mask: mask.into(),
            label: label.into(),
            confidence: None,
        }
    }
}

/// Ordered per-object masks for one image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentSet(Vec<Segment>);

impl SegmentSet {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    /// Whether `segment` is one of this set's masks
    pub fn contains(&self, segment: &Segment) -> bool {
        self.0.iter().any(|s| s.mask == segment.mask)
    }
}

impl From<Vec<Segment>> for SegmentSet {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Recolor target colour, sent as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Parses `R,G,B` or `#rrggbb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("expected #rrggbb, got '{}'", s));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|_| format!("invalid hex colour '{}'", s))
            };
            return Ok(Self::new(channel(0)?, channel(2)?, channel(4)?));
        }

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected R,G,B, got '{}'", s));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("colour channel '{}' is not 0-255", part))?;
        }
        Ok(channels.into())
    }
}

/// A reconstructed 3-D asset and what is known about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResult {
    pub url: String,
    pub model_used: Option<String>,
    pub file_size: Option<u64>,
    pub content_type: Option<String>,
    pub direct_download: String,
}

impl ModelResult {
    /// A result carrying only the asset URL
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            direct_download: url.clone(),
            url,
            model_used: None,
            file_size: None,
            content_type: None,
        }
    }

    /// File format, from the content type or the URL extension
    pub fn format(&self) -> Option<&str> {
        if let Some(ct) = self.content_type.as_deref() {
            return Some(ct);
        }
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of avatar conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Who the user is talking to and what has been said so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterContext {
    pub character_name: String,
    pub style: String,
    pub conversation_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    /// Backend-reported origin of the reply (model name, "fallback", ...)
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub fal_api_configured: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAvailability {
    pub model: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailableModels {
    #[serde(default)]
    pub available_models: Vec<ModelAvailability>,
    #[serde(default)]
    pub demo_glb_url: Option<String>,
}
