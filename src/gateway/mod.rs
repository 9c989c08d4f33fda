//! Backend gateway
//!
//! Every external AI operation goes through the [`Gateway`] trait: one typed
//! input, exactly one network round trip, and either a typed payload or a
//! [`GatewayFailure`]. There are no retries; failures surface immediately.

mod error;
mod http;
mod types;

pub use error::{FailureCause, GatewayFailure, GatewayResult, Operation};
pub use http::HttpGateway;
pub use types::*;

use crate::capture::CapturedImage;
use async_trait::async_trait;

/// Uniform contract for the design backend
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Gateway name for logs
    fn name(&self) -> &str;

    /// Generate a new room image from a text prompt
    async fn generate_image(&self, prompt: &str) -> GatewayResult<ImageRef>;

    /// Restyle a captured photo
    async fn redesign_image(&self, captured: &CapturedImage, prompt: &str)
        -> GatewayResult<ImageRef>;

    /// Split an image into per-object masks
    async fn segment(&self, image: &ImageRef) -> GatewayResult<SegmentSet>;

    /// Paint the masked object of `image` with `color`
    async fn recolor(&self, image: &ImageRef, mask: &Segment, color: Rgb)
        -> GatewayResult<ImageRef>;

    /// Reconstruct a 3-D model from an image
    async fn reconstruct(&self, image: &ImageRef) -> GatewayResult<ModelResult>;

    /// Narrate the room shown in `image`
    async fn synthesize_voice(&self, image: &ImageRef, style: &str) -> GatewayResult<AudioRef>;

    /// Fetch a designer quote. Callers treat failure as "use a fallback".
    async fn get_quote(&self) -> GatewayResult<String>;

    /// Talk to the designer avatar. Callers treat failure as "use a canned reply".
    async fn chat(&self, message: &str, context: &CharacterContext) -> GatewayResult<ChatReply>;

    /// Backend liveness
    async fn health(&self) -> GatewayResult<HealthStatus>;

    /// Which 3-D reconstruction models the backend can reach
    async fn available_models(&self) -> GatewayResult<AvailableModels>;
}
