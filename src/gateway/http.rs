//! HTTP implementation of the gateway (JSON over reqwest)

use super::{
    AudioRef, AvailableModels, CharacterContext, ChatReply, ChatTurn, Gateway, GatewayFailure,
    GatewayResult, HealthStatus, ImageRef, ModelResult, Operation, Rgb, Segment, SegmentSet,
};
use crate::capture::CapturedImage;
use crate::config::GatewayConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// ========== Request bodies ==========

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct RedesignRequest<'a> {
    image_url: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Serialize)]
struct RecolorRequest<'a> {
    image_url: &'a str,
    mask: &'a Segment,
    color: Rgb,
}

#[derive(Debug, Serialize)]
struct VoiceoverRequest<'a> {
    image_url: &'a str,
    style: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    character_name: &'a str,
    style: &'a str,
    conversation_history: &'a [ChatTurn],
}

// ========== Response bodies ==========

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    #[serde(alias = "segments")]
    masks: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct ReconstructResponse {
    reconstruction_url: String,
    #[serde(default)]
    model_info: Option<ModelInfoBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelInfoBody {
    #[serde(default)]
    model_used: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    direct_download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceoverResponse {
    voiceover_url: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    quote: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
    #[serde(default)]
    source: Option<String>,
}

/// Gateway talking JSON to a single backend origin
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base: Url,
}

impl HttpGateway {
    /// Build a gateway from explicit configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let base = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("roomcraft/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, operation: Operation) -> GatewayResult<Url> {
        self.base
            .join(operation.path())
            .map_err(|e| GatewayFailure::network(operation, format!("Invalid endpoint URL: {}", e)))
    }

    async fn post<B, R>(&self, operation: Operation, body: &B) -> GatewayResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(operation)?;
        self.send(operation, self.client.post(url).json(body)).await
    }

    async fn get<R: DeserializeOwned>(&self, operation: Operation) -> GatewayResult<R> {
        let url = self.endpoint(operation)?;
        self.send(operation, self.client.get(url)).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        operation: Operation,
        request: reqwest::RequestBuilder,
    ) -> GatewayResult<R> {
        tracing::debug!(target: "gateway", %operation, "Sending request");
        let started = std::time::Instant::now();

        let response = request.send().await.map_err(|e| {
            tracing::warn!(target: "gateway", %operation, error = %e, "Request failed");
            GatewayFailure::from_reqwest(operation, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "gateway",
                %operation,
                status = status.as_u16(),
                body = %error_text,
                "Backend returned an error"
            );
            return Err(GatewayFailure::status(operation, status.as_u16(), &error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayFailure::from_reqwest(operation, &e))?;
        let parsed = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(target: "gateway", %operation, error = %e, "Malformed response body");
            GatewayFailure::malformed(operation, format!("Failed to parse response: {}", e))
        })?;

        tracing::debug!(
            target: "gateway",
            %operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate_image(&self, prompt: &str) -> GatewayResult<ImageRef> {
        let resp: ImageResponse = self
            .post(Operation::Generate, &PromptRequest { prompt })
            .await?;
        non_empty(Operation::Generate, "image_url", resp.image_url).map(ImageRef::new)
    }

    async fn redesign_image(
        &self,
        captured: &CapturedImage,
        prompt: &str,
    ) -> GatewayResult<ImageRef> {
        let body = RedesignRequest {
            image_url: captured.data_url(),
            prompt,
        };
        let resp: ImageResponse = self.post(Operation::Redesign, &body).await?;
        non_empty(Operation::Redesign, "image_url", resp.image_url).map(ImageRef::new)
    }

    async fn segment(&self, image: &ImageRef) -> GatewayResult<SegmentSet> {
        let body = ImageRequest {
            image_url: image.as_str(),
        };
        let resp: SegmentResponse = self.post(Operation::Segment, &body).await?;
        Ok(SegmentSet::new(resp.masks))
    }

    async fn recolor(
        &self,
        image: &ImageRef,
        mask: &Segment,
        color: Rgb,
    ) -> GatewayResult<ImageRef> {
        let body = RecolorRequest {
            image_url: image.as_str(),
            mask,
            color,
        };
        let resp: ImageResponse = self.post(Operation::Recolor, &body).await?;
        non_empty(Operation::Recolor, "image_url", resp.image_url).map(ImageRef::new)
    }

    async fn reconstruct(&self, image: &ImageRef) -> GatewayResult<ModelResult> {
        let body = ImageRequest {
            image_url: image.as_str(),
        };
        let resp: ReconstructResponse = self.post(Operation::Reconstruct, &body).await?;
        let url = non_empty(
            Operation::Reconstruct,
            "reconstruction_url",
            resp.reconstruction_url,
        )?;

        let info = resp.model_info.unwrap_or_default();
        Ok(ModelResult {
            direct_download: info.direct_download.unwrap_or_else(|| url.clone()),
            url,
            model_used: info.model_used,
            file_size: info.file_size,
            content_type: info.content_type,
        })
    }

    async fn synthesize_voice(&self, image: &ImageRef, style: &str) -> GatewayResult<AudioRef> {
        let body = VoiceoverRequest {
            image_url: image.as_str(),
            style,
        };
        let resp: VoiceoverResponse = self.post(Operation::SynthesizeVoice, &body).await?;
        let raw = non_empty(Operation::SynthesizeVoice, "voiceover_url", resp.voiceover_url)?;
        let millis = chrono::Utc::now().timestamp_millis();
        Ok(AudioRef::new(cache_busted(&self.base, &raw, millis)))
    }

    async fn get_quote(&self) -> GatewayResult<String> {
        let resp: QuoteResponse = self.get(Operation::GetQuote).await?;
        non_empty(Operation::GetQuote, "quote", resp.quote)
    }

    async fn chat(&self, message: &str, context: &CharacterContext) -> GatewayResult<ChatReply> {
        let body = ChatRequest {
            message,
            character_name: &context.character_name,
            style: &context.style,
            conversation_history: &context.conversation_history,
        };
        let resp: ChatResponse = self.post(Operation::Chat, &body).await?;
        Ok(ChatReply {
            text: non_empty(Operation::Chat, "response", resp.response)?,
            source: resp.source,
        })
    }

    async fn health(&self) -> GatewayResult<HealthStatus> {
        self.get(Operation::Health).await
    }

    async fn available_models(&self) -> GatewayResult<AvailableModels> {
        self.get(Operation::AvailableModels).await
    }
}

/// Parse the configured origin so that endpoint paths join beneath it
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut base = Url::parse(raw.trim())
        .with_context(|| format!("Invalid backend base URL '{}'", raw))?;
    if base.cannot_be_a_base() {
        anyhow::bail!("Backend base URL '{}' cannot carry endpoint paths", raw);
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn non_empty(operation: Operation, field: &str, value: String) -> GatewayResult<String> {
    if value.trim().is_empty() {
        Err(GatewayFailure::malformed(
            operation,
            format!("Response field '{}' is empty", field),
        ))
    } else {
        Ok(value)
    }
}

/// Resolve a narration URL against the backend and tag it with a timestamp
/// so a regenerated clip is never served from cache. Data URLs pass through.
fn cache_busted(base: &Url, raw: &str, millis: i64) -> String {
    if raw.starts_with("data:") {
        return raw.to_string();
    }
    match base.join(raw) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("t", &millis.to_string());
            url.to_string()
        }
        Err(e) => {
            tracing::debug!(target: "gateway", url = raw, error = %e, "Leaving narration URL as-is");
            raw.to_string()
        }
    }
}
