//! Generation provider boundary adapter.
//!
//! [`GenerationClient`] is the seam between the orchestrator and the
//! remote generative-AI provider. Implementations normalize whatever
//! shape the provider returns into [`GenerationOutput`] and translate
//! remote timeouts and errors into [`GenerationError`] — no raw
//! transport error and no panic ever crosses this boundary.

pub mod http;

use async_trait::async_trait;

use crate::domain::render::{Quality, VideoAspectRatio, VideoDuration};

pub use http::HttpGenerationClient;

/// An image passed inline to the provider. The client base64-encodes
/// the bytes on the wire.
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g. `image/jpeg`).
    pub mime: String,
}

impl InlineImage {
    /// Creates an inline image payload.
    #[must_use]
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
        }
    }
}

/// Normalized parameters for an image generation call.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Generation prompt (non-empty).
    pub prompt: String,
    /// Concrete model id (never the auto sentinel).
    pub model: String,
    /// Quality tier.
    pub quality: Quality,
    /// Aspect ratio string accepted by the model.
    pub aspect_ratio: String,
    /// Optional visual style hint.
    pub style: Option<String>,
    /// Optional negative prompt.
    pub negative_prompt: Option<String>,
    /// Optional deterministic seed.
    pub seed: Option<i32>,
    /// Optional reference image (uploaded source or prior render output).
    pub reference_image: Option<InlineImage>,
}

/// Normalized parameters for a video generation call.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// Generation prompt (non-empty).
    pub prompt: String,
    /// Concrete model id (never the auto sentinel).
    pub model: String,
    /// Clip length; the type admits only 4, 6, or 8 seconds.
    pub duration: VideoDuration,
    /// Frame aspect ratio.
    pub aspect_ratio: VideoAspectRatio,
    /// Optional first-frame image.
    pub first_frame: Option<InlineImage>,
    /// Optional last-frame image.
    pub last_frame: Option<InlineImage>,
    /// Additional reference images (at most three are forwarded).
    pub reference_images: Vec<InlineImage>,
}

/// Where the generated artifact lives.
#[derive(Debug, Clone)]
pub enum GeneratedPayload {
    /// A provider-hosted URL. Ephemeral: the orchestrator must fetch it
    /// and re-upload the bytes into durable storage.
    Url(String),
    /// Inline artifact bytes (already decoded from base64).
    Inline {
        /// Raw artifact bytes.
        data: Vec<u8>,
        /// MIME type of the artifact.
        mime: String,
    },
}

/// Uniform success shape returned by every generation call.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// The generated artifact.
    pub payload: GeneratedPayload,
    /// Wall-clock time the provider spent generating, in milliseconds.
    pub processing_time_ms: i64,
}

/// Uniform failure shape returned by every generation call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GenerationError {
    /// Human-readable failure detail, safe to surface to the caller.
    pub message: String,
}

impl GenerationError {
    /// Creates a generation error from any displayable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Boundary adapter for the remote generation provider.
#[async_trait]
pub trait GenerationClient: Send + Sync + std::fmt::Debug {
    /// Generates an image.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the provider rejects the request,
    /// times out, or returns an unusable payload.
    async fn generate_image(&self, req: &ImageRequest)
    -> Result<GenerationOutput, GenerationError>;

    /// Generates a video clip.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the provider rejects the request,
    /// times out, or returns an unusable payload.
    async fn generate_video(&self, req: &VideoRequest)
    -> Result<GenerationOutput, GenerationError>;
}
