//! HTTP implementation of the generation provider adapter.
//!
//! [`HttpGenerationClient`] holds the base URL, API key, and a
//! pre-configured [`reqwest::Client`] for a single provider. Requests
//! carry base64-encoded reference images; responses may return either a
//! provider-hosted URL or an inline base64 artifact, both normalized
//! into [`GenerationOutput`].
//!
//! Every call runs under the configured end-to-end timeout. A hung
//! provider surfaces as a [`GenerationError`], never as a stalled
//! request.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::domain::render::Quality;

use super::{
    GeneratedPayload, GenerationClient, GenerationError, GenerationOutput, ImageRequest,
    InlineImage, VideoRequest,
};

/// Generation client backed by the provider's REST API.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

/// Wire form of an inline image.
#[derive(Debug, Serialize)]
struct ImagePayload {
    image_data: String,
    image_type: String,
}

impl From<&InlineImage> for ImagePayload {
    fn from(image: &InlineImage) -> Self {
        Self {
            image_data: BASE64.encode(&image.data),
            image_type: image.mime.clone(),
        }
    }
}

/// Wire form of an image generation request.
#[derive(Debug, Serialize)]
struct ImageGenerationBody {
    prompt: String,
    model: String,
    quality: String,
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image: Option<ImagePayload>,
}

/// Wire form of a video generation request.
#[derive(Debug, Serialize)]
struct VideoGenerationBody {
    prompt: String,
    model: String,
    duration_seconds: u8,
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_frame: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reference_images: Vec<ImagePayload>,
}

/// Wire form of a provider response, for both artifact kinds.
#[derive(Debug, Deserialize)]
struct GenerationResponseBody {
    #[serde(default)]
    artifact_url: Option<String>,
    #[serde(default)]
    artifact_data: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    processing_time_ms: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpGenerationClient {
    /// Creates a client for the provider at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http,
        })
    }

    /// Posts a generation request and normalizes the response.
    async fn post_generation(
        &self,
        path: &str,
        body: &impl Serialize,
        default_mime: &str,
    ) -> Result<GenerationOutput, GenerationError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::new("provider timeout")
                } else {
                    GenerationError::new(format!("provider request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::new(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let body: GenerationResponseBody = response
            .json()
            .await
            .map_err(|e| GenerationError::new(format!("unreadable provider response: {e}")))?;

        if let Some(error) = body.error {
            return Err(GenerationError::new(error));
        }

        let processing_time_ms = body.processing_time_ms.unwrap_or(0);
        let payload = match (body.artifact_data, body.artifact_url) {
            (Some(encoded), _) => {
                let data = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                    GenerationError::new(format!("invalid base64 artifact from provider: {e}"))
                })?;
                GeneratedPayload::Inline {
                    data,
                    mime: body.mime_type.unwrap_or_else(|| default_mime.to_string()),
                }
            }
            (None, Some(url)) => GeneratedPayload::Url(url),
            (None, None) => {
                return Err(GenerationError::new(
                    "no artifact data or URL received from generation service",
                ));
            }
        };

        Ok(GenerationOutput {
            payload,
            processing_time_ms,
        })
    }
}

#[async_trait::async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate_image(
        &self,
        req: &ImageRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let quality = match req.quality {
            Quality::Standard => "standard",
            Quality::High => "high",
            Quality::Ultra => "ultra",
        };
        let body = ImageGenerationBody {
            prompt: req.prompt.clone(),
            model: req.model.clone(),
            quality: quality.to_string(),
            aspect_ratio: req.aspect_ratio.clone(),
            style: req.style.clone(),
            negative_prompt: req.negative_prompt.clone(),
            seed: req.seed,
            reference_image: req.reference_image.as_ref().map(ImagePayload::from),
        };
        self.post_generation("/v1/images:generate", &body, "image/png")
            .await
    }

    async fn generate_video(
        &self,
        req: &VideoRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let body = VideoGenerationBody {
            prompt: req.prompt.clone(),
            model: req.model.clone(),
            duration_seconds: req.duration.seconds(),
            aspect_ratio: req.aspect_ratio.to_string(),
            first_frame: req.first_frame.as_ref().map(ImagePayload::from),
            last_frame: req.last_frame.as_ref().map(ImagePayload::from),
            reference_images: req
                .reference_images
                .iter()
                .take(3)
                .map(ImagePayload::from)
                .collect(),
        };
        self.post_generation("/v1/videos:generate", &body, "video/mp4")
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn inline_images_are_base64_on_the_wire() {
        let image = InlineImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");
        let payload = ImagePayload::from(&image);
        assert_eq!(payload.image_data, BASE64.encode([0xFF, 0xD8, 0xFF]));
        assert_eq!(payload.image_type, "image/jpeg");
    }

    #[test]
    fn video_body_caps_reference_images_at_three() {
        let frames: Vec<InlineImage> = (0..5)
            .map(|i| InlineImage::new(vec![i], "image/jpeg"))
            .collect();
        let body = VideoGenerationBody {
            prompt: "p".to_string(),
            model: "m".to_string(),
            duration_seconds: 8,
            aspect_ratio: "16:9".to_string(),
            first_frame: None,
            last_frame: None,
            reference_images: frames.iter().take(3).map(ImagePayload::from).collect(),
        };
        assert_eq!(body.reference_images.len(), 3);
    }

    #[test]
    fn response_with_error_field_is_a_failure() {
        let raw = r#"{"error": "quota exceeded"}"#;
        let body: GenerationResponseBody = serde_json::from_str(raw).ok().unwrap_or_else(|| {
            panic!("response must parse");
        });
        assert_eq!(body.error.as_deref(), Some("quota exceeded"));
        assert!(body.artifact_url.is_none());
    }
}
