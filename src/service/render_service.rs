//! The generation request orchestrator.
//!
//! Each request moves through `validating → credits_reserved →
//! generating → uploading → persisting → done`, with a failure edge from
//! every post-reservation state that marks the render `failed`, refunds
//! the reserved credits, and only then returns the error. The final
//! metadata writes (completion row, gallery publication) are the one
//! exception: the generation succeeded and was billed correctly, so
//! their failures are logged as data-consistency warnings instead of
//! refunded.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::model_registry::{
    CostParams, FALLBACK_IMAGE_BASE_CREDITS, FALLBACK_VIDEO_CREDITS_PER_SECOND,
};
use crate::domain::render::{
    GenerationType, ImageSettings, Quality, RenderSettings, RenderStatus, VideoAspectRatio,
    VideoDuration, VideoSettings,
};
use crate::domain::{ChainId, ModelRegistry, Render, RenderId, RenderKind};
use crate::error::GatewayError;
use crate::generation::{
    GeneratedPayload, GenerationClient, ImageRequest, InlineImage, VideoRequest,
};
use crate::persistence::{
    CreditLedger, GrantKind, RenderStore, Subscriptions, TransactionReference,
};
use crate::storage::{ArtifactCategory, ArtifactStore, StoredArtifact};

/// A binary file taken from the incoming multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// MIME type reported by the client.
    pub mime: String,
    /// Original filename, if the client sent one.
    pub filename: Option<String>,
}

/// Validated parameters for one video generation request.
#[derive(Debug, Clone)]
pub struct VideoJob {
    /// Generation prompt.
    pub prompt: String,
    /// Requested model id; `None` or `"auto"` selects the default.
    pub model: Option<String>,
    /// Clip length.
    pub duration: VideoDuration,
    /// Frame aspect ratio.
    pub aspect_ratio: VideoAspectRatio,
    /// Frame sourcing mode.
    pub generation_type: GenerationType,
    /// Owning project.
    pub project_id: Uuid,
    /// Chain to append to, if any.
    pub chain_id: Option<ChainId>,
    /// Prior render this one builds on, if any.
    pub reference_render_id: Option<RenderId>,
    /// Source image for image-to-video.
    pub uploaded_image: Option<UploadedFile>,
    /// Ordered keyframes for keyframe-sequence.
    pub keyframes: Vec<UploadedFile>,
    /// Explicit gallery-visibility choice (pro tier only).
    pub is_public: Option<bool>,
}

/// Validated parameters for one image generation request.
#[derive(Debug, Clone)]
pub struct ImageJob {
    /// Generation prompt.
    pub prompt: String,
    /// Requested model id; `None` or `"auto"` selects the default.
    pub model: Option<String>,
    /// Output quality tier.
    pub quality: Quality,
    /// Aspect ratio string.
    pub aspect_ratio: String,
    /// Optional visual style hint.
    pub style: Option<String>,
    /// Optional negative prompt.
    pub negative_prompt: Option<String>,
    /// Optional deterministic seed.
    pub seed: Option<i32>,
    /// Owning project.
    pub project_id: Uuid,
    /// Chain to append to, if any.
    pub chain_id: Option<ChainId>,
    /// Prior render this one builds on, if any.
    pub reference_render_id: Option<RenderId>,
    /// Optional source image to edit or take style from.
    pub uploaded_image: Option<UploadedFile>,
    /// Explicit gallery-visibility choice (pro tier only).
    pub is_public: Option<bool>,
}

/// What the caller gets back for a completed render.
#[derive(Debug, Clone)]
pub struct RenderReceipt {
    /// The render's id.
    pub id: RenderId,
    /// Durable URL of the output artifact.
    pub output_url: String,
    /// Final status (always `completed` on success).
    pub status: RenderStatus,
    /// Provider-reported generation time in milliseconds.
    pub processing_time_ms: i64,
}

/// Orchestration layer for all generation requests.
///
/// Stateless coordinator over constructor-injected collaborators; no
/// implicit singletons. Every request follows the same pattern: price →
/// reserve credits → create the render row → generate → persist the
/// artifact → finalize metadata, refunding the reservation on any
/// failure between the debit and the artifact write.
#[derive(Debug, Clone)]
pub struct RenderService {
    registry: ModelRegistry,
    ledger: Arc<dyn CreditLedger>,
    store: Arc<dyn RenderStore>,
    subscriptions: Arc<dyn Subscriptions>,
    generation: Arc<dyn GenerationClient>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl RenderService {
    /// Creates a new `RenderService`.
    #[must_use]
    pub fn new(
        registry: ModelRegistry,
        ledger: Arc<dyn CreditLedger>,
        store: Arc<dyn RenderStore>,
        subscriptions: Arc<dyn Subscriptions>,
        generation: Arc<dyn GenerationClient>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            registry,
            ledger,
            store,
            subscriptions,
            generation,
            artifacts,
        }
    }

    /// Returns a reference to the model registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Runs one video generation request end to end.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] per the taxonomy: validation failures
    /// before any side effect, `InsufficientCredits` before a render row
    /// exists, and refunded `GenerationFailed`/`UploadFailed` afterwards.
    pub async fn generate_video(
        &self,
        user_id: Uuid,
        job: VideoJob,
    ) -> Result<RenderReceipt, GatewayError> {
        // validating: fail fast, no side effects.
        if job.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Missing required fields".to_string(),
            ));
        }
        match job.generation_type {
            GenerationType::ImageToVideo if job.uploaded_image.is_none() => {
                return Err(GatewayError::InvalidRequest(
                    "Uploaded image is required for image-to-video generation".to_string(),
                ));
            }
            GenerationType::KeyframeSequence if job.keyframes.is_empty() => {
                return Err(GatewayError::InvalidRequest(
                    "At least one keyframe is required".to_string(),
                ));
            }
            _ => {}
        }

        // credits_reserved: price against a concrete model, then debit.
        let resolved = self.registry.resolve(job.model.as_deref(), RenderKind::Video);
        let duration_secs = job.duration.seconds();
        let cost = resolved.map_or_else(
            || FALLBACK_VIDEO_CREDITS_PER_SECOND * i64::from(duration_secs),
            |m| m.credit_cost(&CostParams::for_video(duration_secs)),
        );
        let model_id = resolved.map_or_else(
            || job.model.clone().unwrap_or_default(),
            |m| m.id.to_string(),
        );

        self.ledger
            .debit(
                user_id,
                cost,
                &format!("Generated video - {model_id} model"),
                None,
            )
            .await?;

        let settings = RenderSettings::Video(VideoSettings {
            model: model_id.clone(),
            duration: job.duration,
            aspect_ratio: job.aspect_ratio,
            generation_type: job.generation_type,
        });

        let render = match self
            .create_tracked_render(user_id, job.project_id, &job.prompt, settings, job.chain_id, job.reference_render_id)
            .await
        {
            Ok(render) => render,
            Err(e) => {
                self.refund(user_id, cost, RenderKind::Video, None).await;
                return Err(e);
            }
        };

        match self.run_video(user_id, &render, &job, &model_id).await {
            Ok((artifact, processing_time_ms)) => {
                self.finalize(user_id, &render, &artifact, processing_time_ms, job.is_public)
                    .await;
                Ok(RenderReceipt {
                    id: render.id,
                    output_url: artifact.url,
                    status: RenderStatus::Completed,
                    processing_time_ms,
                })
            }
            Err(e) => {
                self.fail_and_refund(user_id, render.id, cost, RenderKind::Video, &e)
                    .await;
                Err(e)
            }
        }
    }

    /// Runs one image generation request end to end.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] per the taxonomy: validation failures
    /// before any side effect, `InsufficientCredits` before a render row
    /// exists, and refunded `GenerationFailed`/`UploadFailed` afterwards.
    pub async fn generate_image(
        &self,
        user_id: Uuid,
        job: ImageJob,
    ) -> Result<RenderReceipt, GatewayError> {
        // validating: fail fast, no side effects.
        if job.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Missing required fields".to_string(),
            ));
        }

        let resolved = self.registry.resolve(job.model.as_deref(), RenderKind::Image);
        if let Some(model) = resolved {
            if !model.supports_quality(job.quality) {
                return Err(GatewayError::InvalidRequest(format!(
                    "Model {} does not support the requested quality",
                    model.id
                )));
            }
            if !model.supports_aspect_ratio(&job.aspect_ratio) {
                return Err(GatewayError::InvalidRequest(format!(
                    "Model {} does not support aspect ratio {}",
                    model.id, job.aspect_ratio
                )));
            }
        }

        // credits_reserved.
        let quality_multiplier = match job.quality {
            Quality::Standard => 1,
            Quality::High => 2,
            Quality::Ultra => 3,
        };
        let cost = resolved.map_or(
            FALLBACK_IMAGE_BASE_CREDITS * quality_multiplier,
            |m| m.credit_cost(&CostParams::for_image(job.quality)),
        );
        let model_id = resolved.map_or_else(
            || job.model.clone().unwrap_or_default(),
            |m| m.id.to_string(),
        );

        self.ledger
            .debit(
                user_id,
                cost,
                &format!("Generated image - {model_id} model"),
                None,
            )
            .await?;

        let settings = RenderSettings::Image(ImageSettings {
            model: model_id.clone(),
            style: job.style.clone(),
            quality: job.quality,
            aspect_ratio: job.aspect_ratio.clone(),
            negative_prompt: job.negative_prompt.clone(),
            seed: job.seed,
        });

        let render = match self
            .create_tracked_render(user_id, job.project_id, &job.prompt, settings, job.chain_id, job.reference_render_id)
            .await
        {
            Ok(render) => render,
            Err(e) => {
                self.refund(user_id, cost, RenderKind::Image, None).await;
                return Err(e);
            }
        };

        match self.run_image(user_id, &render, &job, &model_id).await {
            Ok((artifact, processing_time_ms)) => {
                self.finalize(user_id, &render, &artifact, processing_time_ms, job.is_public)
                    .await;
                Ok(RenderReceipt {
                    id: render.id,
                    output_url: artifact.url,
                    status: RenderStatus::Completed,
                    processing_time_ms,
                })
            }
            Err(e) => {
                self.fail_and_refund(user_id, render.id, cost, RenderKind::Image, &e)
                    .await;
                Err(e)
            }
        }
    }

    /// Claims a chain position when requested, then creates the render
    /// row in `pending` and immediately marks it `processing`.
    async fn create_tracked_render(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        prompt: &str,
        settings: RenderSettings,
        chain_id: Option<ChainId>,
        reference_render_id: Option<RenderId>,
    ) -> Result<Render, GatewayError> {
        let chain = match chain_id {
            Some(chain) => {
                let position = self.store.next_chain_position(chain, project_id).await?;
                tracing::info!(%chain, position, "appending render to chain");
                Some((chain, position))
            }
            None => None,
        };

        let render = Render::new(
            project_id,
            user_id,
            prompt.to_string(),
            settings,
            chain,
            reference_render_id,
        );
        self.store.create_render(&render).await?;
        self.store
            .update_status(render.id, RenderStatus::Processing, None)
            .await?;
        Ok(render)
    }

    /// generating + uploading for video requests.
    async fn run_video(
        &self,
        user_id: Uuid,
        render: &Render,
        job: &VideoJob,
        model_id: &str,
    ) -> Result<(StoredArtifact, i64), GatewayError> {
        let mut first_frame = None;
        let mut last_frame = None;
        let mut reference_images = Vec::new();

        match job.generation_type {
            GenerationType::ImageToVideo => {
                let Some(image) = job.uploaded_image.as_ref() else {
                    // Checked during validation; defend the invariant anyway.
                    return Err(GatewayError::InvalidRequest(
                        "Uploaded image is required for image-to-video generation".to_string(),
                    ));
                };
                let asset = self
                    .artifacts
                    .upload(
                        image.data.clone(),
                        ArtifactCategory::Uploads,
                        user_id,
                        image.filename.as_deref(),
                        Some(render.project_id),
                    )
                    .await?;
                self.store.set_source_asset(render.id, &asset).await?;
                first_frame = Some(InlineImage::new(image.data.clone(), image.mime.clone()));
            }
            GenerationType::KeyframeSequence => {
                first_frame = job
                    .keyframes
                    .first()
                    .map(|k| InlineImage::new(k.data.clone(), k.mime.clone()));
                if job.keyframes.len() > 1 {
                    last_frame = job
                        .keyframes
                        .last()
                        .map(|k| InlineImage::new(k.data.clone(), k.mime.clone()));
                }
                reference_images = job
                    .keyframes
                    .iter()
                    .take(3)
                    .map(|k| InlineImage::new(k.data.clone(), k.mime.clone()))
                    .collect();
            }
            GenerationType::TextToVideo => {}
        }

        let request = VideoRequest {
            prompt: job.prompt.clone(),
            model: model_id.to_string(),
            duration: job.duration,
            aspect_ratio: job.aspect_ratio,
            first_frame,
            last_frame,
            reference_images,
        };

        let output = self
            .generation
            .generate_video(&request)
            .await
            .map_err(|e| GatewayError::GenerationFailed(e.message))?;

        let artifact = self
            .persist_output(user_id, render, output.payload, "mp4")
            .await?;
        Ok((artifact, output.processing_time_ms))
    }

    /// generating + uploading for image requests.
    async fn run_image(
        &self,
        user_id: Uuid,
        render: &Render,
        job: &ImageJob,
        model_id: &str,
    ) -> Result<(StoredArtifact, i64), GatewayError> {
        let mut reference_image = None;

        if let Some(image) = job.uploaded_image.as_ref() {
            let asset = self
                .artifacts
                .upload(
                    image.data.clone(),
                    ArtifactCategory::Uploads,
                    user_id,
                    image.filename.as_deref(),
                    Some(render.project_id),
                )
                .await?;
            self.store.set_source_asset(render.id, &asset).await?;
            reference_image = Some(InlineImage::new(image.data.clone(), image.mime.clone()));
        } else if let Some(reference_id) = job.reference_render_id {
            reference_image = self.resolve_reference_image(reference_id).await;
        }

        let request = ImageRequest {
            prompt: job.prompt.clone(),
            model: model_id.to_string(),
            quality: job.quality,
            aspect_ratio: job.aspect_ratio.clone(),
            style: job.style.clone(),
            negative_prompt: job.negative_prompt.clone(),
            seed: job.seed,
            reference_image,
        };

        let output = self
            .generation
            .generate_image(&request)
            .await
            .map_err(|e| GatewayError::GenerationFailed(e.message))?;

        let artifact = self
            .persist_output(user_id, render, output.payload, "png")
            .await?;
        Ok((artifact, output.processing_time_ms))
    }

    /// Loads a completed reference render's stored output for use as a
    /// provider reference image. Missing or unfinished references are
    /// skipped, not fatal.
    async fn resolve_reference_image(&self, reference_id: RenderId) -> Option<InlineImage> {
        let render = match self.store.render(reference_id).await {
            Ok(render) => render?,
            Err(e) => {
                tracing::warn!(%reference_id, error = %e, "reference render lookup failed");
                return None;
            }
        };
        if render.status != RenderStatus::Completed {
            tracing::warn!(%reference_id, "reference render not completed, ignoring");
            return None;
        }
        let key = render.output_key?;
        match self.artifacts.download(&key).await {
            Ok(data) => {
                let mime = if key.ends_with(".png") {
                    "image/png"
                } else {
                    "image/jpeg"
                };
                Some(InlineImage::new(data, mime))
            }
            Err(e) => {
                tracing::warn!(%reference_id, error = %e, "reference render fetch failed");
                None
            }
        }
    }

    /// uploading: moves the generated artifact into durable storage.
    /// Provider URLs are ephemeral, so they are fetched and re-uploaded
    /// rather than stored directly.
    async fn persist_output(
        &self,
        user_id: Uuid,
        render: &Render,
        payload: GeneratedPayload,
        extension: &str,
    ) -> Result<StoredArtifact, GatewayError> {
        let filename = format!("render_{}.{extension}", render.id);
        match payload {
            GeneratedPayload::Inline { data, .. } => {
                self.artifacts
                    .upload(
                        data,
                        ArtifactCategory::Renders,
                        user_id,
                        Some(&filename),
                        Some(render.project_id),
                    )
                    .await
            }
            GeneratedPayload::Url(url) => {
                self.artifacts
                    .upload_from_url(
                        &url,
                        ArtifactCategory::Renders,
                        user_id,
                        Some(&filename),
                        Some(render.project_id),
                    )
                    .await
            }
        }
    }

    /// persisting: completion row and gallery publication. The request
    /// was billed correctly by now, so failures here are logged as
    /// data-consistency warnings instead of refunded.
    async fn finalize(
        &self,
        user_id: Uuid,
        render: &Render,
        artifact: &StoredArtifact,
        processing_time_ms: i64,
        is_public_choice: Option<bool>,
    ) {
        if let Err(e) = self
            .store
            .complete_render(render.id, artifact, processing_time_ms)
            .await
        {
            tracing::warn!(render = %render.id, error = %e, "data consistency: completion write failed after billed generation");
        }

        let is_public = match self.subscriptions.tier(user_id).await {
            Ok(tier) if tier.is_pro() => is_public_choice == Some(true),
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(render = %render.id, error = %e, "data consistency: tier lookup failed, skipping gallery publication");
                return;
            }
        };

        if is_public {
            if let Err(e) = self
                .store
                .add_gallery_item(render.id, user_id, true)
                .await
            {
                tracing::warn!(render = %render.id, error = %e, "data consistency: gallery publication failed");
            }
        }

        tracing::info!(render = %render.id, processing_time_ms, "render completed");
    }

    /// Failure edge: mark the render failed, then refund the
    /// reservation. Runs in every post-reservation failure branch.
    async fn fail_and_refund(
        &self,
        user_id: Uuid,
        render_id: RenderId,
        cost: i64,
        kind: RenderKind,
        error: &GatewayError,
    ) {
        let message = error.to_string();
        if let Err(e) = self
            .store
            .update_status(render_id, RenderStatus::Failed, Some(&message))
            .await
        {
            tracing::warn!(render = %render_id, error = %e, "failed to mark render as failed");
        }
        self.refund(user_id, cost, kind, Some(render_id)).await;
        tracing::warn!(render = %render_id, %message, "render failed, credits refunded");
    }

    /// Reverses a reservation with an identical-amount refund.
    async fn refund(&self, user_id: Uuid, cost: i64, kind: RenderKind, render_id: Option<RenderId>) {
        let reference = render_id.map(TransactionReference::render);
        if let Err(e) = self
            .ledger
            .credit(
                user_id,
                cost,
                GrantKind::Refund,
                &format!("Refund for failed {kind} generation"),
                reference,
            )
            .await
        {
            // A failed refund is the worst consistency outcome; surface
            // it loudly for the billing collaborator to reconcile.
            tracing::error!(%user_id, cost, error = %e, "refund failed after generation failure");
        }
    }
}
